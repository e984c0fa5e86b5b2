use std::fmt;
use std::sync::Arc;

use crate::client::{
    IndexClient, IndexSettings, REFRESH_DISABLED, SETTING_NUMBER_OF_REPLICAS,
    SETTING_REFRESH_INTERVAL,
};
use crate::error::{BulkError, Result};

/// Refresh interval assumed when the index does not report one.
const DEFAULT_REFRESH_INTERVAL: &str = "1s";

/// Pre-run values of the settings relaxed for a large load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    index: String,
    settings: IndexSettings,
}

impl SettingsSnapshot {
    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }
}

impl fmt::Display for SettingsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .settings
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "{}", pairs.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LargeModeState {
    Idle,
    Relaxed,
    Restoring,
}

/// Trades replication and periodic refresh for throughput during a large
/// load, and puts them back afterwards.
pub struct LargeLoadModeManager {
    client: Arc<dyn IndexClient>,
    index: String,
    state: LargeModeState,
    snapshot: Option<SettingsSnapshot>,
}

impl LargeLoadModeManager {
    pub fn new(client: Arc<dyn IndexClient>, index: impl Into<String>) -> Self {
        Self {
            client,
            index: index.into(),
            state: LargeModeState::Idle,
            snapshot: None,
        }
    }

    pub fn state(&self) -> LargeModeState {
        self.state
    }

    pub fn snapshot(&self) -> Option<&SettingsSnapshot> {
        self.snapshot.as_ref()
    }

    /// Hands the snapshot over without restoring it. The manager goes back to
    /// idle and will not touch the index settings again.
    pub fn abandon(&mut self) -> Option<SettingsSnapshot> {
        self.state = LargeModeState::Idle;
        self.snapshot.take()
    }

    /// Snapshots the current settings, then disables replicas (when there are
    /// any) and periodic refresh in a single settings update.
    pub async fn relax(&mut self) -> Result<()> {
        if self.state != LargeModeState::Idle {
            return Err(BulkError::AlreadyStarted);
        }

        let mut initial = IndexSettings::new();
        let mut relaxed = IndexSettings::new();

        let replicas = self
            .client
            .get_setting(&self.index, SETTING_NUMBER_OF_REPLICAS)
            .await?;
        let replica_count = match replicas.as_deref() {
            Some(value) => value.trim().parse::<u32>().map_err(|_| BulkError::InvalidSetting {
                name: SETTING_NUMBER_OF_REPLICAS.to_string(),
                value: value.to_string(),
            })?,
            None => 0,
        };
        if replica_count > 0 {
            initial.insert(SETTING_NUMBER_OF_REPLICAS.to_string(), replica_count.to_string());
            relaxed.insert(SETTING_NUMBER_OF_REPLICAS.to_string(), "0".to_string());
        }

        let refresh_interval = self
            .client
            .get_setting(&self.index, SETTING_REFRESH_INTERVAL)
            .await?
            .unwrap_or_else(|| DEFAULT_REFRESH_INTERVAL.to_string());
        initial.insert(SETTING_REFRESH_INTERVAL.to_string(), refresh_interval);
        relaxed.insert(SETTING_REFRESH_INTERVAL.to_string(), REFRESH_DISABLED.to_string());

        self.client.update_settings(&self.index, &relaxed).await?;

        let snapshot = SettingsSnapshot {
            index: self.index.clone(),
            settings: initial,
        };
        tracing::info!(index = %self.index, saved = %snapshot, "Large indexing mode enabled");
        self.snapshot = Some(snapshot);
        self.state = LargeModeState::Relaxed;
        Ok(())
    }

    /// Merges segments, then re-applies the snapshot. The merge must finish
    /// before replicas are re-enabled. No-op when nothing was relaxed.
    pub async fn restore(&mut self) -> Result<()> {
        if self.state != LargeModeState::Relaxed {
            return Ok(());
        }
        let snapshot = match self.snapshot.take() {
            Some(snapshot) => snapshot,
            None => {
                self.state = LargeModeState::Idle;
                return Ok(());
            }
        };
        self.state = LargeModeState::Restoring;

        if let Err(e) = self.client.consolidate(&self.index).await {
            tracing::error!(index = %self.index, "Fail to merge index segments: {}", e);
        }

        let restored = self.client.update_settings(&self.index, &snapshot.settings).await;
        self.state = LargeModeState::Idle;

        match restored {
            Ok(()) => {
                tracing::info!(index = %self.index, restored = %snapshot, "Index settings restored");
                Ok(())
            }
            Err(e) => Err(BulkError::SettingsRestore {
                index: self.index.clone(),
                snapshot,
                reason: e.to_string(),
            }),
        }
    }
}
