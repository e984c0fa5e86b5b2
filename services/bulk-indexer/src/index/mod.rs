pub mod local;
pub mod manager;
pub mod query;
pub mod schema;
pub mod scroll;
pub mod settings;
pub mod stats;

pub use local::LocalIndexClient;
pub use manager::IndexManager;
pub use schema::IndexSchema;
pub use scroll::{ScrollRegistry, ScrollStats};
pub use settings::SettingsStore;
pub use stats::IndexStats;
