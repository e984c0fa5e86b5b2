pub mod buffer;
pub mod gate;
pub mod indexer;
pub mod large_mode;
pub mod operation;
pub mod progress;
pub mod retry;
pub mod scanner;
pub mod transmitter;

pub use buffer::WriteBuffer;
pub use gate::{ConcurrencyGate, Permit};
pub use indexer::{BulkIndexer, BulkSummary, SessionState};
pub use large_mode::{LargeLoadModeManager, LargeModeState, SettingsSnapshot};
pub use operation::{Batch, BatchResult, ItemOutcome, OperationKind, WriteOperation};
pub use progress::{LogProgressSink, ProcessedCounter, ProgressReporter, ProgressSink};
pub use retry::RetryCoordinator;
pub use scanner::{DeletionScanner, ScrollCursor};
pub use transmitter::BatchTransmitter;
