pub mod clock;
pub mod database;
pub mod metrics;
pub mod providers;
pub mod storage;

pub use clock::MonotonicClock;
pub use database::FeedbackDb;
pub use providers::{ModelBackend, ModelInvoker, ModelKind};
pub use storage::{ObjectCapabilities, RecordCapabilities, StoreError};
