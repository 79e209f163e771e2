pub mod config;
pub mod logging;

pub mod cancel;
pub mod checksum;
pub mod engine;
pub mod error;
pub mod events;
pub mod extractor;
pub mod gateway;
pub mod layout;
pub mod merger;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod storage;
pub mod store;
pub mod task;
pub mod transfer;
pub mod worker;

pub use engine::Engine;
pub use error::EngineError;
pub use events::{EngineEvent, ProgressSnapshot};
pub use gateway::{GatewayError, MemoryGateway, StatusGateway};
pub use scheduler::{CancelOutcome, Scheduler};
pub use status::DownloadStatus;
pub use task::{Task, TaskId, TaskKind, TaskParams};
