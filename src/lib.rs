//! Background worker host and the `watch_backend` worker.

pub mod bgworker;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod supervisor;
pub mod worker;

pub use bgworker::{BackgroundWorker, BackgroundWorkerBuilder};
pub use config::schema::WatchConfig;
pub use supervisor::Supervisor;
