//! Watch Kubernetes events and write each one as a JSON log line.

pub mod app;
pub mod cluster;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod shutdown;
pub mod sink;
pub mod watcher;

pub use app::Outcome;
pub use error::{Error, Result};
pub use notification::Notification;
