// System
use std::{io, path::PathBuf};

// Third Party
use kube::config::{InClusterError, KubeconfigError};

/// Which part of the process lifecycle an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Raised before the watch loop starts reading notifications.
    Startup,
    /// Raised by the watch loop while forwarding notifications.
    Runtime,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0:#}")]
    Config(#[source] anyhow::Error),

    #[error("failed to open log file {path}: {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to register termination signals: {0}")]
    Signals(#[source] io::Error),

    #[error("failed to load in-cluster credentials: {0}")]
    InCluster(#[source] InClusterError),

    #[error("no kubeconfig given and the home directory could not be determined")]
    NoHomeDir,

    #[error("failed to load kubeconfig {path}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to create cluster client: {0}")]
    Client(#[source] kube::Error),

    #[error("failed to open event subscription: {0}")]
    Subscribe(#[source] kube::Error),

    #[error("failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write record: {0}")]
    Write(#[source] io::Error),
}

impl Error {
    pub fn phase(&self) -> Phase {
        match self {
            Error::Serialize(_) | Error::Write(_) => Phase::Runtime,
            _ => Phase::Startup,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
