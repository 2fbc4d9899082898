//! Termination signal handling.
//!
//! SIGINT, SIGTERM and SIGQUIT are registered before the watch starts. A dedicated thread blocks
//! until one of them arrives and then resolves [`ShutdownCoordinator::triggered`], which the
//! driver races against the watch loop. Once the signal wins, the watch loop is dropped and
//! [`ShutdownCoordinator::shut_down`] flushes and closes the log sink.

// System
use std::{fmt, future, io, thread};

// Third Party
use signal_hook::{
    consts::{SIGINT, SIGQUIT, SIGTERM},
    iterator::{Handle, Signals},
};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

// Local
use crate::sink::SharedSink;

const TERMINATION_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGQUIT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    Quit,
}

impl TerminationSignal {
    pub fn from_raw(signal: i32) -> Option<Self> {
        match signal {
            SIGINT => Some(TerminationSignal::Interrupt),
            SIGTERM => Some(TerminationSignal::Terminate),
            SIGQUIT => Some(TerminationSignal::Quit),
            _ => None,
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

pub struct ShutdownCoordinator {
    received: oneshot::Receiver<TerminationSignal>,
    handle: Handle,
}

impl ShutdownCoordinator {
    /// Register the termination signals and start the listener thread.
    pub fn install() -> io::Result<Self> {
        let mut signals = Signals::new(TERMINATION_SIGNALS)?;
        let handle = signals.handle();
        let (sender, received) = oneshot::channel();
        thread::Builder::new()
            .name("shutdown-listener".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().find_map(TerminationSignal::from_raw) {
                    // The receiver is gone only if the process is already exiting.
                    let _ = sender.send(signal);
                }
            })?;
        Ok(Self { received, handle })
    }

    /// Resolves with the first termination signal received. Pending forever if the listener
    /// stopped without seeing one.
    pub async fn triggered(&mut self) -> TerminationSignal {
        match (&mut self.received).await {
            Ok(signal) => signal,
            Err(_) => future::pending().await,
        }
    }

    /// Flush the sink and close it if it is a file. A failure to close is reported but does
    /// not change how the process exits.
    pub fn shut_down(self, signal: TerminationSignal, sink: &SharedSink) {
        info!(%signal, "Signal received. Logbook will be shut down.");
        match sink.close() {
            Ok(true) => info!("Log flushed."),
            Ok(false) => debug!("Log flushed."),
            Err(error) => error!(%error, "Failed to flush and close the log file"),
        }
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    // System
    use std::{fs, time::Duration};

    // Third Party
    use serial_test::serial;
    use signal_hook::{
        consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM},
        low_level::raise,
    };
    use tempfile::TempDir;

    // Local
    use super::{ShutdownCoordinator, TerminationSignal};
    use crate::sink::{RecordSink, SharedSink};

    #[test]
    fn test_signal_names() {
        assert_eq!(
            TerminationSignal::from_raw(SIGINT),
            Some(TerminationSignal::Interrupt)
        );
        assert_eq!(
            TerminationSignal::from_raw(SIGTERM),
            Some(TerminationSignal::Terminate)
        );
        assert_eq!(TerminationSignal::from_raw(SIGQUIT).unwrap().to_string(), "SIGQUIT");
        assert_eq!(TerminationSignal::from_raw(SIGHUP), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_signal_closes_log_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.log");
        let mut sink = SharedSink::file(&path).unwrap();
        sink.write_record(br#"{"type":"ADDED"}"#).unwrap();

        let mut coordinator = ShutdownCoordinator::install().unwrap();
        raise(SIGTERM).unwrap();
        let signal = tokio::time::timeout(Duration::from_secs(5), coordinator.triggered())
            .await
            .unwrap();
        assert_eq!(signal, TerminationSignal::Terminate);

        coordinator.shut_down(signal, &sink);
        assert!(sink.is_closed());
        assert!(!sink.close().unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"type\":\"ADDED\"}\n"
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_not_triggered_without_signal() {
        let mut coordinator = ShutdownCoordinator::install().unwrap();
        let waited =
            tokio::time::timeout(Duration::from_millis(100), coordinator.triggered()).await;
        assert!(waited.is_err());
        coordinator.shut_down(TerminationSignal::Interrupt, &SharedSink::stderr());
    }
}
