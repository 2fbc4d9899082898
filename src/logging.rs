// Third Party
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

// Local
use crate::{
    config::{LogFormat, LogSettings},
    error::Error,
    sink::SharedSink,
};

/// The process logger: a tracing dispatcher writing diagnostics to the configured destination,
/// plus the same destination as a [`SharedSink`] for event records.
///
/// Nothing is installed globally. Callers attach [`Logger::dispatch`] to the work they run.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    sink: SharedSink,
}

impl Logger {
    /// Open the configured destination and build a logger writing to it.
    pub fn new(settings: &LogSettings) -> Result<Self, Error> {
        let sink = SharedSink::open(settings)?;
        Ok(Self::with_sink(settings, sink))
    }

    /// Build a logger on top of an already opened sink. `RUST_LOG` takes precedence over the
    /// configured level.
    pub fn with_sink(settings: &LogSettings, sink: SharedSink) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(settings.level.as_directive()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(sink.clone());
        let dispatch = match settings.format {
            LogFormat::Json => Dispatch::new(builder.json().finish()),
            LogFormat::Text => Dispatch::new(builder.finish()),
        };
        Self { dispatch, sink }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }
}
