// System
use std::process::ExitCode;

// Third Party
use tracing::{dispatcher, error, info, instrument::WithSubscriber};

// Local
use crate::{
    cluster::{self, ClusterEvents},
    config::Settings,
    error::{Error, Phase},
    logging::Logger,
    shutdown::{ShutdownCoordinator, TerminationSignal},
    watcher::{EventSource, EventWatcher},
};

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The API server ended the watch. A supervisor is expected to restart the process.
    SubscriptionClosed,
    /// A termination signal arrived and the log sink was closed.
    Interrupted(TerminationSignal),
}

/// Clean endings exit with 0, every error with 1.
pub fn exit_code(result: &Result<Outcome, Error>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

/// Log an error once, on the logger when there is one and on stderr otherwise.
pub fn report(error: &Error, logger: Option<&Logger>) {
    match logger {
        Some(logger) => dispatcher::with_default(logger.dispatch(), || match error.phase() {
            Phase::Startup => error!(%error, "Logbook failed to start"),
            Phase::Runtime => error!(%error, "Logbook stopped"),
        }),
        None => eprintln!("logbook: {}", error),
    }
}

/// Run logbook against the cluster until the watch closes, a signal arrives, or a fatal
/// error occurs.
pub async fn run(settings: Settings, logger: Logger) -> ExitCode {
    let result = start(&settings, &logger)
        .with_subscriber(logger.dispatch().clone())
        .await;
    if let Err(error) = &result {
        report(error, Some(&logger));
    }
    exit_code(&result)
}

async fn start(settings: &Settings, logger: &Logger) -> Result<Outcome, Error> {
    match &settings.config_file {
        Some(path) => info!(path = %path.display(), "Using config file"),
        None => info!("No config file found, using defaults, environment and flags"),
    }
    info!(config = ?settings, "Initialized with configuration");

    let shutdown = ShutdownCoordinator::install().map_err(Error::Signals)?;
    let client = cluster::connect(&settings.auth).await?;
    let watcher = EventWatcher::new(
        ClusterEvents::new(&client),
        &settings.target.namespace,
        &settings.target.watch,
    );
    watch_until_shutdown(&watcher, shutdown, logger).await
}

/// Race the watch loop against the shutdown trigger. The record sink is only closed once the
/// watch loop has been dropped, so no record is written after the close.
pub async fn watch_until_shutdown<S: EventSource>(
    watcher: &EventWatcher<S>,
    mut shutdown: ShutdownCoordinator,
    logger: &Logger,
) -> Result<Outcome, Error> {
    let mut sink = logger.sink().clone();
    let signal = tokio::select! {
        biased;
        signal = shutdown.triggered() => signal,
        outcome = watcher.run(&mut sink) => return outcome,
    };
    shutdown.shut_down(signal, logger.sink());
    Ok(Outcome::Interrupted(signal))
}
