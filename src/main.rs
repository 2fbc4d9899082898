// System
use std::process::ExitCode;

// Third Party
use clap::Parser;

// Local
use logbook::{
    app,
    config::{Cli, Settings},
    logging::Logger,
};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::resolve(Cli::parse()) {
        Ok(settings) => settings,
        Err(error) => {
            app::report(&error, None);
            return ExitCode::FAILURE;
        }
    };
    let logger = match Logger::new(&settings.log) {
        Ok(logger) => logger,
        Err(error) => {
            app::report(&error, None);
            return ExitCode::FAILURE;
        }
    };
    app::run(settings, logger).await
}
