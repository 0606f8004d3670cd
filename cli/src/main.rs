mod logging;

use std::path::Path;
use std::process::ExitCode;

use crossbeam_channel::bounded;
use log::{error, info, warn};

use utf8watch::{load_settings, ConfigError, ConversionManager, ProgressState, Settings};

fn main() -> ExitCode {
    let _log_guard = match logging::init_logging(Path::new(".")) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting utf8watch v{}", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(ConfigError::MissingVariable(_)) => {
            error!("Error: INPUT_DIRECTORY and OUTPUT_DIRECTORY must be set in the environment.");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&settings) {
        Ok(state) => {
            info!(
                "Stopped with {}/{} files processed",
                state.processed, state.total
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> utf8watch::Result<ProgressState> {
    let (stop, shutdown) = bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupt received, shutting down...");
        // A second interrupt finds the slot full; one message is enough.
        let _ = stop.try_send(());
    }) {
        warn!("Could not install interrupt handler: {}", e);
    }

    let manager = ConversionManager::new(settings)?;
    info!(
        "Converting {} -> {} with {} workers",
        settings.input_directory.display(),
        settings.output_directory.display(),
        settings.max_workers
    );

    manager.process_existing_files()?;
    let outcome = manager.run(&shutdown);
    let state = manager.finish();

    outcome.map(|_| state)
}
