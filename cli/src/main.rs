mod cli;
mod config_watcher;
mod error_dialog;
mod logger;

use cli::{parse_args, Args};
use log::{debug, error, info, warn};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vaporwave_core::{Backend, Config, VaporwaveResult};

fn main() -> ExitCode {
    let args = parse_args();

    if let Err(e) = logger::init_logger(args.quiet, args.verbose) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Vaporwave {}", vaporwave_core::version());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            error_dialog::show_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> VaporwaveResult<()> {
    let mut config = if args.use_defaults {
        debug!("Using default configuration");
        Config::default()
    } else {
        Config::load(args.config_path.as_deref(), true)?
    };
    config.fullscreen |= args.fullscreen;

    if args.dry_run {
        vaporwave_core::check(&config)?;
        info!("Configuration is valid");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Interrupted, shutting down...");
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| format!("Error setting Ctrl-C handler: {e}"))?;

    // Held for the lifetime of the engine
    let _watcher = match &config.config_path {
        Some(path) if !args.use_defaults => {
            match config_watcher::watch(path.clone(), args.fullscreen) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("Config changes will not be picked up: {e}");
                    None
                }
            }
        }
        _ => None,
    };

    let backend = if args.simulate {
        info!("Running against the simulated desktop");
        Backend::Simulated
    } else {
        Backend::Native
    };

    vaporwave_core::start_with_config(shutdown, config, backend)
}
