use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use log::{error, info, warn};
use mvpa::param::{self, Param};
use mvpa::{run, version};
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn start_logger(param: &Param) -> Result<LoggerHandle, Box<dyn Error>> {
    let logger = Logger::try_with_str(&param.general.log_level)?;
    let logger = if param.general.log_base.is_empty() {
        logger
    } else {
        logger
            .log_to_file(FileSpec::default()
                .basename(param.general.log_base.clone())
                .suffix(param.general.log_suffix.clone()))
            .duplicate_to_stderr(Duplicate::Info)
    };
    Ok(logger.start()?)
}

/// Clears `running` on the first Ctrl-C; permutations stop and the run fails with an interruption
fn install_interrupt_handler(running: Arc<AtomicBool>) -> Result<(), Box<dyn Error>> {
    let mut signals = Signals::new([SIGINT])?;
    thread::spawn(move || {
        if signals.forever().next().is_some() {
            warn!("Interrupt received, stopping after the permutations in progress...");
            running.store(false, Ordering::Relaxed);
        }
    });
    Ok(())
}

fn main() {
    let param_path = std::env::args().nth(1).unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(param_path.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot read parameters from {}: {}", param_path, e);
            std::process::exit(1);
        }
    };

    let _logger = match start_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            std::process::exit(1);
        }
    };

    info!("mvpa v{} | parameters from {}", version(), param_path);

    let running = Arc::new(AtomicBool::new(true));
    if let Err(e) = install_interrupt_handler(Arc::clone(&running)) {
        warn!("Ctrl-C will not stop the analysis gracefully: {}", e);
    }

    let experiment = match run(&param, running) {
        Ok(experiment) => experiment,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!("{}", experiment.display_results());

    if !param.general.save_exp.is_empty() {
        match experiment.save_auto(&param.general.save_exp) {
            Ok(()) => info!("Experiment saved to {}", param.general.save_exp),
            Err(e) => {
                error!("Failed to save experiment to {}: {}", param.general.save_exp, e);
                std::process::exit(1);
            }
        }
    }
}
