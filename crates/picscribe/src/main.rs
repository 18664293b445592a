use std::process;

use clap::Parser;
use log::{error, info};

use picscribe::processor::Collaborators;
use picscribe::termination::INTERRUPTED_EXIT_CODE;
use picscribe::{logging, Args, Orchestrator};

const FATAL_EXIT_CODE: i32 = 1;

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_level, args.log_json) {
        eprintln!("picscribe: {}", e);
        return FATAL_EXIT_CODE;
    }

    info!("Starting picscribe v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.into_run_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return FATAL_EXIT_CODE;
        }
    };

    let collaborators = match Collaborators::from_config(&config) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            error!("{}", e);
            return FATAL_EXIT_CODE;
        }
    };

    let orchestrator = Orchestrator::new(config, collaborators);

    // The listener thread exits the process itself on interrupt.
    if let Err(e) = orchestrator.termination().install() {
        error!("{}", e);
        return FATAL_EXIT_CODE;
    }

    match orchestrator.run() {
        Ok(summary) if summary.was_interrupted() => INTERRUPTED_EXIT_CODE,
        Ok(_) => 0,
        Err(e) => {
            error!("{}", e);
            orchestrator.termination().cleanup();
            FATAL_EXIT_CODE
        }
    }
}
