mod app;
mod config;
mod error;
mod gpu;
mod headless;
mod simulation;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use winit::event_loop::EventLoop;

use crate::app::App;
use crate::config::SimulationConfig;
use crate::error::{ConfigError, ViewerError};
use crate::simulation::GridSimulator;

/// Path to a JSON [`SimulationConfig`]
const CONFIG_VAR: &str = "QC_CONFIG";
/// Overrides the RNG seed
const SEED_VAR: &str = "QC_SEED";
/// Step count for a windowless run
const HEADLESS_VAR: &str = "QC_HEADLESS";
/// CSV destination for a windowless run
const EXPORT_VAR: &str = "QC_EXPORT";

fn load_config() -> Result<SimulationConfig, ConfigError> {
    let mut config = match env::var(CONFIG_VAR) {
        Ok(path) => {
            log::info!("Loading config from {}", path);
            SimulationConfig::from_json_file(path)?
        }
        Err(_) => SimulationConfig::default(),
    };

    if let Ok(seed) = env::var(SEED_VAR) {
        let seed = seed
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("QC_SEED must be an unsigned integer"))?;
        config.rng_seed = Some(seed);
    }

    Ok(config)
}

fn headless_steps() -> Result<Option<u64>, ConfigError> {
    match env::var(HEADLESS_VAR) {
        Ok(steps) => steps
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid("QC_HEADLESS must be a step count")),
        Err(_) => Ok(None),
    }
}

fn run_viewer(simulator: GridSimulator) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(simulator);
    event_loop.run_app(&mut app)?;
    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, steps) = match load_config().and_then(|c| Ok((c, headless_steps()?))) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut simulator = match GridSimulator::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(steps) = steps {
        let export = env::var(EXPORT_VAR).ok().map(PathBuf::from);
        headless::run(&mut simulator, steps, export.as_deref());
        return ExitCode::SUCCESS;
    }

    log::info!("Starting Quantum Causality Simulator");
    match run_viewer(simulator) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Viewer failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
