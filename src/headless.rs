use std::path::Path;

use rand::Rng;

use crate::simulation::GridSimulator;

/// Run `steps` steps without a window, logging a summary line per step.
///
/// When `export` is set the step records are written there afterwards; a
/// failed export is logged and does not fail the run. Returns the number of
/// rows exported.
pub fn run<R: Rng>(sim: &mut GridSimulator<R>, steps: u64, export: Option<&Path>) -> Option<usize> {
    log::info!(
        "Running {} steps headless on a {}x{} grid",
        steps,
        sim.size(),
        sim.size()
    );

    for _ in 0..steps {
        let output = sim.step();
        for event in output.highlights() {
            log::debug!("{}", event);
        }
        log::trace!("{}", output.log());
        if let Some(record) = sim.step_records().last() {
            log::info!(
                "Step {}: entropy {:.0}, temperature {:.1}, BH {} (+{}), pairs {}, observations {}",
                record.step,
                record.total_entropy,
                record.total_temperature,
                record.bh_events_total,
                output.dissipated.len(),
                output.entangled.len() / 2,
                output.observation_events()
            );
        }
    }

    if let Some(last) = sim.step_records().last() {
        match serde_json::to_string(last) {
            Ok(json) => log::info!("Final record: {}", json),
            Err(e) => log::warn!("Could not serialize final record: {}", e),
        }
    }

    let path = export?;
    match sim.export_csv(path) {
        Ok(rows) => Some(rows),
        Err(e) => {
            log::error!("Export failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    fn simulator() -> GridSimulator {
        GridSimulator::new(SimulationConfig {
            rng_seed: Some(21),
            ..SimulationConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_runs_requested_steps() {
        let mut sim = simulator();
        assert_eq!(run(&mut sim, 12, None), None);
        assert_eq!(sim.entropy_history().len(), 12);
        assert_eq!(sim.step_records().last().unwrap().step, 12);
    }

    #[test]
    fn test_exports_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        let mut sim = simulator();

        assert_eq!(run(&mut sim, 5, Some(&path)), Some(5));
        assert!(path.exists());
    }

    #[test]
    fn test_zero_steps_export_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let mut sim = simulator();

        assert_eq!(run(&mut sim, 0, Some(&path)), None);
        assert!(!path.exists());
    }
}
