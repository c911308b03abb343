use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================
// Simulation Parameters
// ============================================

/// Observation tuning for one region of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationParams {
    /// Chance per step that a cell in the region is observed.
    pub probability: f64,
    /// Share of the postponed buffer resolved by one observation.
    pub resolve_fraction: f64,
}

/// Inclusive range the per-cell event count is drawn from each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRange {
    pub min: u32,
    pub max: u32,
}

/// Rectangle of cells that behaves as the observing agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRegion {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl AgentRegion {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
    }
}

impl Default for AgentRegion {
    fn default() -> Self {
        // Central 3x3 of the default 5x5 grid
        Self { rows: 1..4, cols: 1..4 }
    }
}

/// Tunables for a [`GridSimulator`](crate::simulation::GridSimulator).
///
/// Defaults reproduce the classic 5x5 setup. `causality_strength` is only the
/// starting value; the simulator owns the live knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Side length of the square grid.
    pub grid_size: usize,
    /// Background radiation strength: sets the starting temperature and the
    /// per-step fragment cleanup rate.
    pub cbr_strength: f64,
    /// Share of absorbed events pushed into the postponed buffer.
    pub uncertainty_prob: f64,
    /// Chance per cell per step of a dissipation ("black hole") event.
    pub dissipation_prob: f64,
    /// Base neighbor diffusion rate, scaled by causality strength.
    pub diffusion_rate: f64,
    /// Share of fragments removed by a dissipation event.
    pub dissipation_factor: f64,
    /// Temperature perturbation amplitude at zero causality.
    pub quantum_amplitude_temp: f64,
    /// Fragment perturbation amplitude at zero causality. The 100:1 ratio to
    /// the temperature amplitude is a tuning choice, not a physical law.
    pub quantum_amplitude_frag: f64,
    /// Initial causality strength in [0, 1].
    pub causality_strength: f64,
    /// Chance per step of a new entangled pair.
    pub entanglement_prob: f64,
    pub agent_region: AgentRegion,
    pub agent_observation: ObservationParams,
    pub background_observation: ObservationParams,
    pub event_range: EventRange,
    /// Fixed RNG seed for reproducible runs; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_size: 5,
            cbr_strength: 2.0,
            uncertainty_prob: 0.1,
            dissipation_prob: 0.01,
            diffusion_rate: 0.2,
            dissipation_factor: 0.5,
            quantum_amplitude_temp: 0.5,
            quantum_amplitude_frag: 50.0,
            causality_strength: 0.8,
            entanglement_prob: 0.05,
            agent_region: AgentRegion::default(),
            agent_observation: ObservationParams {
                probability: 0.1,
                resolve_fraction: 0.5,
            },
            background_observation: ObservationParams {
                probability: 0.01,
                resolve_fraction: 0.1,
            },
            event_range: EventRange { min: 500, max: 1500 },
            rng_seed: None,
        }
    }
}

impl SimulationConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::Invalid("grid_size must be non-zero"));
        }

        let unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        if !unit(self.uncertainty_prob)
            || !unit(self.dissipation_prob)
            || !unit(self.entanglement_prob)
        {
            return Err(ConfigError::Invalid(
                "uncertainty, dissipation and entanglement probabilities must be in [0, 1]",
            ));
        }
        if !unit(self.causality_strength) {
            return Err(ConfigError::Invalid("causality_strength must be in [0, 1]"));
        }
        if !unit(self.diffusion_rate) || !unit(self.dissipation_factor) {
            return Err(ConfigError::Invalid(
                "diffusion_rate and dissipation_factor must be in [0, 1]",
            ));
        }
        if !non_negative(self.cbr_strength)
            || !non_negative(self.quantum_amplitude_temp)
            || !non_negative(self.quantum_amplitude_frag)
        {
            return Err(ConfigError::Invalid(
                "cbr_strength and quantum amplitudes must be finite and non-negative",
            ));
        }
        for params in [&self.agent_observation, &self.background_observation] {
            if !unit(params.probability) || !unit(params.resolve_fraction) {
                return Err(ConfigError::Invalid(
                    "observation probability and resolve_fraction must be in [0, 1]",
                ));
            }
        }
        if self.event_range.min > self.event_range.max {
            return Err(ConfigError::Invalid("event_range.min must not exceed event_range.max"));
        }
        let region = &self.agent_region;
        if region.rows.start > region.rows.end
            || region.cols.start > region.cols.end
            || region.rows.end > self.grid_size
            || region.cols.end > self.grid_size
        {
            return Err(ConfigError::Invalid("agent_region must lie within the grid"));
        }
        Ok(())
    }
}

// ============================================
// Viewer
// ============================================

/// Time between automatic steps while running
pub const STEP_INTERVAL: Duration = Duration::from_millis(500);

/// Steps before a run stops on its own
pub const MAX_STEPS: u64 = 500;

/// Causality change per key press
pub const CAUSALITY_KEY_STEP: f64 = 0.05;

/// Pixel size of one heat-map cell at the initial window size
pub const CELL_PIXELS: u32 = 96;

/// Gap between heat-map panels, in cells
pub const PANEL_GAP: f32 = 0.5;

/// Number of heat-map panels (temperature, fragments, observations)
pub const PANEL_COUNT: u32 = 3;

/// Panels side by side: the heat maps plus the global statistics plot
pub const LAYOUT_COLUMNS: u32 = PANEL_COUNT + 1;

/// Steps plotted in the statistics panel; a run never exceeds this
pub const HISTORY_CAPACITY: usize = MAX_STEPS as usize;

/// Default export filename prefix; a timestamp and `.csv` are appended
pub const EXPORT_PREFIX: &str = "quantum_sim_data";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_agent_region_contains_center() {
        let region = AgentRegion::default();
        assert!(region.contains(2, 2));
        assert!(region.contains(1, 3));
        assert!(!region.contains(0, 2));
        assert!(!region.contains(2, 4));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let config = SimulationConfig {
            causality_strength: 1.5,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = SimulationConfig {
            grid_size: 0,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimulationConfig {
            event_range: EventRange { min: 10, max: 5 },
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_region_must_fit_grid() {
        let config = SimulationConfig {
            grid_size: 3,
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimulationConfig {
            grid_size: 3,
            agent_region: AgentRegion { rows: 1..2, cols: 1..2 },
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, r#"{ "grid_size": 7, "rng_seed": 42, "agent_region": { "rows": { "start": 2, "end": 5 }, "cols": { "start": 2, "end": 5 } } }"#).unwrap();

        let config = SimulationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.grid_size, 7);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.cbr_strength, 2.0);
        assert_eq!(config.agent_region.rows, 2..5);
    }

    #[test]
    fn test_malformed_json_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ grid_size: ").unwrap();

        let err = SimulationConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_reports_read_error() {
        let err = SimulationConfig::from_json_file("/nonexistent/sim.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
