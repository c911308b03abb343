use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimulationConfig;
use crate::error::{ConfigError, ExportError};
use crate::simulation::cell::CellState;
use crate::simulation::diffusion::diffuse;
use crate::simulation::events::{SimEvent, StepOutput};
use crate::simulation::matrix::Matrix;
use crate::simulation::record::{self, StepRecord};
use crate::simulation::Coord;

/// Share of an observed cell's temperature pushed into its partner
const ENTANGLEMENT_COUPLING: f64 = 0.1;

/// N×N grid of cells plus the global counters and histories.
///
/// The simulator is single-threaded: drivers serialize calls to
/// [`step`](Self::step) and [`reset`](Self::reset). The causality knob may
/// change between steps and is read once per step.
pub struct GridSimulator<R: Rng = StdRng> {
    config: SimulationConfig,
    cells: Vec<CellState>,
    causality_strength: f64,
    bh_event_count: u64,
    entropy_history: Vec<f64>,
    temperature_history: Vec<f64>,
    step_records: Vec<StepRecord>,
    rng: R,
}

impl GridSimulator<StdRng> {
    /// Build a simulator seeded from `config.rng_seed`, or from OS entropy
    /// when no seed is set.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> GridSimulator<R> {
    /// Build a simulator drawing from the given random source.
    pub fn with_rng(config: SimulationConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let cells = fresh_cells(&config);
        log::debug!(
            "Grid {}x{} created, causality {:.2}",
            config.grid_size,
            config.grid_size,
            config.causality_strength
        );
        Ok(Self {
            causality_strength: config.causality_strength,
            config,
            cells,
            bh_event_count: 0,
            entropy_history: Vec::new(),
            temperature_history: Vec::new(),
            step_records: Vec::new(),
            rng,
        })
    }

    pub fn size(&self) -> usize {
        self.config.grid_size
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellState {
        &self.cells[self.index((row, col))]
    }

    pub fn causality_strength(&self) -> f64 {
        self.causality_strength
    }

    /// Set the causality knob for subsequent steps, clamped to [0, 1].
    pub fn set_causality_strength(&mut self, value: f64) {
        self.causality_strength = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    }

    pub fn bh_event_count(&self) -> u64 {
        self.bh_event_count
    }

    pub fn entropy_history(&self) -> &[f64] {
        &self.entropy_history
    }

    pub fn temperature_history(&self) -> &[f64] {
        &self.temperature_history
    }

    pub fn step_records(&self) -> &[StepRecord] {
        &self.step_records
    }

    /// Advance one step using the current causality knob.
    pub fn step(&mut self) -> StepOutput {
        let causality = self.causality_strength;
        self.step_with_causality(causality)
    }

    /// Advance one step with an explicit causality strength.
    ///
    /// Phases run in a fixed order: entanglement roll, per-cell events and
    /// observations in row-major order, diffusion from the pre-diffusion
    /// snapshot, commit, then bookkeeping.
    pub fn step_with_causality(&mut self, causality: f64) -> StepOutput {
        let causality = if causality.is_nan() { 0.0 } else { causality.clamp(0.0, 1.0) };
        let size = self.config.grid_size;

        let mut events = Vec::new();
        let mut temperature = Matrix::new(size);
        let mut fragments = Matrix::new(size);
        let mut observations = Matrix::new(size);
        let mut dissipated = Vec::new();
        let mut entangled = Vec::new();

        if self.rng.gen::<f64>() < self.config.entanglement_prob {
            let a = (self.rng.gen_range(0..size), self.rng.gen_range(0..size));
            let b = (self.rng.gen_range(0..size), self.rng.gen_range(0..size));
            if a != b {
                self.entangle(a, b);
                entangled.extend([a, b]);
                log::debug!("Entanglement created between {:?} and {:?}", a, b);
                events.push(SimEvent::EntanglementCreated { a, b });
            }
        }

        let noise_scale = 1.0 - causality;
        for row in 0..size {
            for col in 0..size {
                let coord = (row, col);
                let idx = self.index(coord);
                let event_count = self
                    .rng
                    .gen_range(self.config.event_range.min..=self.config.event_range.max);
                let params = if self.config.agent_region.contains(row, col) {
                    self.config.agent_observation
                } else {
                    self.config.background_observation
                };

                let report = self.cells[idx].absorb_events(
                    event_count,
                    self.config.dissipation_prob,
                    self.config.dissipation_factor,
                    &mut self.rng,
                );
                let dissipation = report.dissipation;
                events.push(SimEvent::Absorbed {
                    cell: coord,
                    report,
                });
                if let Some(temperature_gain) = dissipation {
                    self.bh_event_count += 1;
                    dissipated.push(coord);
                    log::debug!("Dissipation event at {:?}", coord);
                    events.push(SimEvent::Dissipation {
                        cell: coord,
                        temperature_gain,
                    });
                }

                if self.rng.gen::<f64>() < params.probability {
                    if let Some(report) = self.cells[idx].resolve_observation(params.resolve_fraction)
                    {
                        events.push(SimEvent::Observation {
                            cell: coord,
                            report,
                        });
                    }
                    if let Some(partner) = self.cells[idx].entangled_with() {
                        let delta = self.cells[idx].temperature() * ENTANGLEMENT_COUPLING;
                        let partner_idx = self.index(partner);
                        self.cells[partner_idx].temperature += delta;
                        events.push(SimEvent::EntanglementCoupling {
                            from: coord,
                            to: partner,
                            delta,
                        });
                    }
                }

                let temperature_noise = self.symmetric_draw(self.config.quantum_amplitude_temp);
                let fragment_noise = self.symmetric_draw(self.config.quantum_amplitude_frag);
                let cell = &mut self.cells[idx];
                cell.perturb(temperature_noise * noise_scale, fragment_noise * noise_scale);

                temperature.set(row, col, cell.temperature());
                fragments.set(row, col, cell.entropy_fragments());
                observations.set(row, col, cell.observation_count());
            }
        }

        let effective_diffusion = self.config.diffusion_rate * causality;
        let diffused_temperature = diffuse(&temperature, effective_diffusion);
        let diffused_fragments = diffuse(&fragments, effective_diffusion);

        for row in 0..size {
            for col in 0..size {
                let idx = self.index((row, col));
                self.cells[idx].commit_diffused(
                    diffused_temperature.get(row, col),
                    diffused_fragments.get(row, col),
                );
            }
        }

        let total_entropy = fragments.sum();
        let total_temperature = temperature.sum();
        self.entropy_history.push(total_entropy);
        self.temperature_history.push(total_temperature);

        let step_record = StepRecord {
            step: self.step_records.len() as u64 + 1,
            total_entropy,
            total_temperature,
            bh_events_total: self.bh_event_count,
            bh_events_this_step: dissipated.len(),
            entanglement_pairs: entangled.len() / 2,
            causality_strength: causality,
        };
        log::debug!(
            "Step {}: entropy {:.0}, temperature {:.1}, {} events",
            step_record.step,
            total_entropy,
            total_temperature,
            events.len()
        );
        self.step_records.push(step_record);

        StepOutput {
            events,
            temperature: diffused_temperature,
            fragments: diffused_fragments,
            observations,
            dissipated,
            entangled,
        }
    }

    /// Reinitialize every cell and clear counters, histories and records.
    ///
    /// Grid size, region, parameters and the causality knob are kept.
    pub fn reset(&mut self) {
        self.cells = fresh_cells(&self.config);
        self.bh_event_count = 0;
        self.entropy_history.clear();
        self.temperature_history.clear();
        self.step_records.clear();
        log::info!("Simulation reset");
    }

    /// Export the step records as CSV, returning the number of rows written.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<usize, ExportError> {
        let path = path.as_ref();
        let rows = record::write_csv(&self.step_records, path)?;
        log::info!("Exported {} steps to {}", rows, path.display());
        Ok(rows)
    }

    /// Link `a` and `b` reciprocally, dropping any link either had before.
    fn entangle(&mut self, a: Coord, b: Coord) {
        self.unlink(a);
        self.unlink(b);
        let (ia, ib) = (self.index(a), self.index(b));
        self.cells[ia].entangled_with = Some(b);
        self.cells[ib].entangled_with = Some(a);
    }

    /// Clear the link at `at` and its partner's back-reference.
    fn unlink(&mut self, at: Coord) {
        let idx = self.index(at);
        if let Some(partner) = self.cells[idx].entangled_with.take() {
            let partner_idx = self.index(partner);
            if self.cells[partner_idx].entangled_with == Some(at) {
                self.cells[partner_idx].entangled_with = None;
            }
        }
    }

    /// Uniform draw in [-amplitude, amplitude). Always consumes one value.
    fn symmetric_draw(&mut self, amplitude: f64) -> f64 {
        (self.rng.gen::<f64>() * 2.0 - 1.0) * amplitude
    }

    fn index(&self, (row, col): Coord) -> usize {
        row * self.config.grid_size + col
    }
}

fn fresh_cells(config: &SimulationConfig) -> Vec<CellState> {
    let count = config.grid_size * config.grid_size;
    (0..count)
        .map(|_| CellState::new(config.cbr_strength, config.uncertainty_prob))
        .collect()
}
