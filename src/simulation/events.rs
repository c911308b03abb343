use std::fmt;

use super::cell::{AbsorbReport, ObservationReport};
use super::matrix::Matrix;
use super::Coord;

/// Something that happened during one simulation step.
///
/// Drivers branch on the variant; `Display` renders the classic log line.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// A cell absorbed its batch of events
    Absorbed { cell: Coord, report: AbsorbReport },
    /// A dissipation ("black hole") event fired in a cell
    Dissipation { cell: Coord, temperature_gain: f64 },
    /// A cell was observed and resolved part of its buffer
    Observation { cell: Coord, report: ObservationReport },
    /// Two cells became entangled
    EntanglementCreated { a: Coord, b: Coord },
    /// An observed cell nudged its partner's temperature
    EntanglementCoupling { from: Coord, to: Coord, delta: f64 },
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::Absorbed { cell, report } => {
                write!(f, "[Cell {},{}] {}", cell.0, cell.1, report)
            }
            SimEvent::Dissipation {
                cell,
                temperature_gain,
            } => write!(
                f,
                "BlackHole at ({},{}), Temp+{}",
                cell.0, cell.1, temperature_gain
            ),
            SimEvent::Observation { cell, report } => {
                write!(f, "[Cell {},{}] {}", cell.0, cell.1, report)
            }
            SimEvent::EntanglementCreated { a, b } => write!(
                f,
                "Entanglement created between ({},{}) and ({},{})",
                a.0, a.1, b.0, b.1
            ),
            SimEvent::EntanglementCoupling { from, to, delta } => write!(
                f,
                "Entanglement effect on ({},{}) from ({},{}), Temp+{:.1}",
                to.0, to.1, from.0, from.1, delta
            ),
        }
    }
}

/// Everything a driver needs after one step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    pub events: Vec<SimEvent>,
    /// Post-diffusion temperature
    pub temperature: Matrix<f64>,
    /// Post-diffusion entropy fragments
    pub fragments: Matrix<f64>,
    pub observations: Matrix<u32>,
    /// Cells with a dissipation event this step, in processing order
    pub dissipated: Vec<Coord>,
    /// Cells entangled this step, as consecutive pairs
    pub entangled: Vec<Coord>,
}

impl StepOutput {
    /// Render the step's events as a newline-separated text log
    pub fn log(&self) -> String {
        let mut log = String::new();
        for event in &self.events {
            log.push_str(&event.to_string());
            log.push('\n');
        }
        log
    }

    /// Every event except the routine per-cell absorb trace
    pub fn highlights(&self) -> impl Iterator<Item = &SimEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, SimEvent::Absorbed { .. }))
    }

    pub fn observation_events(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SimEvent::Observation { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_entanglement() {
        let event = SimEvent::EntanglementCreated { a: (0, 1), b: (3, 4) };
        assert_eq!(
            event.to_string(),
            "Entanglement created between (0,1) and (3,4)"
        );
    }

    #[test]
    fn test_log_joins_lines() {
        let output = StepOutput {
            events: vec![
                SimEvent::Dissipation {
                    cell: (2, 2),
                    temperature_gain: 1.0,
                },
                SimEvent::EntanglementCoupling {
                    from: (0, 0),
                    to: (1, 1),
                    delta: 7.0,
                },
            ],
            temperature: Matrix::new(1),
            fragments: Matrix::new(1),
            observations: Matrix::new(1),
            dissipated: vec![(2, 2)],
            entangled: Vec::new(),
        };

        let log = output.log();
        assert_eq!(log.lines().count(), 2);
        assert!(log.starts_with("BlackHole at (2,2)"));
        assert!(log.contains("Entanglement effect on (1,1)"));
        assert_eq!(output.observation_events(), 0);
    }

    #[test]
    fn test_highlights_skip_absorb_trace() {
        let absorbed = SimEvent::Absorbed {
            cell: (0, 0),
            report: AbsorbReport {
                events: 1000,
                temperature_gain: 50.0,
                fragment_gain: 34.0,
                buffered: 100.0,
                dissipation: None,
                cleanup: 0.0,
                fragments_after: 34.0,
            },
        };
        let observed = SimEvent::Observation {
            cell: (0, 0),
            report: ObservationReport {
                count: 1,
                resolved: 50.0,
                temperature_gain: 7.5,
                fragment_gain: 25.0,
            },
        };
        let linked = SimEvent::EntanglementCreated { a: (0, 0), b: (1, 1) };
        let output = StepOutput {
            events: vec![absorbed, observed.clone(), linked.clone()],
            temperature: Matrix::new(2),
            fragments: Matrix::new(2),
            observations: Matrix::new(2),
            dissipated: Vec::new(),
            entangled: vec![(0, 0), (1, 1)],
        };

        let highlights: Vec<_> = output.highlights().cloned().collect();
        assert_eq!(highlights, vec![observed, linked]);
        assert_eq!(output.observation_events(), 1);
    }
}
