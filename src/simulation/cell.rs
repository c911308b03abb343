use std::fmt;

use rand::Rng;

use super::Coord;

/// Temperature added per absorbed event
const TEMPERATURE_PER_EVENT: f64 = 0.05;

/// Fragment yield per event before the temperature boost
const FRAGMENTS_PER_EVENT: f64 = 0.02;

/// Share of events left behind as residual by a dissipation event, half of
/// which lands in the fragments
const DISSIPATION_RESIDUAL: f64 = 0.3;

/// Share of the dissipated fragments converted back into temperature
const DISSIPATION_REHEAT: f64 = 0.01;

/// Routine cleanup rate, scaled by CBR strength
const CLEANUP_RATE: f64 = 0.01;

/// Temperature spike per unit of resolved buffer
const OBSERVATION_HEAT: f64 = 0.15;

/// Fragments produced per unit of resolved buffer
const OBSERVATION_FRAGMENTS: f64 = 0.5;

/// State of a single grid cell.
///
/// `entropy_fragments` and `postponed_buffer` never go negative: every
/// mutation clamps them. The entanglement partner is a coordinate only; the
/// grid keeps the link reciprocal.
#[derive(Clone, Debug, PartialEq)]
pub struct CellState {
    cbr_strength: f64,
    uncertainty_prob: f64,
    pub(crate) temperature: f64,
    pub(crate) entropy_fragments: f64,
    pub(crate) postponed_buffer: f64,
    pub(crate) observation_count: u32,
    pub(crate) entangled_with: Option<Coord>,
}

/// What one `absorb_events` call did to a cell.
#[derive(Clone, Debug, PartialEq)]
pub struct AbsorbReport {
    pub events: u32,
    pub temperature_gain: f64,
    pub fragment_gain: f64,
    pub buffered: f64,
    /// Temperature regained from a dissipation event, if one fired
    pub dissipation: Option<f64>,
    pub cleanup: f64,
    pub fragments_after: f64,
}

/// What one effective `resolve_observation` call did to a cell.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationReport {
    /// Observation count after this observation
    pub count: u32,
    pub resolved: f64,
    pub temperature_gain: f64,
    pub fragment_gain: f64,
}

impl CellState {
    pub fn new(cbr_strength: f64, uncertainty_prob: f64) -> Self {
        Self {
            cbr_strength,
            uncertainty_prob,
            temperature: cbr_strength * 10.0,
            entropy_fragments: 0.0,
            postponed_buffer: 0.0,
            observation_count: 0,
            entangled_with: None,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn entropy_fragments(&self) -> f64 {
        self.entropy_fragments
    }

    #[cfg(test)]
    pub fn postponed_buffer(&self) -> f64 {
        self.postponed_buffer
    }

    pub fn observation_count(&self) -> u32 {
        self.observation_count
    }

    pub fn entangled_with(&self) -> Option<Coord> {
        self.entangled_with
    }

    /// Absorb a batch of events.
    ///
    /// Buffers part of the events, heats the cell, grows its fragments, rolls
    /// once for a dissipation event with probability `dissipation_prob`, and
    /// finally runs the routine fragment cleanup.
    pub fn absorb_events<R: Rng + ?Sized>(
        &mut self,
        event_count: u32,
        dissipation_prob: f64,
        dissipation_factor: f64,
        rng: &mut R,
    ) -> AbsorbReport {
        let events = f64::from(event_count);

        let buffered = events * self.uncertainty_prob;
        self.postponed_buffer += buffered;

        let temperature_gain = events * TEMPERATURE_PER_EVENT;
        self.temperature += temperature_gain;

        let fragment_gain =
            (events * FRAGMENTS_PER_EVENT * (1.0 + self.temperature / 100.0)).floor();
        self.entropy_fragments += fragment_gain;

        let dissipation = if rng.gen::<f64>() < dissipation_prob {
            self.entropy_fragments += (events * DISSIPATION_RESIDUAL * 0.5).floor();
            let dissipated = self.entropy_fragments * dissipation_factor;
            self.entropy_fragments -= dissipated.floor();
            let reheat = (dissipated * DISSIPATION_REHEAT).floor();
            self.temperature += reheat;
            Some(reheat)
        } else {
            None
        };

        let cleanup = (self.entropy_fragments * CLEANUP_RATE * self.cbr_strength).floor();
        self.entropy_fragments = (self.entropy_fragments - cleanup).max(0.0);

        AbsorbReport {
            events: event_count,
            temperature_gain,
            fragment_gain,
            buffered,
            dissipation,
            cleanup,
            fragments_after: self.entropy_fragments,
        }
    }

    /// Resolve `resolve_fraction` of the postponed buffer.
    ///
    /// Returns `None` and leaves the cell untouched when the buffer is empty.
    pub fn resolve_observation(&mut self, resolve_fraction: f64) -> Option<ObservationReport> {
        if self.postponed_buffer <= 0.0 {
            return None;
        }

        self.observation_count += 1;
        let resolved = self.postponed_buffer * resolve_fraction;
        self.postponed_buffer = (self.postponed_buffer - resolved).max(0.0);

        let temperature_gain = resolved * OBSERVATION_HEAT;
        self.temperature += temperature_gain;
        let fragment_gain = (resolved * OBSERVATION_FRAGMENTS).floor();
        self.entropy_fragments += fragment_gain;

        Some(ObservationReport {
            count: self.observation_count,
            resolved,
            temperature_gain,
            fragment_gain,
        })
    }

    /// Apply a random fluctuation to temperature and fragments
    pub(crate) fn perturb(&mut self, temperature_noise: f64, fragment_noise: f64) {
        self.temperature += temperature_noise;
        self.entropy_fragments = (self.entropy_fragments + fragment_noise).max(0.0);
    }

    /// Overwrite temperature and fragments with diffused values
    pub(crate) fn commit_diffused(&mut self, temperature: f64, entropy_fragments: f64) {
        self.temperature = temperature;
        self.entropy_fragments = entropy_fragments.max(0.0);
    }
}

impl fmt::Display for AbsorbReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Events: {}, Temp+{:.1}, Fragments+{}, Postponed+{:.1}",
            self.events, self.temperature_gain, self.fragment_gain, self.buffered
        )?;
        if let Some(reheat) = self.dissipation {
            write!(f, "\nBlackHole! Fragments adjusted, Temp+{}", reheat)?;
        }
        write!(
            f,
            "\nCleanup: {}, Fragments now {:.0}",
            self.cleanup, self.fragments_after
        )
    }
}

impl fmt::Display for ObservationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Observation #{}: resolved {:.1}, Temp+{:.1}, Fragments+{}",
            self.count, self.resolved, self.temperature_gain, self.fragment_gain
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_initial_state() {
        let cell = CellState::new(2.0, 0.1);
        assert_eq!(cell.temperature(), 20.0);
        assert_eq!(cell.entropy_fragments(), 0.0);
        assert_eq!(cell.postponed_buffer(), 0.0);
        assert_eq!(cell.observation_count(), 0);
        assert_eq!(cell.entangled_with(), None);
    }

    #[test]
    fn test_absorb_without_dissipation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cell = CellState::new(2.0, 0.1);

        let report = cell.absorb_events(1000, 0.0, 0.5, &mut rng);

        assert_eq!(cell.postponed_buffer(), 100.0);
        assert_eq!(cell.temperature(), 70.0);
        assert_eq!(cell.entropy_fragments(), 34.0);
        assert_eq!(report.fragment_gain, 34.0);
        assert_eq!(report.cleanup, 0.0);
        assert_eq!(report.dissipation, None);
        assert!(!report.to_string().contains("BlackHole"));
    }

    #[test]
    fn test_absorb_with_forced_dissipation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cell = CellState::new(2.0, 0.1);

        let report = cell.absorb_events(1000, 1.0, 0.5, &mut rng);

        // 34 + 150 residual = 184, half dissipated -> 92, cleanup floor(1.84) = 1
        assert_eq!(report.dissipation, Some(0.0));
        assert_eq!(report.cleanup, 1.0);
        assert_eq!(cell.entropy_fragments(), 91.0);
        assert_eq!(cell.temperature(), 70.0);
        assert!(report.to_string().contains("BlackHole!"));
    }

    #[test]
    fn test_observation_on_empty_buffer_is_noop() {
        let mut cell = CellState::new(2.0, 0.1);
        let before = cell.clone();

        assert!(cell.resolve_observation(0.5).is_none());
        assert_eq!(cell, before);
    }

    #[test]
    fn test_observation_resolves_fraction() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut cell = CellState::new(2.0, 0.1);
        cell.absorb_events(1000, 0.0, 0.5, &mut rng);

        let report = cell.resolve_observation(0.5).unwrap();

        assert_eq!(report.count, 1);
        assert_eq!(report.resolved, 50.0);
        assert_eq!(cell.postponed_buffer(), 50.0);
        assert_eq!(cell.temperature(), 77.5);
        assert_eq!(cell.entropy_fragments(), 34.0 + 25.0);
        assert_eq!(cell.observation_count(), 1);
        assert!(report.to_string().starts_with("Observation #1"));
    }

    #[test]
    fn test_fragments_never_negative() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut cell = CellState::new(2.0, 0.1);

        for i in 0..200 {
            cell.absorb_events(500 + i, 0.5, 1.0, &mut rng);
            cell.perturb(-0.5, -1_000.0);
            assert!(cell.entropy_fragments() >= 0.0);
            assert!(cell.postponed_buffer() >= 0.0);
            cell.resolve_observation(1.0);
            assert!(cell.postponed_buffer() >= 0.0);
        }
    }
}
