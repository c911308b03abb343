/// Color ramps for the heat-map panels.
///
/// Each ramp is a handful of sRGB control points sampled from the familiar
/// matplotlib maps and interpolated linearly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Palette {
    /// Black to yellow through red, for temperature
    Inferno,
    /// Purple to yellow through teal, for fragments
    Viridis,
    /// Dark blue to yellow through magenta, for observations
    Plasma,
}

const INFERNO: [[f32; 3]; 5] = [
    [0.001, 0.000, 0.014],
    [0.341, 0.062, 0.429],
    [0.735, 0.216, 0.330],
    [0.978, 0.557, 0.035],
    [0.988, 0.998, 0.645],
];

const VIRIDIS: [[f32; 3]; 5] = [
    [0.267, 0.005, 0.329],
    [0.230, 0.322, 0.546],
    [0.128, 0.567, 0.551],
    [0.369, 0.789, 0.383],
    [0.993, 0.906, 0.144],
];

const PLASMA: [[f32; 3]; 5] = [
    [0.050, 0.030, 0.528],
    [0.494, 0.012, 0.658],
    [0.798, 0.280, 0.470],
    [0.973, 0.585, 0.254],
    [0.940, 0.975, 0.131],
];

impl Palette {
    /// Map `t` in [0, 1] to an RGBA color; out-of-range values are clamped
    pub fn sample(self, t: f32) -> [f32; 4] {
        let stops = match self {
            Palette::Inferno => &INFERNO,
            Palette::Viridis => &VIRIDIS,
            Palette::Plasma => &PLASMA,
        };
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let scaled = t * (stops.len() - 1) as f32;
        let lower = (scaled.floor() as usize).min(stops.len() - 2);
        let frac = scaled - lower as f32;
        let (a, b) = (stops[lower], stops[lower + 1]);
        [
            a[0] + (b[0] - a[0]) * frac,
            a[1] + (b[1] - a[1]) * frac,
            a[2] + (b[2] - a[2]) * frac,
            1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_match_stops() {
        assert_eq!(Palette::Inferno.sample(0.0), [0.001, 0.000, 0.014, 1.0]);
        let top = Palette::Viridis.sample(1.0);
        for (got, want) in top.iter().zip([0.993, 0.906, 0.144, 1.0]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_clamps_out_of_range() {
        assert_eq!(Palette::Plasma.sample(-3.0), Palette::Plasma.sample(0.0));
        assert_eq!(Palette::Plasma.sample(7.0), Palette::Plasma.sample(1.0));
        assert_eq!(Palette::Plasma.sample(f32::NAN), Palette::Plasma.sample(0.0));
    }

    #[test]
    fn test_brightness_rises() {
        let luma = |c: [f32; 4]| c[0] + c[1] + c[2];
        let low = luma(Palette::Inferno.sample(0.1));
        let high = luma(Palette::Inferno.sample(0.9));
        assert!(high > low);
    }
}
