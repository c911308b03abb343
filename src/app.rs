use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::{
    CAUSALITY_KEY_STEP, CELL_PIXELS, EXPORT_PREFIX, HISTORY_CAPACITY, LAYOUT_COLUMNS, MAX_STEPS,
    PANEL_COUNT, PANEL_GAP, STEP_INTERVAL,
};
use crate::error::ViewerError;
use crate::gpu::{
    GpuContext, HeatmapRenderer, HistoryPoint, PanelBuffers, PanelCell, Palette, FLAG_DISSIPATED,
    FLAG_ENTANGLED,
};
use crate::simulation::{Coord, GridSimulator, StepOutput};

const HELP_TEXT: &str = "\
Quantum Causality Simulator

Panels (left to right):
  Temperature   information processing activity; rises with events and
                observations, diffuses to neighbors with causality
  Fragments     entropy left behind by processing and black hole events
  Observations  cumulative observations; the dashed box is the agent
                region, observed far more often than the background
  Statistics    total entropy (green) and total temperature (red) per
                step, each on its own scale; dots mark the latest step

Markers:
  magenta dot   black hole (dissipation) event in this step
  cyan cross    cells entangled in this step

Causality strength:
  1.0 (determinism)  diffusion maximal, quantum fluctuation off
  0.0 (chaos)        diffusion off, quantum fluctuation dominant

Keys:
  Space start/pause   N single step   R reset
  Up/Down or +/-      causality strength
  E export CSV        H this help     Escape quit";

/// Running maxima used to normalize the panel colors.
///
/// Only grows between resets so colors stay comparable over a run.
#[derive(Clone, Copy, Debug, PartialEq)]
struct HeatScale {
    temperature: f64,
    fragments: f64,
    observations: f64,
}

impl HeatScale {
    fn new(base_temperature: f64) -> Self {
        Self {
            temperature: base_temperature.max(1.0),
            fragments: 1.0,
            observations: 1.0,
        }
    }

    fn observe(&mut self, output: &StepOutput) {
        self.temperature = self
            .temperature
            .max(peak(output.temperature.values().iter().copied()));
        self.fragments = self
            .fragments
            .max(peak(output.fragments.values().iter().copied()));
        self.observations = self
            .observations
            .max(peak(output.observations.values().iter().map(|&v| f64::from(v))));
    }
}

fn peak(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(f64::MIN, f64::max)
}

/// Build the three panels (temperature, fragments, observations) from the
/// live grid, panel after panel in row-major order. `dissipated` and
/// `entangled` are the last step's event cells.
fn build_panels<R: rand::Rng>(
    sim: &GridSimulator<R>,
    scale: &HeatScale,
    dissipated: &[Coord],
    entangled: &[Coord],
) -> Vec<PanelCell> {
    let size = sim.size();
    let mut panels = vec![PanelCell::default(); PANEL_COUNT as usize * size * size];

    for row in 0..size {
        for col in 0..size {
            let cell = sim.cell(row, col);
            let mut flags = 0;
            if dissipated.contains(&(row, col)) {
                flags |= FLAG_DISSIPATED;
            }
            if entangled.contains(&(row, col)) {
                flags |= FLAG_ENTANGLED;
            }

            let values = [
                (Palette::Inferno, cell.temperature() / scale.temperature),
                (Palette::Viridis, cell.entropy_fragments() / scale.fragments),
                (
                    Palette::Plasma,
                    f64::from(cell.observation_count()) / scale.observations,
                ),
            ];
            for (panel, (palette, t)) in values.into_iter().enumerate() {
                panels[panel * size * size + row * size + col] = PanelCell {
                    color: palette.sample(t as f32),
                    flags,
                    _padding: [0; 3],
                };
            }
        }
    }

    panels
}

/// Scale each history series to [0, 1] over its own range, as the
/// statistics panel plots the two on independent axes. Only the newest
/// `HISTORY_CAPACITY` steps are kept; a flat series sits mid-height.
fn history_points(entropy: &[f64], temperature: &[f64]) -> Vec<HistoryPoint> {
    let entropy = &entropy[entropy.len().saturating_sub(HISTORY_CAPACITY)..];
    let temperature = &temperature[temperature.len().saturating_sub(HISTORY_CAPACITY)..];
    let entropy_range = value_range(entropy);
    let temperature_range = value_range(temperature);

    entropy
        .iter()
        .zip(temperature)
        .map(|(&e, &t)| HistoryPoint {
            entropy: unit(e, entropy_range),
            temperature: unit(t, temperature_range),
        })
        .collect()
}

fn value_range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn unit(value: f64, (lo, hi): (f64, f64)) -> f32 {
    if hi > lo {
        ((value - lo) / (hi - lo)) as f32
    } else {
        0.5
    }
}

/// GPU resources, created once the window exists
struct Viewer {
    window: Arc<Window>,
    gpu: GpuContext,
    buffers: PanelBuffers,
    renderer: HeatmapRenderer,
}

/// Application state
pub struct App {
    viewer: Option<Viewer>,
    simulator: GridSimulator,
    scale: HeatScale,
    last_dissipated: Vec<Coord>,
    last_entangled: Vec<Coord>,
    current_step: u64,
    running: bool,
    last_step_at: Instant,
    fatal: Option<ViewerError>,
}

impl App {
    pub fn new(simulator: GridSimulator) -> Self {
        let scale = HeatScale::new(simulator.config().cbr_strength * 10.0);
        Self {
            viewer: None,
            simulator,
            scale,
            last_dissipated: Vec::new(),
            last_entangled: Vec::new(),
            current_step: 0,
            running: false,
            last_step_at: Instant::now(),
            fatal: None,
        }
    }

    /// Error that stopped the event loop, if any
    pub fn take_error(&mut self) -> Option<ViewerError> {
        self.fatal.take()
    }

    fn init_viewer(&self, event_loop: &ActiveEventLoop) -> Result<Viewer, ViewerError> {
        let size = self.simulator.size() as u32;
        let panels_wide =
            LAYOUT_COLUMNS as f32 * size as f32 + (LAYOUT_COLUMNS + 1) as f32 * PANEL_GAP;
        let window_attrs = Window::default_attributes()
            .with_title("Quantum Causality Simulator")
            .with_inner_size(winit::dpi::LogicalSize::new(
                (panels_wide * CELL_PIXELS as f32) as u32,
                ((size as f32 + 2.0 * PANEL_GAP) * CELL_PIXELS as f32) as u32,
            ));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        log::info!("Creating GPU context...");
        let gpu = pollster::block_on(GpuContext::new(window.clone()))?;
        let buffers = PanelBuffers::new(&gpu.device, size);
        let renderer = HeatmapRenderer::new(&gpu.device, gpu.format(), &buffers);

        Ok(Viewer {
            window,
            gpu,
            buffers,
            renderer,
        })
    }

    /// Run one simulation step and fold its output into the view state
    fn advance(&mut self) {
        if self.current_step >= MAX_STEPS {
            self.running = false;
            return;
        }

        let output = self.simulator.step();
        self.current_step += 1;
        self.last_step_at = Instant::now();
        self.scale.observe(&output);
        self.last_dissipated = output.dissipated.clone();
        self.last_entangled = output.entangled.clone();

        log::info!("--- Step {} ---", self.current_step);
        for event in output.highlights() {
            log::info!("{}", event);
        }
        log::debug!("{}", output.log());
        log::debug!(
            "{} observations, {} dissipation events",
            output.observation_events(),
            output.dissipated.len()
        );

        if self.current_step >= MAX_STEPS {
            self.running = false;
            log::info!("Simulation complete after {} steps", self.current_step);
        }
        self.refresh();
    }

    fn reset(&mut self) {
        self.running = false;
        self.simulator.reset();
        self.current_step = 0;
        self.scale = HeatScale::new(self.simulator.config().cbr_strength * 10.0);
        self.last_dissipated.clear();
        self.last_entangled.clear();
        self.refresh();
    }

    fn export(&self) {
        let filename = format!(
            "{}_{}.csv",
            EXPORT_PREFIX,
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        match self.simulator.export_csv(&filename) {
            Ok(rows) => log::info!("Data exported to {} ({} steps)", filename, rows),
            Err(e) => log::warn!("Export failed: {}", e),
        }
    }

    fn nudge_causality(&mut self, delta: f64) {
        let value = self.simulator.causality_strength() + delta;
        self.simulator.set_causality_strength(value);
        log::info!(
            "Causality strength: {:.2}",
            self.simulator.causality_strength()
        );
        self.refresh();
    }

    fn title(&self) -> String {
        let total_entropy = self.simulator.entropy_history().last().copied().unwrap_or(0.0);
        let total_temperature = self
            .simulator
            .temperature_history()
            .last()
            .copied()
            .unwrap_or(0.0);
        let state = if self.current_step >= MAX_STEPS {
            "Simulation Complete"
        } else if self.running {
            "Running"
        } else {
            "Paused"
        };
        format!(
            "Quantum Causality - {} | Step: {} | BH events: {} | Total Entropy: {:.0} | Total Temp: {:.0} | Causality: {:.2}",
            state,
            self.current_step,
            self.simulator.bh_event_count(),
            total_entropy,
            total_temperature,
            self.simulator.causality_strength()
        )
    }

    /// Re-upload panel data and schedule a redraw
    fn refresh(&self) {
        if let Some(viewer) = &self.viewer {
            let panels = build_panels(
                &self.simulator,
                &self.scale,
                &self.last_dissipated,
                &self.last_entangled,
            );
            viewer.buffers.write_cells(&viewer.gpu.queue, &panels);
            let history = history_points(
                self.simulator.entropy_history(),
                self.simulator.temperature_history(),
            );
            viewer.buffers.write_history(&viewer.gpu.queue, &history);
            viewer.window.set_title(&self.title());
            viewer.window.request_redraw();
        }
    }

    fn render(&self) {
        let Some(viewer) = &self.viewer else {
            return;
        };
        let gpu = &viewer.gpu;
        let region = &self.simulator.config().agent_region;
        viewer.buffers.write_params(
            &gpu.queue,
            gpu.surface_size(),
            (region.rows.start, region.rows.end),
            (region.cols.start, region.cols.end),
        );

        let output = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                viewer.window.request_redraw();
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        viewer.renderer.draw(&mut encoder, &view);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }

    fn handle_key(&mut self, key_code: KeyCode) {
        match key_code {
            KeyCode::Space => {
                if self.current_step >= MAX_STEPS {
                    log::info!("Step limit reached, press R to reset");
                } else {
                    self.running = !self.running;
                    log::info!("{}", if self.running { "Running" } else { "Paused" });
                    self.refresh();
                }
            }
            KeyCode::KeyN => {
                self.running = false;
                self.advance();
            }
            KeyCode::KeyR => self.reset(),
            KeyCode::ArrowUp | KeyCode::Equal | KeyCode::NumpadAdd => {
                self.nudge_causality(CAUSALITY_KEY_STEP)
            }
            KeyCode::ArrowDown | KeyCode::Minus | KeyCode::NumpadSubtract => {
                self.nudge_causality(-CAUSALITY_KEY_STEP)
            }
            KeyCode::KeyE => self.export(),
            KeyCode::KeyH => log::info!("\n{}", HELP_TEXT),
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        log::info!(
            "Initializing viewer for a {}x{} grid...",
            self.simulator.size(),
            self.simulator.size()
        );
        match self.init_viewer(event_loop) {
            Ok(viewer) => {
                self.viewer = Some(viewer);
                self.refresh();
                log::info!("Press H for help, Space to start");
            }
            Err(e) => {
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && !event.repeat {
                    if let PhysicalKey::Code(key_code) = event.physical_key {
                        if key_code == KeyCode::Escape {
                            event_loop.exit();
                        } else {
                            self.handle_key(key_code);
                        }
                    }
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.gpu.resize(new_size);
                    viewer.window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if !self.running {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        if self.last_step_at.elapsed() >= STEP_INTERVAL {
            self.advance();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.last_step_at + STEP_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    fn simulator() -> GridSimulator {
        GridSimulator::new(SimulationConfig {
            rng_seed: Some(8),
            ..SimulationConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_heat_scale_only_grows() {
        let mut sim = simulator();
        let mut scale = HeatScale::new(20.0);
        let out = sim.step();
        scale.observe(&out);

        let hottest = peak(out.temperature.values().iter().copied());
        assert_eq!(scale.temperature, hottest.max(20.0));

        let before = scale;
        sim.reset();
        let quiet = sim.step_with_causality(1.0);
        scale.observe(&quiet);
        assert!(scale.temperature >= before.temperature);
        assert!(scale.fragments >= before.fragments);
    }

    #[test]
    fn test_panels_cover_every_cell() {
        let mut sim = simulator();
        let mut scale = HeatScale::new(20.0);
        let out = sim.step();
        scale.observe(&out);

        let panels = build_panels(&sim, &scale, &[(1, 2)], &[(0, 0), (4, 4)]);

        assert_eq!(panels.len(), 3 * 25);
        // (1, 2) on a 5x5 grid
        let idx = 7;
        for panel in 0..3 {
            let base = panel * 25;
            assert_eq!(panels[base + idx].flags, FLAG_DISSIPATED);
            assert_eq!(panels[base].flags, FLAG_ENTANGLED);
            assert_eq!(panels[base + 24].flags, FLAG_ENTANGLED);
            assert_eq!(panels[base + 1].flags, 0);
        }
        assert!(panels.iter().all(|p| p.color[3] == 1.0));
    }

    #[test]
    fn test_entangled_marker_follows_step_not_links() {
        let mut sim = GridSimulator::new(SimulationConfig {
            rng_seed: Some(3),
            entanglement_prob: 1.0,
            ..SimulationConfig::default()
        })
        .unwrap();
        let scale = HeatScale::new(20.0);
        // A roll that draws the same cell twice links nothing
        let out = (0..20)
            .map(|_| sim.step())
            .find(|out| !out.entangled.is_empty())
            .unwrap();
        assert_eq!(out.entangled.len(), 2);

        let linked = out.entangled[0];
        assert!(sim.cell(linked.0, linked.1).entangled_with().is_some());

        let marked = build_panels(&sim, &scale, &[], &out.entangled);
        let unmarked = build_panels(&sim, &scale, &[], &[]);
        let idx = linked.0 * 5 + linked.1;
        assert_eq!(marked[idx].flags, FLAG_ENTANGLED);
        assert_eq!(unmarked[idx].flags, 0);
    }

    #[test]
    fn test_history_points_scale_each_series() {
        let points = history_points(&[10.0, 30.0, 20.0], &[500.0, 500.0, 500.0]);

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].entropy, 0.0);
        assert_eq!(points[1].entropy, 1.0);
        assert_eq!(points[2].entropy, 0.5);
        assert!(points.iter().all(|p| p.temperature == 0.5));
        assert!(history_points(&[], &[]).is_empty());
    }

    #[test]
    fn test_history_points_keep_newest() {
        let entropy: Vec<f64> = (0..HISTORY_CAPACITY + 10).map(|i| i as f64).collect();
        let temperature = entropy.clone();

        let points = history_points(&entropy, &temperature);

        assert_eq!(points.len(), HISTORY_CAPACITY);
        assert_eq!(points[0].entropy, 0.0);
        assert_eq!(points[HISTORY_CAPACITY - 1].entropy, 1.0);
    }

    #[test]
    fn test_advance_tracks_step_markers() {
        let mut app = App::new(
            GridSimulator::new(SimulationConfig {
                rng_seed: Some(4),
                entanglement_prob: 1.0,
                dissipation_prob: 1.0,
                ..SimulationConfig::default()
            })
            .unwrap(),
        );

        app.advance();
        while app.last_entangled.is_empty() {
            app.advance();
        }
        assert_eq!(app.last_entangled.len(), 2);
        assert_eq!(app.last_dissipated.len(), 25);

        app.reset();
        assert!(app.last_entangled.is_empty());
        assert!(app.last_dissipated.is_empty());
    }

    #[test]
    fn test_title_reports_state() {
        let mut app = App::new(simulator());
        assert!(app.title().contains("Paused"));
        assert!(app.title().contains("Step: 0"));

        app.advance();
        assert!(app.title().contains("Step: 1"));

        app.nudge_causality(0.5);
        assert!(app.title().contains("Causality: 1.00"));

        app.reset();
        assert!(app.title().contains("Step: 0"));
        assert!(app.simulator.step_records().is_empty());
    }
}
