mod buffers;
mod context;
mod palette;
mod render;

pub use buffers::{HistoryPoint, PanelBuffers, PanelCell, FLAG_DISSIPATED, FLAG_ENTANGLED};
pub use context::GpuContext;
pub use palette::Palette;
pub use render::HeatmapRenderer;
