use std::cell::Cell;

use wgpu::{Buffer, BufferUsages, Device, Queue};

use crate::config::{HISTORY_CAPACITY, PANEL_COUNT, PANEL_GAP};

/// Cell carries a dissipation marker this step
pub const FLAG_DISSIPATED: u32 = 1;

/// Cell became entangled this step
pub const FLAG_ENTANGLED: u32 = 2;

/// One heat-map cell as the fragment shader reads it (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PanelCell {
    /// Linear RGBA fill color
    pub color: [f32; 4],
    /// Bitwise OR of `FLAG_*` markers
    pub flags: u32,
    pub _padding: [u32; 3],
}

/// One step of the statistics plot, each series scaled to [0, 1] (8 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HistoryPoint {
    pub entropy: f32,
    pub temperature: f32,
}

/// Layout parameters passed to the render shader (48 bytes, aligned to 16)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderParams {
    pub grid_size: u32,
    pub panel_count: u32,
    pub surface_width: f32,
    pub surface_height: f32,

    // Agent region, in cell units (end exclusive)
    pub region_col_start: f32,
    pub region_col_end: f32,
    pub region_row_start: f32,
    pub region_row_end: f32,

    pub panel_gap: f32,
    pub margin: f32,
    /// Valid entries in the history buffer
    pub history_len: u32,
    pub _padding: f32,
}

/// Storage buffers for the panel cells and the statistics history, plus the
/// layout uniform.
pub struct PanelBuffers {
    pub cells_buffer: Buffer,
    pub history_buffer: Buffer,
    pub params_buffer: Buffer,
    /// Cells per panel side
    pub grid_size: u32,
    history_len: Cell<u32>,
}

impl PanelBuffers {
    pub fn new(device: &Device, grid_size: u32) -> Self {
        let cell_count = (PANEL_COUNT * grid_size * grid_size) as usize;
        let cells_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("panel-cells-buffer"),
            size: (cell_count * std::mem::size_of::<PanelCell>()) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let history_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("history-buffer"),
            size: (HISTORY_CAPACITY * std::mem::size_of::<HistoryPoint>()) as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("render-params-buffer"),
            size: std::mem::size_of::<RenderParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            cells_buffer,
            history_buffer,
            params_buffer,
            grid_size,
            history_len: Cell::new(0),
        }
    }

    /// Upload all panels, laid out panel after panel in row-major order
    pub fn write_cells(&self, queue: &Queue, cells: &[PanelCell]) {
        debug_assert_eq!(
            cells.len(),
            (PANEL_COUNT * self.grid_size * self.grid_size) as usize,
            "panel data size mismatch"
        );
        queue.write_buffer(&self.cells_buffer, 0, bytemuck::cast_slice(cells));
    }

    /// Upload the statistics history, keeping the newest points if there are
    /// more than the buffer holds
    pub fn write_history(&self, queue: &Queue, points: &[HistoryPoint]) {
        let points = &points[points.len().saturating_sub(HISTORY_CAPACITY)..];
        if !points.is_empty() {
            queue.write_buffer(&self.history_buffer, 0, bytemuck::cast_slice(points));
        }
        self.history_len.set(points.len() as u32);
    }

    /// Upload layout parameters for the current surface size
    pub fn write_params(
        &self,
        queue: &Queue,
        surface_size: (u32, u32),
        region_rows: (usize, usize),
        region_cols: (usize, usize),
    ) {
        let params = RenderParams {
            grid_size: self.grid_size,
            panel_count: PANEL_COUNT,
            surface_width: surface_size.0 as f32,
            surface_height: surface_size.1 as f32,
            region_col_start: region_cols.0 as f32,
            region_col_end: region_cols.1 as f32,
            region_row_start: region_rows.0 as f32,
            region_row_end: region_rows.1 as f32,
            panel_gap: PANEL_GAP,
            margin: PANEL_GAP,
            history_len: self.history_len.get(),
            _padding: 0.0,
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }
}
