//! Error types for configuration loading and CSV export.
//!
//! The simulation core itself is total: it clamps instead of failing. Only
//! the surfaces that touch the filesystem or accept external input return
//! these errors.

use std::path::PathBuf;

/// Errors raised while loading or validating a [`SimulationConfig`].
///
/// [`SimulationConfig`]: crate::config::SimulationConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),

    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying deserialization error.
        source: serde_json::Error,
    },
}

/// Errors raised by the step-record CSV export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// No step has been recorded since construction or the last reset.
    #[error("no simulation data to export")]
    NoData,

    /// The destination could not be created or written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised while bringing up the viewer window and GPU.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface not supported by adapter")]
    UnsupportedSurface,
}
