mod cell;
mod diffusion;
mod events;
mod grid;
mod matrix;
mod record;

/// Grid position as (row, col)
pub type Coord = (usize, usize);

pub use events::StepOutput;
pub use grid::GridSimulator;
