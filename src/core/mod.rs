//! Trading core: sizing, placement, session tracking and the per-symbol loop

pub mod control_loop;
pub mod grid;
pub mod placement;
pub mod session;
pub mod supervisor;

pub use control_loop::{ControlLoop, LoopExit};
pub use grid::{size_grid, GridLevel, GridParams, SizingResult};
pub use placement::{place_grid, PlacementReport};
pub use session::{SessionTracker, StopReason};
pub use supervisor::Supervisor;
