//! Layout calculation for label sheets
//!
//! - Slot math (page, row, column of an absolute slot)
//! - Placement of an ordered selection onto page windows
//! - Physical label rectangles on the output page

mod grid;
mod types;

pub use grid::*;
pub use types::*;
