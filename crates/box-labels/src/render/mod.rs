//! Label rendering
//!
//! - Item record to label surface (display list in CSS pixels)
//! - Text faces (TrueType or built-in bitmap)
//! - Surface to bitmap rasterization

mod label;
mod raster;
mod surface;
mod text;

pub use label::*;
pub use raster::*;
pub use surface::*;
pub use text::*;
