pub mod constants;
pub mod layout;
mod options;
pub mod pipeline;
mod preset;
pub mod qr;
pub mod render;
mod selection;
pub mod sheet;
mod store;
mod types;

pub use layout::{place_all_pages, place_on_page, validate_offset};
pub use options::*;
pub use pipeline::{LabelPipeline, RasterBatch};
pub use preset::*;
pub use qr::QrResolver;
pub use render::{LabelBitmap, Rasterize, SurfaceRasterizer, TextFace};
pub use selection::*;
pub use sheet::{LabelSheet, assemble};
pub use store::*;
pub use types::*;
