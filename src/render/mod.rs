//! Rasterization and the frame-emitting pipeline.
pub mod frame;
pub mod pipeline;
pub mod raster;
pub mod reorder;
pub mod text;

pub use frame::{Frame, FrameRasterizer};
pub use pipeline::{Phase, RenderPipeline, RenderReport};
pub use raster::Canvas;
pub use reorder::ReorderBuffer;
pub use text::TextOverlay;
