use super::raster::Canvas;
use super::text::TextOverlay;
use crate::config::{FontSource, Resolution};
use crate::context::RenderContext;
use crate::error::Result;
use crate::synth::DrawList;

/// One rendered video frame: packed RGB, row-major, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    /// Presentation time in microseconds (`index / fps`)
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn timestamp_seconds(&self) -> f64 {
        self.timestamp_us as f64 / 1_000_000.0
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = ((y as usize * self.width as usize) + x as usize) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }
}

/// Presentation time of frame `index` at `fps`, in microseconds.
pub fn timestamp_us(index: usize, fps: u32) -> u64 {
    (index as u128 * 1_000_000 / fps.max(1) as u128) as u64
}

/// Turns draw lists into RGB frames at a fixed resolution.
pub struct FrameRasterizer {
    resolution: Resolution,
    fps: u32,
    text: TextOverlay,
}

impl FrameRasterizer {
    /// Text uses `font` when given, otherwise the bundled font.
    pub fn new(resolution: Resolution, fps: u32, font: Option<&FontSource>, ctx: &RenderContext) -> Result<Self> {
        let text = match font {
            Some(source) => {
                ctx.debug(format!("overlay font: {}", source.path.display()));
                TextOverlay::from_bytes(&source.bytes)?
            }
            None => TextOverlay::embedded()?,
        };
        Ok(Self {
            resolution,
            fps,
            text,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn rasterize(&self, index: usize, list: &DrawList) -> Frame {
        let Resolution { width, height } = self.resolution;
        let mut pixels = vec![0u8; self.resolution.frame_len()];
        {
            let mut canvas = Canvas::new(&mut pixels, width, height);
            canvas.clear(list.background);
            for primitive in &list.primitives {
                canvas.draw(primitive);
            }
            for directive in &list.texts {
                self.text.composite(&mut canvas, directive);
            }
        }
        Frame {
            index,
            timestamp_us: timestamp_us(index, self.fps),
            width,
            height,
            pixels,
        }
    }
}
