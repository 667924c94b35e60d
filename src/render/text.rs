use fontdue::{Font, FontSettings};

use super::raster::Canvas;
use crate::error::{RenderError, Result};
use crate::synth::TextDirective;

const FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

/// Below this pixel size text is not drawn at all.
const MIN_TEXT_SIZE: f32 = 1.0;

pub struct TextOverlay {
    font: Font,
}

impl TextOverlay {
    /// The bundled monospace font, used when no font file is configured.
    pub fn embedded() -> Result<Self> {
        Self::from_bytes(FONT_DATA)
    }

    /// Parse a TrueType/OpenType font.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| RenderError::Config(format!("failed to parse font: {}", e)))?;
        Ok(Self { font })
    }

    /// Composite a text directive centered on its anchor point.
    pub fn composite(&self, canvas: &mut Canvas<'_>, directive: &TextDirective) {
        let size = directive.size;
        if !size.is_finite() || size < MIN_TEXT_SIZE || directive.alpha <= 0.0 {
            return;
        }

        let mut cursor_x = directive.x - self.measure_width(&directive.text, size) / 2.0;
        let top = directive.y - size / 2.0;

        for ch in directive.text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, size);
            let glyph_x = cursor_x.round() as i64 + metrics.xmin as i64;
            let glyph_y = top.round() as i64 + size as i64 - metrics.height as i64 - metrics.ymin as i64;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let a = coverage as f32 / 255.0 * directive.alpha;
                    canvas.blend(glyph_x + gx as i64, glyph_y + gy as i64, directive.color, a);
                }
            }

            cursor_x += metrics.advance_width;
        }
    }

    /// Width of rendered text in pixels at `size`.
    pub fn measure_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.font.metrics(ch, size).advance_width)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rgb;

    const WHITE: Rgb = Rgb::new(255, 255, 255);

    fn directive(text: &str, size: f32, alpha: f32) -> TextDirective {
        TextDirective {
            text: text.into(),
            x: 80.0,
            y: 20.0,
            size,
            color: WHITE,
            alpha,
        }
    }

    fn lit(overlay: &TextOverlay, d: &TextDirective) -> usize {
        let mut buf = vec![0u8; 160 * 40 * 3];
        overlay.composite(&mut Canvas::new(&mut buf, 160, 40), d);
        buf.chunks(3).filter(|p| p.iter().any(|&c| c > 0)).count()
    }

    #[test]
    fn embedded_font_draws_centered_text() {
        let overlay = TextOverlay::embedded().unwrap();
        let mut buf = vec![0u8; 160 * 40 * 3];
        overlay.composite(&mut Canvas::new(&mut buf, 160, 40), &directive("NOW PLAYING", 16.0, 1.0));

        let columns: Vec<usize> = (0..160usize)
            .filter(|&x| (0..40usize).any(|y| buf[(y * 160 + x) * 3] > 0))
            .collect();
        assert!(!columns.is_empty());
        let first = *columns.first().unwrap() as f32;
        let last = *columns.last().unwrap() as f32;
        assert!(((first + last) / 2.0 - 80.0).abs() < 6.0);
        assert!((last - first - overlay.measure_width("NOW PLAYING", 16.0)).abs() < 12.0);
    }

    #[test]
    fn alpha_and_size_fade_text() {
        let overlay = TextOverlay::embedded().unwrap();
        assert_eq!(lit(&overlay, &directive("FULL TRACK", 16.0, 0.0)), 0);
        assert_eq!(lit(&overlay, &directive("FULL TRACK", 0.5, 1.0)), 0);
        assert!(lit(&overlay, &directive("FULL TRACK", 16.0, 1.0)) > lit(&overlay, &directive("FULL TRACK", 6.0, 1.0)));

        let mut faint = vec![0u8; 160 * 40 * 3];
        let mut solid = vec![0u8; 160 * 40 * 3];
        overlay.composite(&mut Canvas::new(&mut faint, 160, 40), &directive("A", 16.0, 0.25));
        overlay.composite(&mut Canvas::new(&mut solid, 160, 40), &directive("A", 16.0, 1.0));
        assert!(faint.iter().max() < solid.iter().max());
    }

    #[test]
    fn garbage_bytes_are_a_config_error() {
        let err = TextOverlay::from_bytes(b"not a font").err().unwrap();
        assert!(matches!(err, RenderError::Config(_)));
    }
}
