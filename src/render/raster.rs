use crate::config::Rgb;
use crate::synth::Primitive;

/// Mutable view over a packed RGB buffer.
pub struct Canvas<'a> {
    pixels: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub fn new(pixels: &'a mut [u8], width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 3);
        Self {
            pixels,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, color: Rgb) {
        for px in self.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&color.0);
        }
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 3)
    }

    pub fn set(&mut self, x: i64, y: i64, color: Rgb) {
        if let Some(idx) = self.offset(x, y) {
            self.pixels[idx..idx + 3].copy_from_slice(&color.0);
        }
    }

    /// Alpha-blend `color` over the existing pixel.
    pub fn blend(&mut self, x: i64, y: i64, color: Rgb, alpha: f32) {
        let Some(idx) = self.offset(x, y) else {
            return;
        };
        let a = alpha.clamp(0.0, 1.0);
        let inv_a = 1.0 - a;
        for c in 0..3 {
            let v = color.0[c] as f32 * a + self.pixels[idx + c] as f32 * inv_a;
            self.pixels[idx + c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    /// Pixel index range `[lo, hi)` whose centers fall inside `[start, end)`.
    fn span(start: f32, end: f32, limit: u32) -> (i64, i64) {
        let lo = (start.round() as i64).max(0);
        let hi = (end.round() as i64).min(limit as i64);
        (lo, hi)
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgb) {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) || width <= 0.0 || height <= 0.0 {
            return;
        }
        let (x0, x1) = Self::span(x, x + width, self.width);
        let (y0, y1) = Self::span(y, y + height, self.height);
        for py in y0..y1 {
            for px in x0..x1 {
                self.set(px, py, color);
            }
        }
    }

    /// Disc when `inner` is 0, otherwise the annulus between `inner` and `outer`.
    fn fill_annulus(&mut self, cx: f32, cy: f32, inner: f32, outer: f32, color: Rgb) {
        if ![cx, cy, inner, outer].iter().all(|v| v.is_finite()) || outer <= 0.0 {
            return;
        }
        let (x0, x1) = Self::span(cx - outer, cx + outer + 1.0, self.width);
        let (y0, y1) = Self::span(cy - outer, cy + outer + 1.0, self.height);
        let outer2 = outer * outer;
        let inner2 = inner.max(0.0).powi(2);
        for py in y0..y1 {
            let dy = py as f32 + 0.5 - cy;
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let d2 = dx * dx + dy * dy;
                if d2 <= outer2 && (inner <= 0.0 || d2 >= inner2) {
                    self.set(px, py, color);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb) {
        self.fill_annulus(cx, cy, 0.0, radius, color);
    }

    pub fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32, thickness: f32, color: Rgb) {
        self.fill_annulus(cx, cy, radius - thickness, radius, color);
    }

    pub fn draw(&mut self, primitive: &Primitive) {
        match *primitive {
            Primitive::Rect {
                x,
                y,
                width,
                height,
                color,
            } => self.fill_rect(x, y, width, height, color),
            Primitive::Circle {
                cx,
                cy,
                radius,
                stroke: None,
                color,
            } => self.fill_circle(cx, cy, radius, color),
            Primitive::Circle {
                cx,
                cy,
                radius,
                stroke: Some(thickness),
                color,
            } => self.stroke_circle(cx, cy, radius, thickness, color),
            Primitive::Point { x, y, size, color } => {
                let size = size.max(1.0);
                self.fill_rect(x - size / 2.0, y - size / 2.0, size, size, color)
            }
        }
    }
}
