use std::f32::consts::PI;

use super::draw::{DrawList, Primitive};
use super::FrameInput;
use crate::config::{Palette, VisualStyle};

/// Depth of the periodic motion term at full motion.
const MOTION_DEPTH: f32 = 0.3;
/// Weight of the spectral centroid in amplitude-driven sizes.
const CENTROID_WEIGHT: f32 = 0.5;

/// Audio-driven geometry for one visual style.
pub trait StyleRenderer: Send + Sync {
    fn draw(&self, input: &FrameInput, palette: &Palette, list: &mut DrawList);
}

static WAVEFORM: Waveform = Waveform { bars: 64 };
static CIRCULAR: Circular = Circular { rings: 3, dots: 48 };
static SPECTRUM: Spectrum = Spectrum { bars: 64 };

impl VisualStyle {
    pub fn renderer(self) -> &'static dyn StyleRenderer {
        match self {
            VisualStyle::Waveform => &WAVEFORM,
            VisualStyle::Circular => &CIRCULAR,
            VisualStyle::Spectrum => &SPECTRUM,
        }
    }
}

/// Where bars grow from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    /// Mirrored around the vertical center
    Center,
    /// Rising from a baseline near the bottom edge
    Bottom,
}

/// Horizontal row of bars spanning most of the frame width.
struct BarRow {
    anchor: Anchor,
    max_height: f32,
}

impl BarRow {
    fn push(&self, input: &FrameInput, palette: &Palette, heights: &[f32], list: &mut DrawList) {
        let w = input.width();
        let h = input.height();
        let margin = (w * 0.026).round();
        let slot = ((w - 2.0 * margin) / heights.len() as f32).floor().max(1.0);
        let bar_width = (slot - 2.0).max(1.0);
        let baseline = (h * 0.9).round();

        for (i, &bar_h) in heights.iter().enumerate() {
            let bar_h = bar_h.clamp(0.0, self.max_height);
            let x = margin + i as f32 * slot;
            let y = match self.anchor {
                Anchor::Center => h / 2.0 - bar_h / 2.0,
                Anchor::Bottom => baseline - bar_h,
            };
            list.push(Primitive::Rect {
                x,
                y,
                width: bar_width,
                height: bar_h,
                color: input.element_color(i, palette),
            });
        }
    }
}

/// Mirrored vertical bars driven by the amplitude envelope.
pub struct Waveform {
    pub bars: usize,
}

impl Waveform {
    /// Bar heights before clamping, in pixels.
    pub fn heights(&self, input: &FrameInput) -> Vec<f32> {
        let s = &input.sample;
        let max_height = input.height() / 2.0;
        let base = s.amplitude * max_height;
        let depth = MOTION_DEPTH * input.motion();
        (0..self.bars)
            .map(|i| {
                let variation = input.wave(i, self.bars, 4.0) * depth;
                base * (1.0 + variation + s.centroid * CENTROID_WEIGHT) * input.emphasis_gain()
            })
            .collect()
    }
}

impl StyleRenderer for Waveform {
    fn draw(&self, input: &FrameInput, palette: &Palette, list: &mut DrawList) {
        let row = BarRow {
            anchor: Anchor::Center,
            max_height: input.height() / 2.0,
        };
        row.push(input, palette, &self.heights(input), list);
    }
}

/// Bottom-anchored bars shaped by spectral brightness.
///
/// Bars peak around the position of the spectral centroid; the rolloff
/// widens the peak and, with the centroid, sets the overall level.
pub struct Spectrum {
    pub bars: usize,
}

impl Spectrum {
    pub fn heights(&self, input: &FrameInput) -> Vec<f32> {
        let s = &input.sample;
        let max_height = input.height() * 0.6;
        let drive = 0.4 * s.centroid + 0.4 * s.rolloff + 0.2 * s.amplitude;
        let spread = 0.08 + 0.3 * s.rolloff;
        let depth = MOTION_DEPTH * input.motion();
        (0..self.bars)
            .map(|i| {
                let pos = (i as f32 + 0.5) / self.bars as f32;
                let shape = (-(pos - s.centroid).powi(2) / (2.0 * spread * spread)).exp();
                let variation = input.wave(i, self.bars, 6.0) * depth;
                max_height * drive * (0.25 + 0.75 * shape) * (1.0 + variation) * input.emphasis_gain()
            })
            .collect()
    }
}

impl StyleRenderer for Spectrum {
    fn draw(&self, input: &FrameInput, palette: &Palette, list: &mut DrawList) {
        let row = BarRow {
            anchor: Anchor::Bottom,
            max_height: input.height() * 0.6,
        };
        row.push(input, palette, &self.heights(input), list);
    }
}

/// Concentric rings around the frame center with a halo of dots.
pub struct Circular {
    pub rings: usize,
    pub dots: usize,
}

impl Circular {
    /// Ring radii, innermost first, in pixels.
    pub fn radii(&self, input: &FrameInput) -> Vec<f32> {
        let s = &input.sample;
        let shorter = input.resolution.shorter_side() as f32;
        let max_radius = shorter / 3.0;
        let limit = (shorter / 2.0 - 2.0).max(1.0);
        let depth = MOTION_DEPTH * input.motion();
        (0..self.rings)
            .map(|ring| {
                let base = max_radius * (0.4 + 0.6 * (ring + 1) as f32 / self.rings as f32);
                let variation = input.wave(ring, self.rings, 1.0) * depth;
                let scale = 0.6 + 0.4 * s.amplitude * (1.0 + variation + s.centroid * CENTROID_WEIGHT);
                (base * scale * input.emphasis_gain()).clamp(1.0, limit)
            })
            .collect()
    }
}

impl StyleRenderer for Circular {
    fn draw(&self, input: &FrameInput, palette: &Palette, list: &mut DrawList) {
        let shorter = input.resolution.shorter_side() as f32;
        let limit = (shorter / 2.0 - 2.0).max(1.0);
        let thickness = (shorter / 90.0).max(2.0);
        let cx = input.width() / 2.0;
        let cy = input.height() / 2.0;

        let radii = self.radii(input);
        for (ring, &radius) in radii.iter().enumerate().rev() {
            list.push(Primitive::Circle {
                cx,
                cy,
                radius,
                stroke: Some(thickness),
                color: input.element_color(ring, palette),
            });
        }

        let outer = radii.last().copied().unwrap_or(0.0);
        let reach = shorter / 3.0 * 0.25;
        let depth = MOTION_DEPTH * input.motion();
        for k in 0..self.dots {
            let angle = 2.0 * PI * k as f32 / self.dots as f32;
            let variation = input.wave(k, self.dots, 4.0) * depth;
            let offset = thickness * 2.0
                + input.sample.amplitude * reach * (1.0 + variation) * input.emphasis_gain();
            let r = (outer + offset).min(limit);
            list.push(Primitive::Point {
                x: cx + r * angle.cos(),
                y: cy + r * angle.sin(),
                size: thickness,
                color: input.element_color(k, palette),
            });
        }
    }
}
