//! Per-frame synthesis of draw lists from normalized audio features.
//!
//! Synthesis is a pure function of the frame index and the timeline, plus a
//! PRNG stream seeded per frame (`base_seed ^ frame_index`). Frames can
//! therefore be computed in any order, on any number of workers, and still
//! produce the same particle placement.

pub mod draw;
pub mod overlay;
pub mod styles;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Palette, RenderConfig, Resolution, Rgb, VisualStyle};
use crate::timeline::{FrameSample, ResampledTimeline, FLAT_CHANNEL_VALUE};

pub use draw::{DrawList, Primitive, TextDirective};
pub use overlay::OverlayComposer;
pub use styles::StyleRenderer;

/// `beat` strictly above this turns on beat emphasis.
pub const BEAT_THRESHOLD: f32 = 0.5;
/// `amplitude` strictly above this turns on the particle overlay.
pub const PARTICLE_AMPLITUDE_THRESHOLD: f32 = 0.7;
/// Size multiplier applied to amplitude-derived geometry on a beat.
pub const BEAT_GAIN: f32 = 1.3;
pub const MAX_PARTICLES: f32 = 50.0;

/// Deterministic random stream for a single frame.
pub struct FrameRng(StdRng);

impl FrameRng {
    pub fn for_frame(base_seed: u64, frame_index: usize) -> Self {
        Self(StdRng::seed_from_u64(base_seed ^ frame_index as u64))
    }

    /// Uniform integer in `[0, upper)`; 0 when `upper` is 0.
    pub fn below(&mut self, upper: u32) -> u32 {
        if upper == 0 {
            0
        } else {
            self.0.gen_range(0..upper)
        }
    }

    /// Uniform integer in `[lo, hi]`.
    pub fn between(&mut self, lo: u32, hi: u32) -> u32 {
        self.0.gen_range(lo..=hi)
    }
}

/// Everything a style needs to lay out one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput {
    pub frame_index: usize,
    pub sample: FrameSample,
    pub resolution: Resolution,
}

impl FrameInput {
    pub fn width(&self) -> f32 {
        self.resolution.width as f32
    }

    pub fn height(&self) -> f32 {
        self.resolution.height as f32
    }

    pub fn beat_emphasis(&self) -> bool {
        self.sample.beat > BEAT_THRESHOLD
    }

    /// Multiplier for amplitude-derived sizes.
    pub fn emphasis_gain(&self) -> f32 {
        if self.beat_emphasis() {
            BEAT_GAIN
        } else {
            1.0
        }
    }

    pub fn particles_active(&self) -> bool {
        self.sample.amplitude > PARTICLE_AMPLITUDE_THRESHOLD || self.beat_emphasis()
    }

    /// `floor(amplitude * 50)`
    pub fn particle_count(&self) -> usize {
        (self.sample.amplitude * MAX_PARTICLES).floor() as usize
    }

    /// Depth of the periodic motion term, in `[0, 1]`.
    ///
    /// Zero when amplitude and centroid sit at the flat-channel value, so
    /// content with no discriminating signal renders static geometry. Beat
    /// only acts through [`FrameInput::emphasis_gain`].
    pub fn motion(&self) -> f32 {
        let s = &self.sample;
        let deviation = [s.amplitude, s.centroid]
            .iter()
            .map(|v| (v - FLAT_CHANNEL_VALUE).abs())
            .fold(0.0f32, f32::max);
        (deviation * 2.0).min(1.0)
    }

    /// Smooth periodic term in `[-1, 1]` indexed by element and frame.
    pub fn wave(&self, element: usize, elements: usize, cycles: f32) -> f32 {
        let phase = element as f32 / elements.max(1) as f32 * std::f32::consts::PI * cycles;
        (phase + self.frame_index as f32 * 0.05).sin()
    }

    /// Parity color with accent substitution on every 4th element during a beat.
    pub fn element_color(&self, element: usize, palette: &Palette) -> Rgb {
        if element % 4 == 0 && self.beat_emphasis() {
            palette.accent
        } else if element % 2 == 0 {
            palette.primary
        } else {
            palette.secondary
        }
    }
}

/// Turns `(frame index, timeline)` into a draw list for the configured style.
pub struct FrameSynthesizer {
    resolution: Resolution,
    style: VisualStyle,
    palette: Palette,
    seed: u64,
    overlay: OverlayComposer,
}

impl FrameSynthesizer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            resolution: config.resolution(),
            style: config.style(),
            palette: *config.palette(),
            seed: config.prng_seed(),
            overlay: OverlayComposer::new(config),
        }
    }

    pub fn overlay(&self) -> &OverlayComposer {
        &self.overlay
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// PRNG stream partitioned for `frame_index`.
    pub fn frame_rng(&self, frame_index: usize) -> FrameRng {
        FrameRng::for_frame(self.seed, frame_index)
    }

    /// Build the draw list for Main-phase frame `frame_index`.
    ///
    /// Never fails: feature values are clamped to `[0, 1]` on read.
    pub fn synthesize(&self, frame_index: usize, timeline: &ResampledTimeline, rng: &mut FrameRng) -> DrawList {
        let input = FrameInput {
            frame_index,
            sample: timeline.sample(frame_index),
            resolution: self.resolution,
        };

        let mut list = DrawList::new(self.palette.background);
        self.style.renderer().draw(&input, &self.palette, &mut list);
        push_particles(&input, &self.palette, rng, &mut list);
        self.overlay.main(&mut list);
        list
    }
}

/// Accent-colored dots scattered over the frame during loud or beat frames.
fn push_particles(input: &FrameInput, palette: &Palette, rng: &mut FrameRng, list: &mut DrawList) {
    if !input.particles_active() {
        return;
    }
    for _ in 0..input.particle_count() {
        let x = rng.below(input.resolution.width);
        let y = rng.below(input.resolution.height);
        let radius = rng.between(1, 3);
        list.push(Primitive::Circle {
            cx: x as f32,
            cy: y as f32,
            radius: radius as f32,
            stroke: None,
            color: palette.accent,
        });
    }
}
