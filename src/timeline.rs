//! Resampling of native-rate feature tracks onto the video frame timeline.
use crate::audio::features::AudioFeatures;
use crate::error::{RenderError, Result};

/// Value substituted for every element of a channel with no variation.
pub const FLAT_CHANNEL_VALUE: f32 = 0.5;

/// Number of video frames covering `duration_seconds` at `fps`.
pub fn total_frames(duration_seconds: f64, fps: u32) -> usize {
    (duration_seconds * fps as f64).round().max(0.0) as usize
}

/// Feature values for one video frame, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSample {
    pub amplitude: f32,
    pub beat: f32,
    pub centroid: f32,
    pub rolloff: f32,
}

impl FrameSample {
    /// Neutral sample used when a timeline has no frames at all.
    pub const NEUTRAL: FrameSample = FrameSample {
        amplitude: FLAT_CHANNEL_VALUE,
        beat: FLAT_CHANNEL_VALUE,
        centroid: FLAT_CHANNEL_VALUE,
        rolloff: FLAT_CHANNEL_VALUE,
    };

    /// Force every channel into `[0, 1]`; NaN maps to 0.
    pub fn clamped(self) -> Self {
        Self {
            amplitude: clamp_unit(self.amplitude),
            beat: clamp_unit(self.beat),
            centroid: clamp_unit(self.centroid),
            rolloff: clamp_unit(self.rolloff),
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Four normalized feature channels of equal length `total_frames`.
#[derive(Clone, Debug)]
pub struct ResampledTimeline {
    fps: u32,
    duration_seconds: f64,
    tempo_bpm: f32,
    /// Native rates (hops per second) the channels were resampled from
    amplitude_rate: f64,
    spectral_rate: f64,
    amplitude: Vec<f32>,
    beat: Vec<f32>,
    centroid: Vec<f32>,
    rolloff: Vec<f32>,
}

impl ResampledTimeline {
    /// Build a timeline from caller-supplied channels without normalizing them.
    ///
    /// Values outside `[0, 1]` are accepted here; consumers clamp on read.
    pub fn from_channels(
        fps: u32,
        amplitude: Vec<f32>,
        beat: Vec<f32>,
        centroid: Vec<f32>,
        rolloff: Vec<f32>,
    ) -> Result<Self> {
        if fps == 0 {
            return Err(RenderError::Config("fps must be positive".into()));
        }
        let n = amplitude.len();
        if beat.len() != n || centroid.len() != n || rolloff.len() != n {
            return Err(RenderError::FeatureExtraction(format!(
                "channel lengths differ: amplitude={}, beat={}, centroid={}, rolloff={}",
                n,
                beat.len(),
                centroid.len(),
                rolloff.len()
            )));
        }
        Ok(Self {
            fps,
            duration_seconds: n as f64 / fps as f64,
            tempo_bpm: 0.0,
            amplitude_rate: fps as f64,
            spectral_rate: fps as f64,
            amplitude,
            beat,
            centroid,
            rolloff,
        })
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn total_frames(&self) -> usize {
        self.amplitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitude.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn tempo_bpm(&self) -> f32 {
        self.tempo_bpm
    }

    /// Rate of the native amplitude envelope, in hops per second.
    pub fn native_amplitude_rate(&self) -> f64 {
        self.amplitude_rate
    }

    /// Rate of the native spectral tracks, in hops per second.
    pub fn native_spectral_rate(&self) -> f64 {
        self.spectral_rate
    }

    pub fn amplitude(&self) -> &[f32] {
        &self.amplitude
    }

    pub fn beat(&self) -> &[f32] {
        &self.beat
    }

    pub fn centroid(&self) -> &[f32] {
        &self.centroid
    }

    pub fn rolloff(&self) -> &[f32] {
        &self.rolloff
    }

    /// Clamped feature values at `frame_index`. Indices past the end read
    /// the last frame.
    pub fn sample(&self, frame_index: usize) -> FrameSample {
        let Some(last) = self.total_frames().checked_sub(1) else {
            return FrameSample::NEUTRAL;
        };
        let i = frame_index.min(last);
        FrameSample {
            amplitude: self.amplitude[i],
            beat: self.beat[i],
            centroid: self.centroid[i],
            rolloff: self.rolloff[i],
        }
        .clamped()
    }
}

/// Map every native feature track onto `round(duration * fps)` frames and
/// min-max normalize each channel independently.
pub fn resample(features: &AudioFeatures, fps: u32) -> Result<ResampledTimeline> {
    if fps == 0 {
        return Err(RenderError::Config("fps must be positive".into()));
    }
    let tracks = [
        ("amplitude_envelope", &features.amplitude_envelope),
        ("beat_strength", &features.beat_strength),
        ("spectral_centroid", &features.spectral_centroid),
        ("spectral_rolloff", &features.spectral_rolloff),
    ];
    for (name, track) in tracks {
        if track.is_empty() {
            return Err(RenderError::FeatureExtraction(format!("{} track is empty", name)));
        }
    }

    let n = total_frames(features.duration_seconds, fps);
    let channel = |track: &[f32]| normalize(interpolate(track, n));

    Ok(ResampledTimeline {
        fps,
        duration_seconds: features.duration_seconds,
        tempo_bpm: features.tempo_bpm,
        amplitude_rate: features.amplitude_rate(),
        spectral_rate: features.spectral_rate(),
        amplitude: channel(&features.amplitude_envelope),
        beat: channel(&features.beat_strength),
        centroid: channel(&features.spectral_centroid),
        rolloff: channel(&features.spectral_rolloff),
    })
}

/// Linear interpolation at `n` evenly spaced points from the first to the
/// last native sample.
fn interpolate(track: &[f32], n: usize) -> Vec<f32> {
    let last = track.len() - 1;
    if n == 0 {
        return Vec::new();
    }
    if last == 0 || n == 1 {
        return vec![sanitize(track[0]); n];
    }

    let step = last as f64 / (n - 1) as f64;
    (0..n)
        .map(|j| {
            let pos = j as f64 * step;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = (pos - lo as f64) as f32;
            let a = sanitize(track[lo]);
            let b = sanitize(track[hi]);
            a + (b - a) * frac
        })
        .collect()
}

fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// `(v - min) / (max - min)`, or a flat 0.5 when the channel is constant.
fn normalize(mut values: Vec<f32>) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if values.is_empty() || max == min {
        values.fill(FLAT_CHANNEL_VALUE);
        return values;
    }
    let range = max - min;
    for v in values.iter_mut() {
        *v = ((*v - min) / range).clamp(0.0, 1.0);
    }
    values
}
