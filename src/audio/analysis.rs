use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;
use std::sync::Arc;

use super::decode::AudioData;
use super::features::AudioFeatures;
use crate::context::RenderContext;
use crate::error::{RenderError, Result};

const DEFAULT_TEMPO_BPM: f32 = 120.0;

/// Analysis window parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisSettings {
    /// STFT window length in samples (power of two)
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Hop between STFT windows
    #[serde(default = "default_spectral_hop")]
    pub spectral_hop: usize,
    /// Hop for the peak amplitude envelope; also the minimum analyzable length
    #[serde(default = "default_amplitude_hop")]
    pub amplitude_hop: usize,
    /// Fraction of spectral energy below the rolloff frequency
    #[serde(default = "default_rolloff_percent")]
    pub rolloff_percent: f32,
    /// Multiplier on the local mean flux for onset peak picking
    #[serde(default = "default_onset_threshold")]
    pub onset_threshold: f32,
    /// Minimum spacing between picked beats, in seconds
    #[serde(default = "default_min_beat_gap")]
    pub min_beat_gap: f32,
}

fn default_fft_size() -> usize { 2048 }
fn default_spectral_hop() -> usize { 1024 }
fn default_amplitude_hop() -> usize { 512 }
fn default_rolloff_percent() -> f32 { 0.85 }
fn default_onset_threshold() -> f32 { 1.5 }
fn default_min_beat_gap() -> f32 { 0.1 }

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            spectral_hop: default_spectral_hop(),
            amplitude_hop: default_amplitude_hop(),
            rolloff_percent: default_rolloff_percent(),
            onset_threshold: default_onset_threshold(),
            min_beat_gap: default_min_beat_gap(),
        }
    }
}

impl AnalysisSettings {
    pub(crate) fn check(&self) -> Result<()> {
        if self.fft_size < 64 || !self.fft_size.is_power_of_two() {
            return Err(RenderError::Config(format!(
                "fft_size must be a power of two >= 64, got {}",
                self.fft_size
            )));
        }
        if self.spectral_hop == 0 || self.spectral_hop > self.fft_size {
            return Err(RenderError::Config(format!(
                "spectral_hop must be in 1..={}, got {}",
                self.fft_size, self.spectral_hop
            )));
        }
        if self.amplitude_hop == 0 {
            return Err(RenderError::Config("amplitude_hop must be positive".into()));
        }
        if !(self.rolloff_percent > 0.0 && self.rolloff_percent <= 1.0) {
            return Err(RenderError::Config(format!(
                "rolloff_percent must be in (0, 1], got {}",
                self.rolloff_percent
            )));
        }
        if !(self.onset_threshold.is_finite() && self.onset_threshold >= 0.0) {
            return Err(RenderError::Config("onset_threshold must be non-negative".into()));
        }
        if !(self.min_beat_gap.is_finite() && self.min_beat_gap >= 0.0) {
            return Err(RenderError::Config("min_beat_gap must be non-negative".into()));
        }
        Ok(())
    }
}

/// Per-window spectral measurements.
struct SpectralFrame {
    magnitudes: Vec<f32>,
    centroid: f32,
    rolloff: f32,
}

/// Produces native-rate feature tracks from a mono signal.
pub struct AudioFeatureExtractor {
    settings: AnalysisSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl AudioFeatureExtractor {
    pub fn new(settings: AnalysisSettings) -> Result<Self> {
        settings.check()?;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(settings.fft_size);
        let window = hann_window(settings.fft_size);
        Ok(Self {
            settings,
            fft,
            window,
        })
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn extract_audio(&self, audio: &AudioData, ctx: &RenderContext) -> Result<AudioFeatures> {
        self.extract(&audio.samples, audio.sample_rate, ctx)
    }

    /// Analyze a mono signal.
    ///
    /// Fails with `Decode` for input that cannot be interpreted and with
    /// `FeatureExtraction` when the signal is shorter than one amplitude hop.
    /// Quiet or silent content succeeds with flat tracks.
    pub fn extract(&self, samples: &[f32], sample_rate: u32, ctx: &RenderContext) -> Result<AudioFeatures> {
        if sample_rate == 0 {
            return Err(RenderError::Decode("sample rate must be positive".into()));
        }
        if samples.is_empty() {
            return Err(RenderError::Decode("audio buffer is empty".into()));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(RenderError::Decode("audio buffer contains non-finite samples".into()));
        }
        if samples.len() < self.settings.amplitude_hop {
            return Err(RenderError::FeatureExtraction(format!(
                "signal of {} samples is shorter than one {}-sample hop",
                samples.len(),
                self.settings.amplitude_hop
            )));
        }

        let duration_seconds = samples.len() as f64 / sample_rate as f64;
        ctx.info(format!(
            "Extracting features: {} samples, {}Hz, {:.2}s",
            samples.len(),
            sample_rate,
            duration_seconds
        ));

        let amplitude_envelope = amplitude_envelope(samples, self.settings.amplitude_hop);

        let spectral = self.spectral_frames(samples, sample_rate);
        let beat_strength = onset_strength(&spectral);
        let spectral_centroid: Vec<f32> = spectral.iter().map(|f| f.centroid).collect();
        let spectral_rolloff: Vec<f32> = spectral.iter().map(|f| f.rolloff).collect();

        let hop_seconds = self.settings.spectral_hop as f32 / sample_rate as f32;
        let beat_times = pick_beats(
            &beat_strength,
            hop_seconds,
            self.settings.onset_threshold,
            self.settings.min_beat_gap,
        );
        let tempo_bpm = estimate_tempo(&beat_times);

        ctx.debug(format!(
            "Feature tracks: amplitude={} hops, spectral={} hops, beats={}, tempo={:.1} BPM",
            amplitude_envelope.len(),
            spectral.len(),
            beat_times.len(),
            tempo_bpm
        ));

        Ok(AudioFeatures {
            sample_rate,
            duration_seconds,
            tempo_bpm,
            amplitude_envelope,
            amplitude_hop: self.settings.amplitude_hop,
            beat_strength,
            spectral_centroid,
            spectral_rolloff,
            spectral_hop: self.settings.spectral_hop,
            beat_times,
        })
    }

    /// Short-time spectra over complete windows. A signal shorter than one
    /// window is analyzed as a single zero-padded window.
    fn spectral_frames(&self, samples: &[f32], sample_rate: u32) -> Vec<SpectralFrame> {
        let fft_size = self.settings.fft_size;
        let hop = self.settings.spectral_hop;
        let starts: Vec<usize> = if samples.len() >= fft_size {
            (0..=samples.len() - fft_size).step_by(hop).collect()
        } else {
            vec![0]
        };

        let bin_hz = sample_rate as f32 / fft_size as f32;
        let rolloff_percent = self.settings.rolloff_percent;

        starts
            .into_par_iter()
            .map(|start| {
                let end = (start + fft_size).min(samples.len());
                let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_size];
                for (i, &s) in samples[start..end].iter().enumerate() {
                    buffer[i] = Complex::new(s * self.window[i], 0.0);
                }
                self.fft.process(&mut buffer);

                let magnitudes: Vec<f32> = buffer[..fft_size / 2 + 1].iter().map(|c| c.norm()).collect();
                let centroid = spectral_centroid(&magnitudes, bin_hz);
                let rolloff = spectral_rolloff(&magnitudes, bin_hz, rolloff_percent);

                SpectralFrame {
                    magnitudes,
                    centroid,
                    rolloff,
                }
            })
            .collect()
    }
}

/// Peak absolute sample of each hop; the last hop may be partial.
fn amplitude_envelope(samples: &[f32], hop: usize) -> Vec<f32> {
    samples
        .chunks(hop)
        .map(|chunk| chunk.iter().map(|s| s.abs()).fold(0.0f32, f32::max))
        .collect()
}

fn spectral_centroid(magnitudes: &[f32], bin_hz: f32) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 1e-10 {
        return 0.0;
    }
    magnitudes
        .iter()
        .enumerate()
        .map(|(i, &mag)| i as f32 * bin_hz * mag)
        .sum::<f32>()
        / total
}

fn spectral_rolloff(magnitudes: &[f32], bin_hz: f32, percent: f32) -> f32 {
    let total: f32 = magnitudes.iter().sum();
    if total <= 1e-10 {
        return 0.0;
    }
    let target = total * percent;
    let mut cumulative = 0.0f32;
    for (i, &mag) in magnitudes.iter().enumerate() {
        cumulative += mag;
        if cumulative >= target {
            return i as f32 * bin_hz;
        }
    }
    (magnitudes.len() - 1) as f32 * bin_hz
}

/// Half-wave rectified spectral flux. The first window has no predecessor
/// and scores zero.
fn onset_strength(frames: &[SpectralFrame]) -> Vec<f32> {
    let mut strength = Vec::with_capacity(frames.len());
    strength.push(0.0);
    for pair in frames.windows(2) {
        let flux: f32 = pair[1]
            .magnitudes
            .iter()
            .zip(pair[0].magnitudes.iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        strength.push(flux);
    }
    strength.truncate(frames.len());
    strength
}

/// Adaptive-threshold peak picking over the onset curve.
fn pick_beats(strength: &[f32], hop_seconds: f32, threshold_factor: f32, min_gap: f32) -> Vec<f32> {
    let window = 20;
    let mut beat_times: Vec<f32> = Vec::new();

    for i in 0..strength.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(strength.len());
        let local_mean = strength[start..end].iter().sum::<f32>() / (end - start) as f32;
        let threshold = local_mean * threshold_factor + 0.01;

        if strength[i] <= threshold {
            continue;
        }

        let is_peak = (i == 0 || strength[i] >= strength[i - 1])
            && (i == strength.len() - 1 || strength[i] >= strength[i + 1]);
        let time = i as f32 * hop_seconds;
        let far_enough = beat_times.last().map_or(true, |&last| time - last > min_gap);

        if is_peak && far_enough {
            beat_times.push(time);
        }
    }

    beat_times
}

/// Median inter-beat interval within 60-200 BPM, or 120 BPM when there is
/// not enough rhythm to measure.
fn estimate_tempo(beat_times: &[f32]) -> f32 {
    if beat_times.len() < 2 {
        return DEFAULT_TEMPO_BPM;
    }

    let mut reasonable: Vec<f32> = beat_times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if reasonable.is_empty() {
        return DEFAULT_TEMPO_BPM;
    }

    reasonable.sort_by(|a, b| a.total_cmp(b));
    60.0 / reasonable[reasonable.len() / 2]
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> AudioFeatureExtractor {
        AudioFeatureExtractor::new(AnalysisSettings::default()).unwrap()
    }

    fn click_track(sample_rate: u32, seconds: f32, bpm: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        let period = (60.0 / bpm * sample_rate as f32) as usize;
        (0..len)
            .map(|i| {
                let phase = i % period;
                if phase < 400 {
                    let decay = 1.0 - phase as f32 / 400.0;
                    decay * (i as f32 * 0.9).sin()
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn envelope_takes_peak_per_hop() {
        let samples = [0.1, -0.8, 0.3, 0.2, -0.1, 0.05];
        assert_eq!(amplitude_envelope(&samples, 4), vec![0.8, 0.1]);
    }

    #[test]
    fn shorter_than_one_hop_fails() {
        let ctx = RenderContext::default();
        let err = extractor().extract(&vec![0.1; 100], 22050, &ctx).unwrap_err();
        assert!(matches!(err, RenderError::FeatureExtraction(_)));
    }

    #[test]
    fn empty_or_bad_rate_is_decode_error() {
        let ctx = RenderContext::default();
        assert!(matches!(
            extractor().extract(&[], 22050, &ctx),
            Err(RenderError::Decode(_))
        ));
        assert!(matches!(
            extractor().extract(&vec![0.0; 4096], 0, &ctx),
            Err(RenderError::Decode(_))
        ));
    }

    #[test]
    fn silence_succeeds_with_flat_tracks() {
        let ctx = RenderContext::default();
        let features = extractor().extract(&vec![0.0; 22050], 22050, &ctx).unwrap();
        assert!(!features.amplitude_envelope.is_empty());
        assert!(features.amplitude_envelope.iter().all(|&v| v == 0.0));
        assert!(features.beat_strength.iter().all(|&v| v == 0.0));
        assert!(features.beat_times.is_empty());
        assert_eq!(features.tempo_bpm, DEFAULT_TEMPO_BPM);
    }

    #[test]
    fn short_signal_gets_one_spectral_window() {
        let ctx = RenderContext::default();
        let features = extractor().extract(&vec![0.25; 600], 22050, &ctx).unwrap();
        assert_eq!(features.amplitude_envelope.len(), 2);
        assert_eq!(features.spectral_centroid.len(), 1);
        assert_eq!(features.beat_strength, vec![0.0]);
    }

    #[test]
    fn tracks_use_their_own_hops() {
        let ctx = RenderContext::default();
        let features = extractor().extract(&vec![0.5; 22050], 22050, &ctx).unwrap();
        assert_eq!(features.amplitude_envelope.len(), (22050 + 511) / 512);
        assert_eq!(features.spectral_centroid.len(), (22050 - 2048) / 1024 + 1);
        assert_eq!(features.spectral_rolloff.len(), features.spectral_centroid.len());
        assert_eq!(features.beat_strength.len(), features.spectral_centroid.len());
        assert!((features.duration_seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn centroid_tracks_tone_frequency() {
        let sr = 22050;
        let tone = |hz: f32| -> Vec<f32> {
            (0..sr)
                .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / sr as f32).sin())
                .collect()
        };
        let ctx = RenderContext::default();
        let low = extractor().extract(&tone(220.0), sr, &ctx).unwrap();
        let high = extractor().extract(&tone(4400.0), sr, &ctx).unwrap();
        let mean = |v: &[f32]| v.iter().sum::<f32>() / v.len() as f32;
        assert!(mean(&high.spectral_centroid) > mean(&low.spectral_centroid) * 5.0);
        assert!(mean(&high.spectral_rolloff) > mean(&low.spectral_rolloff));
    }

    #[test]
    fn click_track_tempo_is_detected() {
        let sr = 22050;
        let ctx = RenderContext::default();
        let features = extractor().extract(&click_track(sr, 8.0, 120.0), sr, &ctx).unwrap();
        assert!(features.beat_times.len() >= 8);
        assert!(
            (100.0..=140.0).contains(&features.tempo_bpm),
            "tempo {}",
            features.tempo_bpm
        );
    }

    #[test]
    fn tempo_defaults_without_rhythm() {
        assert_eq!(estimate_tempo(&[]), DEFAULT_TEMPO_BPM);
        assert_eq!(estimate_tempo(&[0.0, 5.0]), DEFAULT_TEMPO_BPM);
        assert!((estimate_tempo(&[0.0, 0.5, 1.0, 1.5]) - 120.0).abs() < 1e-3);
    }
}
