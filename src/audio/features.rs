/// Native-rate feature tracks extracted once per input track.
///
/// Values are raw, unnormalized magnitudes. The amplitude envelope and the
/// spectral tracks may use different hop sizes.
#[derive(Clone, Debug)]
pub struct AudioFeatures {
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub tempo_bpm: f32,
    /// Peak absolute sample per amplitude hop
    pub amplitude_envelope: Vec<f32>,
    pub amplitude_hop: usize,
    /// Onset strength (rectified spectral flux) per spectral hop
    pub beat_strength: Vec<f32>,
    /// Spectral centroid (Hz) per spectral hop
    pub spectral_centroid: Vec<f32>,
    /// Spectral rolloff frequency (Hz) per spectral hop
    pub spectral_rolloff: Vec<f32>,
    pub spectral_hop: usize,
    /// Picked onset times in seconds
    pub beat_times: Vec<f32>,
}

impl AudioFeatures {
    /// Native frame rate of the amplitude envelope, in hops per second.
    pub fn amplitude_rate(&self) -> f64 {
        self.sample_rate as f64 / self.amplitude_hop.max(1) as f64
    }

    /// Native frame rate of the spectral tracks, in hops per second.
    pub fn spectral_rate(&self) -> f64 {
        self.sample_rate as f64 / self.spectral_hop.max(1) as f64
    }
}
