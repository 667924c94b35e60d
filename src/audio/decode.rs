use anyhow::{Context, Result as AnyResult};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{RenderError, Result};

/// Decoded mono signal with its sample rate.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    /// Wrap an already mono buffer, rejecting input the analysis cannot interpret.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::from_interleaved(samples, 1, sample_rate)
    }

    /// Down-mix an interleaved buffer by averaging channels.
    pub fn from_interleaved(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(RenderError::Decode("sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(RenderError::Decode("channel layout has zero channels".into()));
        }
        if samples.is_empty() {
            return Err(RenderError::Decode("audio buffer is empty".into()));
        }
        if samples.len() % channels != 0 {
            return Err(RenderError::Decode(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(RenderError::Decode(format!("non-finite sample at offset {}", pos)));
        }

        let samples = if channels == 1 {
            samples
        } else {
            downmix(&samples, channels)
        };

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Decode an audio file into a mono signal.
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let (samples, sample_rate) =
        decode_file(path).map_err(|e| RenderError::Decode(format!("{:#}", e)))?;
    let audio = AudioData::mono(samples, sample_rate)?;

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        audio.samples.len(),
        audio.sample_rate,
        audio.duration_seconds()
    );

    Ok(audio)
}

fn decode_file(path: &Path) -> AnyResult<(Vec<f32>, u32)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        if channels == 1 {
            mono.extend_from_slice(sample_buf.samples());
        } else {
            mono.extend(downmix(sample_buf.samples(), channels));
        }
    }

    Ok((mono, sample_rate))
}
