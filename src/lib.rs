//! Audio-synchronized visualization renderer.
//!
//! Audio is analyzed into feature tracks, resampled onto the video frame
//! timeline, turned into per-frame draw lists and rasterized into RGB
//! frames that stream, in order, into a [`VideoSink`].

pub mod audio;
pub mod config;
pub mod context;
pub mod encode;
pub mod error;
pub mod render;
pub mod synth;
pub mod timeline;

pub use audio::{decode_audio, AnalysisSettings, AudioData, AudioFeatureExtractor, AudioFeatures};
pub use config::{discover_settings, find_config_file, load_config, Palette, RenderConfig, RenderSettings, Resolution, Rgb, VisualStyle};
pub use context::{CancelToken, RenderContext};
pub use encode::{FfmpegOptions, FfmpegSink, MemorySink, VideoSink};
pub use error::{RenderError, Result, SinkError};
pub use render::{Frame, Phase, RenderPipeline, RenderReport};
pub use synth::{DrawList, FrameSynthesizer, Primitive};
pub use timeline::{resample, FrameSample, ResampledTimeline};
