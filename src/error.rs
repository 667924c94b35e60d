//! Error taxonomy for the renderer.
use thiserror::Error;

/// Errors raised while turning audio into visualization frames.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Audio input is unreadable or malformed
    #[error("decode error: {0}")]
    Decode(String),

    /// Signal too short or degenerate for the analysis window
    #[error("feature extraction error: {0}")]
    FeatureExtraction(String),

    /// Render configuration rejected at construction
    #[error("config error: {0}")]
    Config(String),

    /// The video sink failed to accept a frame
    #[error("sink error at frame {index}: {source}")]
    Sink {
        index: usize,
        #[source]
        source: SinkError,
    },

    /// Cooperative cancellation observed between frames
    #[error("render cancelled after {frames_emitted} frames")]
    Cancelled { frames_emitted: usize },

    /// Worker pool could not be created
    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl RenderError {
    /// Cancellation is a distinct outcome, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled { .. })
    }
}

/// Errors reported by a [`crate::encode::VideoSink`].
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame rejected: {0}")]
    Rejected(String),

    #[error("encoder failed: {0}")]
    Encoder(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
