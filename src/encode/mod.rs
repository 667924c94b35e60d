//! Frame sinks: where finished frames go.
pub mod ffmpeg;

pub use ffmpeg::{FfmpegOptions, FfmpegSink};

use crate::error::SinkError;
use crate::render::Frame;

/// Consumer of rendered frames.
///
/// Frames arrive in strictly increasing index order from a single thread.
/// After `finalize` or `abort` no further calls are made.
pub trait VideoSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), SinkError>;

    /// Flush and close the output.
    fn finalize(&mut self) -> Result<(), SinkError>;

    /// Tear down after a failed render. Partial output may remain.
    fn abort(&mut self) {}
}

impl<S: VideoSink + ?Sized> VideoSink for &mut S {
    fn write_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
        (**self).write_frame(frame)
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        (**self).finalize()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

/// Keeps every frame in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<Frame>,
    finalized: bool,
    aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl VideoSink for MemorySink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Rejected("sink already finalized".into()));
        }
        if let Some(last) = self.frames.last() {
            if frame.index != last.index + 1 {
                return Err(SinkError::Rejected(format!(
                    "frame {} out of order after {}",
                    frame.index, last.index
                )));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.finalized = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}
