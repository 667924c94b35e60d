//! Per-render context: log label, cancellation and progress.
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag. Cloning yields a handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// State tied to exactly one render invocation.
///
/// Every component logs through the context so that concurrent renders can
/// be told apart in a shared log stream.
pub struct RenderContext {
    label: String,
    cancel: CancelToken,
    progress: ProgressBar,
}

impl RenderContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cancel: CancelToken::new(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Draw a progress bar on stderr while frames are emitted.
    pub fn with_progress_bar(mut self) -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        self.progress = pb;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn info(&self, msg: impl std::fmt::Display) {
        log::info!("[{}] {}", self.label, msg);
    }

    pub fn debug(&self, msg: impl std::fmt::Display) {
        log::debug!("[{}] {}", self.label, msg);
    }

    pub fn warn(&self, msg: impl std::fmt::Display) {
        log::warn!("[{}] {}", self.label, msg);
    }

    pub(crate) fn start_progress(&self, total: usize) {
        self.progress.set_length(total as u64);
        self.progress.set_position(0);
    }

    pub(crate) fn advance_progress(&self) {
        self.progress.inc(1);
    }

    pub(crate) fn finish_progress(&self, msg: &'static str) {
        self.progress.finish_with_message(msg);
    }

    pub(crate) fn abandon_progress(&self) {
        self.progress.abandon();
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new("render")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let ctx = RenderContext::new("test").with_cancel_token(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
