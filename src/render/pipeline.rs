//! Three-phase render driver: Intro, Main, Outro.
//!
//! Frames of a phase are computed on a rayon pool one window at a time,
//! sent to the calling thread over a bounded channel, and released to the
//! sink strictly in index order through a [`ReorderBuffer`]. The calling
//! thread is the only writer the sink ever sees.

use crossbeam_channel::{bounded, Receiver};
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::frame::{Frame, FrameRasterizer};
use super::reorder::ReorderBuffer;
use crate::audio::{AudioData, AudioFeatureExtractor};
use crate::config::RenderConfig;
use crate::context::RenderContext;
use crate::encode::VideoSink;
use crate::error::{RenderError, Result};
use crate::synth::{DrawList, FrameSynthesizer};
use crate::timeline::{self, ResampledTimeline};

/// Frames in flight per worker thread.
const FRAMES_PER_WORKER: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Intro,
    Main,
    Outro,
    Done,
}

impl Phase {
    /// Successor state; `Done` is terminal.
    pub fn next(self) -> Phase {
        match self {
            Phase::Intro => Phase::Main,
            Phase::Main => Phase::Outro,
            Phase::Outro | Phase::Done => Phase::Done,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Intro => "intro",
            Phase::Main => "main",
            Phase::Outro => "outro",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Frame counts of a completed render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub intro_frames: usize,
    pub main_frames: usize,
    pub outro_frames: usize,
}

impl RenderReport {
    pub fn total(&self) -> usize {
        self.intro_frames + self.main_frames + self.outro_frames
    }

    /// Global index of the first Main frame.
    pub fn main_start(&self) -> usize {
        self.intro_frames
    }

    /// Global index of the first Outro frame.
    pub fn outro_start(&self) -> usize {
        self.intro_frames + self.main_frames
    }
}

/// One-shot renderer. Every `render*` method consumes the pipeline.
pub struct RenderPipeline {
    config: RenderConfig,
    ctx: RenderContext,
    synth: FrameSynthesizer,
    raster: FrameRasterizer,
    pool: rayon::ThreadPool,
}

impl RenderPipeline {
    pub fn new(config: RenderConfig, ctx: RenderContext) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers())
            .thread_name(|i| format!("sonica-frame-{}", i))
            .build()
            .map_err(|e| RenderError::WorkerPool(e.to_string()))?;
        let synth = FrameSynthesizer::new(&config);
        let raster = FrameRasterizer::new(config.resolution(), config.fps(), config.font(), &ctx)?;

        ctx.debug(format!(
            "pipeline ready: {} @ {}fps, style={}, palette={}, workers={}",
            config.resolution(),
            config.fps(),
            config.style(),
            config.palette_name(),
            pool.current_num_threads()
        ));

        Ok(Self {
            config,
            ctx,
            synth,
            raster,
            pool,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Decode-free entry point: analyze `audio`, then render it.
    pub fn render_audio<S>(self, audio: &AudioData, sink: &mut S) -> Result<RenderReport>
    where
        S: VideoSink + ?Sized,
    {
        self.render(&audio.samples, audio.sample_rate, sink)
    }

    /// Analyze mono `samples`, resample onto the frame timeline and render.
    ///
    /// Analysis runs before the first frame, so extraction errors leave the
    /// sink untouched.
    pub fn render<S>(self, samples: &[f32], sample_rate: u32, sink: &mut S) -> Result<RenderReport>
    where
        S: VideoSink + ?Sized,
    {
        self.ctx.info(format!(
            "analyzing {} samples at {} Hz",
            samples.len(),
            sample_rate
        ));
        let extractor = AudioFeatureExtractor::new(self.config.analysis().clone())?;
        let features = extractor.extract(samples, sample_rate, &self.ctx)?;
        let timeline = timeline::resample(&features, self.config.fps())?;
        self.ctx.info(format!(
            "{:.2}s of audio, tempo {:.1} BPM, {} main frames resampled from {:.1}/{:.1} Hz amplitude/spectral tracks",
            timeline.duration_seconds(),
            timeline.tempo_bpm(),
            timeline.total_frames(),
            timeline.native_amplitude_rate(),
            timeline.native_spectral_rate()
        ));
        self.render_timeline(&timeline, sink)
    }

    /// Render a prepared timeline through all three phases.
    pub fn render_timeline<S>(self, timeline: &ResampledTimeline, sink: &mut S) -> Result<RenderReport>
    where
        S: VideoSink + ?Sized,
    {
        if timeline.fps() != self.config.fps() {
            return Err(RenderError::Config(format!(
                "timeline sampled at {}fps but render configured for {}fps",
                timeline.fps(),
                self.config.fps()
            )));
        }

        let report = RenderReport {
            intro_frames: self.config.intro_frames(),
            main_frames: timeline.total_frames(),
            outro_frames: self.config.outro_frames(),
        };
        self.ctx.info(format!(
            "rendering {} frames ({} intro, {} main, {} outro)",
            report.total(),
            report.intro_frames,
            report.main_frames,
            report.outro_frames
        ));
        self.ctx.start_progress(report.total());

        let mut emitter = Emitter {
            sink: &mut *sink,
            ctx: &self.ctx,
            pool: &self.pool,
            raster: &self.raster,
            window: self.pool.current_num_threads().max(1) * FRAMES_PER_WORKER,
            phase: Phase::Intro,
            emitted: 0,
        };
        let outcome = run_phases(&mut emitter, &self.synth, timeline, report);
        let emitted = emitter.emitted;

        match outcome {
            Ok(()) => {
                sink.finalize().map_err(|source| {
                    self.ctx.abandon_progress();
                    RenderError::Sink {
                        index: emitted,
                        source,
                    }
                })?;
                self.ctx.finish_progress("render complete");
                self.ctx.info(format!("render complete: {} frames", emitted));
                Ok(report)
            }
            Err(RenderError::Cancelled { .. }) => {
                self.ctx.abandon_progress();
                if let Err(e) = sink.finalize() {
                    self.ctx.warn(format!("finalize after cancellation failed: {}", e));
                }
                self.ctx.warn(format!("render cancelled after {} frames", emitted));
                Err(RenderError::Cancelled {
                    frames_emitted: emitted,
                })
            }
            Err(e) => {
                self.ctx.abandon_progress();
                sink.abort();
                self.ctx.warn(format!("render failed after {} frames: {}", emitted, e));
                Err(e)
            }
        }
    }
}

fn run_phases<S>(
    emitter: &mut Emitter<'_, S>,
    synth: &FrameSynthesizer,
    timeline: &ResampledTimeline,
    report: RenderReport,
) -> Result<()>
where
    S: VideoSink + ?Sized,
{
    let overlay = synth.overlay();

    let intro = report.intro_frames;
    emitter.emit_phase(intro, |i| overlay.intro(i as f32 / intro as f32))?;
    emitter.advance();

    emitter.emit_phase(report.main_frames, |i| {
        synth.synthesize(i, timeline, &mut synth.frame_rng(i))
    })?;
    emitter.advance();

    let outro = report.outro_frames;
    emitter.emit_phase(outro, |i| overlay.outro(1.0 - i as f32 / outro as f32))?;
    emitter.advance();

    debug_assert_eq!(emitter.phase, Phase::Done);
    Ok(())
}

/// Single-writer side of the pipeline.
struct Emitter<'a, S: ?Sized> {
    sink: &'a mut S,
    ctx: &'a RenderContext,
    pool: &'a rayon::ThreadPool,
    raster: &'a FrameRasterizer,
    window: usize,
    phase: Phase,
    /// Frames accepted by the sink; also the next global frame index
    emitted: usize,
}

impl<S: VideoSink + ?Sized> Emitter<'_, S> {
    fn advance(&mut self) {
        let next = self.phase.next();
        self.ctx.debug(format!("{} -> {} at frame {}", self.phase, next, self.emitted));
        self.phase = next;
    }

    /// Compute `count` frames with `build(local_index)` and write them in order.
    fn emit_phase<F>(&mut self, count: usize, build: F) -> Result<()>
    where
        F: Fn(usize) -> DrawList + Sync,
    {
        if count == 0 {
            return Ok(());
        }
        let base = self.emitted;
        let window = self.window;
        let pool = self.pool;
        let raster = self.raster;
        let stop = AtomicBool::new(false);
        let (tx, rx) = bounded::<Frame>(window);

        std::thread::scope(|scope| {
            let stop = &stop;
            let build = &build;
            scope.spawn(move || {
                let mut start = 0;
                while start < count && !stop.load(Ordering::Relaxed) {
                    let end = (start + window).min(count);
                    pool.install(|| {
                        (start..end).into_par_iter().for_each_with(tx.clone(), |tx, i| {
                            if stop.load(Ordering::Relaxed) {
                                return;
                            }
                            let frame = raster.rasterize(base + i, &build(i));
                            if tx.send(frame).is_err() {
                                stop.store(true, Ordering::Relaxed);
                            }
                        });
                    });
                    start = end;
                }
            });

            let result = self.drain(&rx, base, count);
            stop.store(true, Ordering::Relaxed);
            drop(rx);
            result
        })
    }

    fn drain(&mut self, rx: &Receiver<Frame>, base: usize, count: usize) -> Result<()> {
        let mut reorder = ReorderBuffer::new(base);
        let end = base + count;
        while reorder.next_index() < end {
            if self.ctx.is_cancelled() {
                return Err(RenderError::Cancelled {
                    frames_emitted: self.emitted,
                });
            }
            match reorder.pop_ready() {
                Some((_, frame)) => self.write(frame)?,
                None => match rx.recv() {
                    Ok(frame) => reorder.insert(frame.index, frame),
                    Err(_) => {
                        return Err(RenderError::WorkerPool(format!(
                            "frame workers stopped before frame {}",
                            reorder.next_index()
                        )))
                    }
                },
            }
        }
        Ok(())
    }

    fn write(&mut self, frame: Frame) -> Result<()> {
        let index = frame.index;
        debug_assert_eq!(index, self.emitted);
        self.sink
            .write_frame(frame)
            .map_err(|source| RenderError::Sink { index, source })?;
        self.emitted += 1;
        self.ctx.advance_progress();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderSettings;
    use crate::encode::MemorySink;

    fn config(intro: f64, outro: f64, workers: usize) -> RenderConfig {
        let mut settings = RenderSettings::default();
        settings.output.width = 48;
        settings.output.height = 27;
        settings.output.fps = 10;
        settings.output.intro_seconds = intro;
        settings.output.outro_seconds = outro;
        settings.output.workers = workers;
        settings.validate().unwrap()
    }

    fn ramp(frames: usize) -> ResampledTimeline {
        let ramp: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        ResampledTimeline::from_channels(10, ramp.clone(), ramp.clone(), ramp.clone(), ramp).unwrap()
    }

    #[test]
    fn phases_advance_in_order() {
        assert_eq!(Phase::Intro.next(), Phase::Main);
        assert_eq!(Phase::Main.next(), Phase::Outro);
        assert_eq!(Phase::Outro.next(), Phase::Done);
        assert_eq!(Phase::Done.next(), Phase::Done);
    }

    #[test]
    fn emits_every_index_once_in_order() {
        let pipeline = RenderPipeline::new(config(0.5, 0.3, 3), RenderContext::new("order")).unwrap();
        let mut sink = MemorySink::new();
        let report = pipeline.render_timeline(&ramp(25), &mut sink).unwrap();
        assert_eq!(report, RenderReport { intro_frames: 5, main_frames: 25, outro_frames: 3 });
        let indices: Vec<usize> = sink.frames().iter().map(|f| f.index).collect();
        assert_eq!(indices, (0..33).collect::<Vec<_>>());
        assert!(sink.is_finalized());
    }

    #[test]
    fn empty_intro_and_outro_are_skipped() {
        let pipeline = RenderPipeline::new(config(0.0, 0.0, 1), RenderContext::new("bare")).unwrap();
        let mut sink = MemorySink::new();
        let report = pipeline.render_timeline(&ramp(4), &mut sink).unwrap();
        assert_eq!(report.total(), 4);
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn fps_mismatch_is_rejected_before_any_frame() {
        let pipeline = RenderPipeline::new(config(1.0, 1.0, 1), RenderContext::new("fps")).unwrap();
        let timeline = ResampledTimeline::from_channels(24, vec![0.5], vec![0.5], vec![0.5], vec![0.5]).unwrap();
        let mut sink = MemorySink::new();
        let err = pipeline.render_timeline(&timeline, &mut sink).unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn too_short_audio_fails_before_intro() {
        let pipeline = RenderPipeline::new(config(1.0, 1.0, 1), RenderContext::new("short")).unwrap();
        let mut sink = MemorySink::new();
        let err = pipeline.render(&[0.1; 16], 22_050, &mut sink).unwrap_err();
        assert!(matches!(err, RenderError::FeatureExtraction(_)));
        assert!(sink.is_empty());
        assert!(!sink.is_finalized());
    }
}
