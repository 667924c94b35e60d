use sonica_viz::{
    AudioData, CancelToken, Frame, MemorySink, RenderConfig, RenderContext, RenderError, RenderPipeline,
    RenderSettings, SinkError, VideoSink,
};

const SAMPLE_RATE: u32 = 22_050;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config(style: &str, workers: usize) -> RenderConfig {
    let mut settings = RenderSettings::default();
    settings.output.width = 64;
    settings.output.height = 36;
    settings.output.fps = 30;
    settings.output.style = style.into();
    settings.output.intro_seconds = 1.0;
    settings.output.outro_seconds = 1.0;
    settings.output.track_label = "Test Track".into();
    settings.output.prng_seed = 42;
    settings.output.workers = workers;
    settings.validate().unwrap()
}

fn flat_signal(seconds: f64) -> Vec<f32> {
    vec![0.5; (seconds * SAMPLE_RATE as f64) as usize]
}

/// Pulsing tone with a click every half second.
fn busy_signal(seconds: f64) -> Vec<f32> {
    let n = (seconds * SAMPLE_RATE as f64) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let envelope = 0.5 + 0.5 * (t * 3.0).sin();
            let click = if i % (SAMPLE_RATE as usize / 2) < 64 { 0.9 } else { 0.0 };
            envelope * (t * 440.0 * std::f32::consts::TAU).sin() * 0.6 + click
        })
        .collect()
}

/// Cancels the render once it has accepted `after` frames.
struct CancellingSink {
    inner: MemorySink,
    token: CancelToken,
    after: usize,
}

impl VideoSink for CancellingSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
        self.inner.write_frame(frame)?;
        if self.inner.len() == self.after {
            self.token.cancel();
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.inner.finalize()
    }
}

/// Fails on a given frame index.
struct FailingSink {
    inner: MemorySink,
    fail_at: usize,
}

impl VideoSink for FailingSink {
    fn write_frame(&mut self, frame: Frame) -> Result<(), SinkError> {
        if frame.index == self.fail_at {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "encoder went away",
            )));
        }
        self.inner.write_frame(frame)
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.inner.finalize()
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}

#[test]
fn flat_five_second_track_renders_210_frames() {
    init_logging();
    let pipeline = RenderPipeline::new(config("waveform", 4), RenderContext::new("flat")).unwrap();
    let mut sink = MemorySink::new();
    let report = pipeline.render(&flat_signal(5.0), SAMPLE_RATE, &mut sink).unwrap();

    assert_eq!(report.intro_frames, 30);
    assert_eq!(report.main_frames, 150);
    assert_eq!(report.outro_frames, 30);
    assert_eq!(report.total(), 210);
    assert_eq!(report.main_start(), 30);
    assert_eq!(report.outro_start(), 180);
    assert!(sink.is_finalized());

    let frames = sink.frames();
    assert_eq!(frames.len(), 210);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, i);
        assert_eq!(frame.pixels.len(), 64 * 36 * 3);
    }
    assert_eq!(frames[30].timestamp_us, 1_000_000);

    // Constant features: every Main frame draws the same bars.
    let main = &frames[30..180];
    assert!(main.iter().all(|f| f.pixels == main[0].pixels));
    assert_ne!(main[0].pixels, frames[0].pixels);
}

fn lit_pixels(frame: &Frame, background: [u8; 3]) -> usize {
    frame.pixels.chunks(3).filter(|p| *p != background).count()
}

#[test]
fn overlay_text_fades_in_and_out_with_default_font() {
    init_logging();
    let mut settings = RenderSettings::default();
    settings.output.width = 320;
    settings.output.height = 180;
    settings.output.intro_seconds = 1.0;
    settings.output.outro_seconds = 1.0;
    let config = settings.validate().unwrap();
    let background = config.palette().background.0;

    let pipeline = RenderPipeline::new(config, RenderContext::new("text")).unwrap();
    let mut sink = MemorySink::new();
    let report = pipeline.render(&flat_signal(1.0), SAMPLE_RATE, &mut sink).unwrap();
    let frames = sink.frames();
    assert_eq!(report.total(), 90);

    // Intro: alpha 0 is a bare background, then the banner grows in.
    assert_eq!(lit_pixels(&frames[0], background), 0);
    let early = lit_pixels(&frames[5], background);
    let late = lit_pixels(&frames[25], background);
    assert!(late > 0);
    assert!(late > early);

    // Main: the track label sits in the top band, above the bars.
    let top_band = &frames[45].pixels[..320 * 25 * 3];
    assert!(top_band.chunks(3).any(|p| p != background));

    // Outro: fades out to nothing on its last frame.
    assert!(lit_pixels(&frames[60], background) > 0);
    assert!(lit_pixels(&frames[60], background) > lit_pixels(&frames[85], background));
    assert_eq!(lit_pixels(&frames[89], background), 0);
}

#[test]
fn cancellation_after_fifty_main_frames() {
    init_logging();
    let token = CancelToken::new();
    let ctx = RenderContext::new("cancel").with_cancel_token(token.clone());
    let pipeline = RenderPipeline::new(config("waveform", 2), ctx).unwrap();
    let mut sink = CancellingSink {
        inner: MemorySink::new(),
        token,
        after: 80,
    };

    let err = pipeline.render(&flat_signal(5.0), SAMPLE_RATE, &mut sink).unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(err, RenderError::Cancelled { frames_emitted: 80 }));
    assert_eq!(sink.inner.len(), 80);
    assert!(sink.inner.frames().iter().all(|f| f.index < 180));
    assert!(sink.inner.is_finalized());
}

#[test]
fn worker_count_does_not_change_output() {
    init_logging();
    let samples = busy_signal(3.0);
    let render = |workers| {
        let pipeline = RenderPipeline::new(config("circular", workers), RenderContext::new("det")).unwrap();
        let mut sink = MemorySink::new();
        pipeline.render(&samples, SAMPLE_RATE, &mut sink).unwrap();
        sink.into_frames()
    };

    let serial = render(1);
    let parallel = render(4);
    assert_eq!(serial.len(), 30 + 90 + 30);
    assert_eq!(serial, parallel);
    // The busy signal animates, unlike the flat one.
    assert_ne!(serial[40].pixels, serial[100].pixels);
}

#[test]
fn sink_failure_aborts_mid_render() {
    init_logging();
    let pipeline = RenderPipeline::new(config("spectrum", 3), RenderContext::new("fail")).unwrap();
    let mut sink = FailingSink {
        inner: MemorySink::new(),
        fail_at: 45,
    };

    let err = pipeline.render(&flat_signal(2.0), SAMPLE_RATE, &mut sink).unwrap_err();

    match err {
        RenderError::Sink { index, source } => {
            assert_eq!(index, 45);
            assert!(matches!(source, SinkError::Io(_)));
        }
        other => panic!("expected sink error, got {other:?}"),
    }
    assert_eq!(sink.inner.len(), 45);
    assert!(sink.inner.is_aborted());
    assert!(!sink.inner.is_finalized());
}

#[test]
fn stereo_audio_is_downmixed_and_rendered() {
    init_logging();
    let mono = busy_signal(1.0);
    let interleaved: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
    let audio = AudioData::from_interleaved(interleaved, 2, SAMPLE_RATE).unwrap();

    let pipeline = RenderPipeline::new(config("waveform", 0), RenderContext::new("stereo")).unwrap();
    let mut sink = MemorySink::new();
    let report = pipeline.render_audio(&audio, &mut sink).unwrap();
    assert_eq!(report.main_frames, 30);
    assert_eq!(sink.len(), 90);
}

#[test]
fn degenerate_audio_fails_before_any_frame() {
    init_logging();
    let pipeline = RenderPipeline::new(config("waveform", 1), RenderContext::new("bad")).unwrap();
    let mut sink = MemorySink::new();
    let err = pipeline.render(&[], SAMPLE_RATE, &mut sink).unwrap_err();
    assert!(matches!(err, RenderError::Decode(_)));
    assert!(sink.is_empty());
}
