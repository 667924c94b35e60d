use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::audio::analysis::AnalysisSettings;
use crate::encode::ffmpeg::FfmpegOptions;
use crate::error::{RenderError, Result};
use crate::render::text::TextOverlay;

const MAX_DIMENSION: u32 = 8192;
const MAX_FPS: u32 = 240;

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb([r, g, b])
    }
}

/// Named set of colors used by every visual element of a render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct Palette {
    pub background: Rgb,
    pub primary: Rgb,
    pub secondary: Rgb,
    pub accent: Rgb,
    pub text: Rgb,
}

impl Palette {
    pub const HIGH_CONTRAST: Palette = Palette {
        background: Rgb::new(0, 0, 0),
        primary: Rgb::new(255, 0, 0),
        secondary: Rgb::new(0, 0, 255),
        accent: Rgb::new(255, 255, 0),
        text: Rgb::new(255, 255, 255),
    };

    pub const MONOCHROME: Palette = Palette {
        background: Rgb::new(0, 0, 0),
        primary: Rgb::new(255, 255, 255),
        secondary: Rgb::new(200, 200, 200),
        accent: Rgb::new(150, 150, 150),
        text: Rgb::new(255, 255, 255),
    };

    pub const ARTIST_THEMED: Palette = Palette {
        background: Rgb::new(20, 20, 20),
        primary: Rgb::new(212, 175, 55),
        secondary: Rgb::new(128, 0, 128),
        accent: Rgb::new(255, 255, 255),
        text: Rgb::new(212, 175, 55),
    };

    /// Look up one of the built-in palettes.
    pub fn builtin(name: &str) -> Option<Palette> {
        match name {
            "high_contrast" => Some(Self::HIGH_CONTRAST),
            "monochrome" => Some(Self::MONOCHROME),
            "artist_themed" => Some(Self::ARTIST_THEMED),
            _ => None,
        }
    }
}

/// Visualization geometry family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VisualStyle {
    #[default]
    Waveform,
    Circular,
    Spectrum,
}

impl FromStr for VisualStyle {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "waveform" => Ok(VisualStyle::Waveform),
            "circular" => Ok(VisualStyle::Circular),
            "spectrum" => Ok(VisualStyle::Spectrum),
            other => Err(RenderError::Config(format!("unknown visual style '{}'", other))),
        }
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisualStyle::Waveform => "waveform",
            VisualStyle::Circular => "circular",
            VisualStyle::Spectrum => "spectrum",
        };
        f.write_str(name)
    }
}

/// Output frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse a named preset such as `1080p` or `4k`.
    pub fn preset(name: &str) -> Option<Resolution> {
        match name.to_ascii_lowercase().as_str() {
            "480p" => Some(Resolution::new(854, 480)),
            "720p" => Some(Resolution::new(1280, 720)),
            "1080p" => Some(Resolution::new(1920, 1080)),
            "1440p" => Some(Resolution::new(2560, 1440)),
            "4k" | "2160p" => Some(Resolution::new(3840, 2160)),
            _ => None,
        }
    }

    pub fn shorter_side(&self) -> u32 {
        self.width.min(self.height)
    }

    /// Byte length of one RGB frame at this resolution.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Raw, file-loadable settings. Call [`RenderSettings::validate`] to obtain a
/// [`RenderConfig`].
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub overlay: OverlayText,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub palettes: HashMap<String, Palette>,
    #[serde(default)]
    pub encoder: FfmpegOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    /// Named preset; overrides `width`/`height` when set
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_color_scheme")]
    pub color_scheme: String,
    #[serde(default = "default_intro_seconds")]
    pub intro_seconds: f64,
    #[serde(default = "default_outro_seconds")]
    pub outro_seconds: f64,
    #[serde(default = "default_track_label")]
    pub track_label: String,
    #[serde(default)]
    pub prng_seed: u64,
    /// Worker threads for frame synthesis; 0 picks the rayon default
    #[serde(default)]
    pub workers: usize,
    /// Overlay font file; the bundled font is used when unset
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

/// Fixed strings shown by the intro, main and outro overlays.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverlayText {
    #[serde(default = "default_intro_banner")]
    pub intro_banner: String,
    #[serde(default = "default_intro_tagline")]
    pub intro_tagline: String,
    #[serde(default = "default_watermark")]
    pub watermark: String,
    #[serde(default = "default_outro_banner")]
    pub outro_banner: String,
    #[serde(default = "default_outro_tagline")]
    pub outro_tagline: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            resolution: None,
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            style: default_style(),
            color_scheme: default_color_scheme(),
            intro_seconds: default_intro_seconds(),
            outro_seconds: default_outro_seconds(),
            track_label: default_track_label(),
            prng_seed: 0,
            workers: 0,
            font_path: None,
        }
    }
}

impl Default for OverlayText {
    fn default() -> Self {
        Self {
            intro_banner: default_intro_banner(),
            intro_tagline: default_intro_tagline(),
            watermark: default_watermark(),
            outro_banner: default_outro_banner(),
            outro_tagline: default_outro_tagline(),
        }
    }
}

fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fps() -> u32 { 30 }
fn default_style() -> String { "waveform".into() }
fn default_color_scheme() -> String { "high_contrast".into() }
fn default_intro_seconds() -> f64 { 5.0 }
fn default_outro_seconds() -> f64 { 10.0 }
fn default_track_label() -> String { "Untitled".into() }
fn default_intro_banner() -> String { "NOW PLAYING".into() }
fn default_intro_tagline() -> String { "FULL TRACK".into() }
fn default_watermark() -> String { "VISUALIZED".into() }
fn default_outro_banner() -> String { "Thanks for listening".into() }
fn default_outro_tagline() -> String { "More tracks coming soon...".into() }

/// Font file bytes, kept alive for the duration of a render.
#[derive(Clone)]
pub struct FontSource {
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontSource")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Validated render configuration. Read-only for the duration of a render.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    resolution: Resolution,
    fps: u32,
    style: VisualStyle,
    palette_name: String,
    palette: Palette,
    intro_seconds: f64,
    outro_seconds: f64,
    track_label: String,
    prng_seed: u64,
    workers: usize,
    font: Option<FontSource>,
    overlay: OverlayText,
    analysis: AnalysisSettings,
    encoder: FfmpegOptions,
}

impl RenderSettings {
    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RenderError::Config(e.to_string()))
    }

    /// Check every field and resolve names into concrete values.
    pub fn validate(&self) -> Result<RenderConfig> {
        let out = &self.output;

        let resolution = match out.resolution.as_deref() {
            Some(name) => Resolution::preset(name).ok_or_else(|| {
                RenderError::Config(format!("unknown resolution preset '{}'", name))
            })?,
            None => Resolution::new(out.width, out.height),
        };
        if resolution.width == 0 || resolution.height == 0 {
            return Err(RenderError::Config(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        if resolution.width > MAX_DIMENSION || resolution.height > MAX_DIMENSION {
            return Err(RenderError::Config(format!(
                "resolution {} exceeds {}px",
                resolution, MAX_DIMENSION
            )));
        }

        if out.fps == 0 || out.fps > MAX_FPS {
            return Err(RenderError::Config(format!(
                "fps must be in 1..={}, got {}",
                MAX_FPS, out.fps
            )));
        }

        let style: VisualStyle = out.style.parse()?;

        let palette = self
            .palettes
            .get(&out.color_scheme)
            .copied()
            .or_else(|| Palette::builtin(&out.color_scheme))
            .ok_or_else(|| {
                RenderError::Config(format!("unknown color scheme '{}'", out.color_scheme))
            })?;

        for (name, secs) in [("intro_seconds", out.intro_seconds), ("outro_seconds", out.outro_seconds)] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(RenderError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, secs
                )));
            }
        }

        if out.track_label.trim().is_empty() {
            return Err(RenderError::Config("track_label must not be empty".into()));
        }

        self.analysis.check()?;

        let font = match out.font_path {
            Some(ref path) => Some(load_font(path)?),
            None => None,
        };

        Ok(RenderConfig {
            resolution,
            fps: out.fps,
            style,
            palette_name: out.color_scheme.clone(),
            palette,
            intro_seconds: out.intro_seconds,
            outro_seconds: out.outro_seconds,
            track_label: out.track_label.clone(),
            prng_seed: out.prng_seed,
            workers: out.workers,
            font,
            overlay: self.overlay.clone(),
            analysis: self.analysis.clone(),
            encoder: self.encoder.clone(),
        })
    }
}

fn load_font(path: &Path) -> Result<FontSource> {
    let bytes = std::fs::read(path).map_err(|e| {
        RenderError::Config(format!("failed to read font {}: {}", path.display(), e))
    })?;
    // Parse once up front so a bad font is rejected before any frame work.
    TextOverlay::from_bytes(&bytes)?;
    Ok(FontSource {
        path: path.to_path_buf(),
        bytes: bytes.into(),
    })
}

impl RenderConfig {
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn style(&self) -> VisualStyle {
        self.style
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_name(&self) -> &str {
        &self.palette_name
    }

    pub fn intro_seconds(&self) -> f64 {
        self.intro_seconds
    }

    pub fn outro_seconds(&self) -> f64 {
        self.outro_seconds
    }

    pub fn track_label(&self) -> &str {
        &self.track_label
    }

    pub fn prng_seed(&self) -> u64 {
        self.prng_seed
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn font(&self) -> Option<&FontSource> {
        self.font.as_ref()
    }

    pub fn overlay(&self) -> &OverlayText {
        &self.overlay
    }

    pub fn analysis(&self) -> &AnalysisSettings {
        &self.analysis
    }

    pub fn encoder(&self) -> &FfmpegOptions {
        &self.encoder
    }

    /// `round(intro_seconds * fps)`
    pub fn intro_frames(&self) -> usize {
        (self.intro_seconds * self.fps as f64).round() as usize
    }

    /// `round(outro_seconds * fps)`
    pub fn outro_frames(&self) -> usize {
        (self.outro_seconds * self.fps as f64).round() as usize
    }
}

/// Load settings from a TOML file.
pub fn load_config(path: &Path) -> Result<RenderSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RenderError::Config(format!("failed to read {}: {}", path.display(), e))
    })?;
    let settings = RenderSettings::from_toml_str(&content)?;
    log::info!("Loaded config from {}", path.display());
    Ok(settings)
}

const CONFIG_FILE_NAME: &str = "sonica.toml";

/// Search order for config files: the working directory first, then the
/// per-user config directories.
fn config_candidates(cwd: Option<&Path>, home: Option<&Path>, config_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(cwd) = cwd {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home {
        candidates.push(home.join(".config").join("sonica").join("config.toml"));
    }
    if let Some(dir) = config_dir {
        let platform = dir.join("sonica").join("config.toml");
        if !candidates.contains(&platform) {
            candidates.push(platform);
        }
    }
    candidates
}

fn default_candidates() -> Vec<PathBuf> {
    config_candidates(
        std::env::current_dir().ok().as_deref(),
        dirs::home_dir().as_deref(),
        dirs::config_dir().as_deref(),
    )
}

fn first_existing(candidates: &[PathBuf]) -> Option<&PathBuf> {
    candidates.iter().find(|p| p.is_file())
}

/// Locate a config file: `sonica.toml` in the working directory, then
/// `~/.config/sonica/config.toml`, then the platform config directory.
pub fn find_config_file() -> Option<PathBuf> {
    first_existing(&default_candidates()).cloned()
}

fn settings_from(candidates: &[PathBuf]) -> Result<RenderSettings> {
    match first_existing(candidates) {
        Some(path) => load_config(path),
        None => {
            log::debug!("no config file found, using defaults");
            Ok(RenderSettings::default())
        }
    }
}

/// Settings from the discovered config file, or defaults when there is none.
pub fn discover_settings() -> Result<RenderSettings> {
    settings_from(&default_candidates())
}
