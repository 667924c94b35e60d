use super::draw::{DrawList, TextDirective};
use crate::config::{OverlayText, Palette, RenderConfig, Resolution, Rgb};

/// Builds the fixed text compositions of the intro, main and outro phases.
pub struct OverlayComposer {
    resolution: Resolution,
    palette: Palette,
    text: OverlayText,
    track_label: String,
    base_size: f32,
}

impl OverlayComposer {
    pub fn new(config: &RenderConfig) -> Self {
        let resolution = config.resolution();
        let base_size = (resolution.shorter_side() as f32 * 0.046).max(12.0);
        Self {
            resolution,
            palette: *config.palette(),
            text: config.overlay().clone(),
            track_label: config.track_label().to_string(),
            base_size,
        }
    }

    fn line(&self, text: &str, y: f32, scale: f32, color: Rgb, alpha: f32) -> TextDirective {
        TextDirective {
            text: text.to_string(),
            x: self.resolution.width as f32 / 2.0,
            y,
            size: self.base_size * scale,
            color,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    /// Intro title card; text grows and fades in with `alpha`.
    pub fn intro(&self, alpha: f32) -> DrawList {
        let h = self.resolution.height as f32;
        let mut list = DrawList::new(self.palette.background);
        list.push_text(self.line(&self.text.intro_banner, h / 3.0, 2.0 * alpha, self.palette.text, alpha));
        list.push_text(self.line(&self.track_label, h / 2.0, 1.5 * alpha, self.palette.accent, alpha));
        list.push_text(self.line(&self.text.intro_tagline, 2.0 * h / 3.0, alpha, self.palette.secondary, alpha));
        list
    }

    /// Persistent banner and footer watermark drawn on every Main frame.
    pub fn main(&self, list: &mut DrawList) {
        let h = self.resolution.height as f32;
        let margin = self.base_size * 1.2;
        list.push_text(self.line(&self.track_label, margin, 1.0, self.palette.text, 1.0));
        list.push_text(self.line(&self.text.watermark, h - margin, 0.8, self.palette.secondary, 1.0));
    }

    /// Closing card; text shrinks and fades out as `alpha` falls.
    pub fn outro(&self, alpha: f32) -> DrawList {
        let h = self.resolution.height as f32;
        let mut list = DrawList::new(self.palette.background);
        list.push_text(self.line(&self.text.outro_banner, h / 3.0, 1.5 * alpha, self.palette.text, alpha));
        list.push_text(self.line(&self.text.outro_tagline, h / 2.0, alpha, self.palette.accent, alpha));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderSettings;

    fn composer() -> OverlayComposer {
        let mut settings = RenderSettings::default();
        settings.output.track_label = "Night Drive".into();
        OverlayComposer::new(&settings.validate().unwrap())
    }

    #[test]
    fn intro_has_banner_label_and_tagline_without_geometry() {
        let list = composer().intro(0.5);
        assert!(list.primitives.is_empty());
        let texts: Vec<&str> = list.texts.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["NOW PLAYING", "Night Drive", "FULL TRACK"]);
        assert!(list.texts.iter().all(|t| t.alpha == 0.5));
    }

    #[test]
    fn intro_starts_invisible() {
        let list = composer().intro(0.0);
        assert!(list.texts.iter().all(|t| t.alpha == 0.0 && t.size == 0.0));
    }

    #[test]
    fn main_overlay_is_label_and_watermark() {
        let mut list = DrawList::new(Rgb::BLACK);
        composer().main(&mut list);
        assert_eq!(list.texts.len(), 2);
        assert_eq!(list.texts[0].text, "Night Drive");
        assert_eq!(list.texts[1].text, "VISUALIZED");
    }

    #[test]
    fn outro_fades() {
        let c = composer();
        assert_eq!(c.outro(1.0).texts[0].alpha, 1.0);
        assert_eq!(c.outro(0.25).texts[1].alpha, 0.25);
    }
}
