use crate::config::Rgb;

/// One 2-D shape in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Axis-aligned filled rectangle; `(x, y)` is the top-left corner
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgb,
    },
    /// Circle; filled when `stroke` is `None`, otherwise an outline of that width
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        stroke: Option<f32>,
        color: Rgb,
    },
    /// Square dot of `size` pixels centered on `(x, y)`
    Point { x: f32, y: f32, size: f32, color: Rgb },
}

/// Text drawn centered on `(x, y)` and blended with `alpha`.
#[derive(Clone, Debug, PartialEq)]
pub struct TextDirective {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Rgb,
    pub alpha: f32,
}

/// Ordered shapes and text for one frame, painted over a solid background.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawList {
    pub background: Rgb,
    pub primitives: Vec<Primitive>,
    pub texts: Vec<TextDirective>,
}

impl DrawList {
    pub fn new(background: Rgb) -> Self {
        Self {
            background,
            primitives: Vec::new(),
            texts: Vec::new(),
        }
    }

    pub fn push(&mut self, primitive: Primitive) {
        self.primitives.push(primitive);
    }

    pub fn push_text(&mut self, text: TextDirective) {
        self.texts.push(text);
    }

    pub fn rects(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| matches!(p, Primitive::Rect { .. }))
    }

    pub fn circles(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| matches!(p, Primitive::Circle { .. }))
    }
}
