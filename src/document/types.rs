//! Element types for the canvas document.
//!
//! Every element is a [`Element`] with common geometry (`position`, `scale`,
//! `opacity`) and a [`ElementKind`] payload. Consumers match on the kind
//! exhaustively, so adding a variant is a compile error at every render and
//! listing site rather than a silently ignored field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StencilError;

/// Reserved name of the background element.
pub const BACKGROUND: &str = "Background";

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
        }
    }
}

/// Anchor point of an element (its center), in edit-surface units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Independent x/y multipliers applied at render time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    #[serde(default = "one")]
    pub x: f64,
    #[serde(default = "one")]
    pub y: f64,
}

fn one() -> f64 {
    1.0
}

fn default_opacity() -> f32 {
    1.0
}

impl Scale {
    pub fn uniform(factor: f64) -> Self {
        Self {
            x: factor,
            y: factor,
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

/// RGBA color, serialized as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl FromStr for Color {
    type Err = StencilError;

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || StencilError::Validation(format!("invalid color '{}'", s));
        if !hex.is_ascii() {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let mut channels = [0u8; 3];
                for (i, ch) in hex.chars().enumerate() {
                    let v = ch.to_digit(16).ok_or_else(invalid)? as u8;
                    channels[i] = v * 17;
                }
                Ok(Color::rgb(channels[0], channels[1], channels[2]))
            }
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = StencilError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Horizontal alignment of lines within a text block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Metadata each element payload provides for the editor.
pub trait ElementMeta {
    /// Human-readable label, also the prefix of auto-generated names.
    fn label() -> &'static str;
    /// Defaults used when an element of this kind is added without props.
    fn editor_default() -> Self;
}

/// Text payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    /// Literal content; replaced at render time when the element is mapped.
    pub content: String,
    pub font_size: f64,
    #[serde(default)]
    pub font_family: String,
    #[serde(default)]
    pub align: TextAlign,
    pub fill: Color,
}

impl ElementMeta for TextProps {
    fn label() -> &'static str {
        "Text"
    }
    fn editor_default() -> Self {
        Self {
            content: "New text".into(),
            font_size: 24.0,
            font_family: String::new(),
            align: TextAlign::Center,
            fill: Color::BLACK,
        }
    }
}

impl TextProps {
    pub fn new(content: impl Into<String>, font_size: f64) -> Self {
        Self {
            content: content.into(),
            font_size,
            ..Self::editor_default()
        }
    }
}

/// Image payload. `width`/`height` are the unscaled box in edit units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProps {
    /// Embedded bitmap, either a `data:image/...;base64,` URL or bare base64.
    pub source_data: String,
    pub width: f64,
    pub height: f64,
}

impl ElementMeta for ImageProps {
    fn label() -> &'static str {
        "Image"
    }
    fn editor_default() -> Self {
        Self {
            source_data: String::new(),
            width: 100.0,
            height: 100.0,
        }
    }
}

/// Shape outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rect,
    Circle,
    Triangle,
}

/// Shape payload. Circles keep `width == height == 2 * radius`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeProps {
    pub shape: ShapeKind,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
}

impl ElementMeta for ShapeProps {
    fn label() -> &'static str {
        "Shape"
    }
    fn editor_default() -> Self {
        Self::rect(100.0, 100.0, Color::rgb(0x3b, 0x82, 0xf6))
    }
}

impl ShapeProps {
    pub fn rect(width: f64, height: f64, fill: Color) -> Self {
        Self {
            shape: ShapeKind::Rect,
            width,
            height,
            fill,
        }
    }

    pub fn circle(radius: f64, fill: Color) -> Self {
        Self {
            shape: ShapeKind::Circle,
            width: radius * 2.0,
            height: radius * 2.0,
            fill,
        }
    }

    pub fn triangle(width: f64, height: f64, fill: Color) -> Self {
        Self {
            shape: ShapeKind::Triangle,
            width,
            height,
            fill,
        }
    }

    pub fn radius(&self) -> f64 {
        self.width / 2.0
    }
}

/// Tagged element payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Text(TextProps),
    Image(ImageProps),
    Shape(ShapeProps),
}

impl ElementKind {
    /// Label used as auto-name prefix ("Text", "Image", "Rect", ...).
    pub fn label(&self) -> &'static str {
        match self {
            ElementKind::Text(_) => TextProps::label(),
            ElementKind::Image(_) => ImageProps::label(),
            ElementKind::Shape(s) => match s.shape {
                ShapeKind::Rect => "Rect",
                ShapeKind::Circle => "Circle",
                ShapeKind::Triangle => "Triangle",
            },
        }
    }

    pub fn as_text(&self) -> Option<&TextProps> {
        match self {
            ElementKind::Text(t) => Some(t),
            ElementKind::Image(_) | ElementKind::Shape(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.as_text().is_some()
    }
}

/// One visual object in the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Unique key; also the join key for field mapping.
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub scale: Scale,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub kind: ElementKind,
}

impl Element {
    pub fn new(name: impl Into<String>, position: Position, kind: ElementKind) -> Self {
        Self {
            name: name.into(),
            position,
            scale: Scale::default(),
            opacity: 1.0,
            kind,
        }
    }

    pub fn text(name: impl Into<String>, position: Position, props: TextProps) -> Self {
        Self::new(name, position, ElementKind::Text(props))
    }

    pub fn is_background(&self) -> bool {
        self.name == BACKGROUND
    }

    /// Background rect covering a surface of the given size.
    pub fn background(surface: CanvasSize, fill: Color) -> Self {
        Self::new(
            BACKGROUND,
            Position::new(surface.width as f64 / 2.0, surface.height as f64 / 2.0),
            ElementKind::Shape(ShapeProps::rect(
                surface.width as f64,
                surface.height as f64,
                fill,
            )),
        )
    }
}

/// Property-panel edit. `None` fields are left untouched; fields that do
/// not apply to the element's kind are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementPatch {
    pub position: Option<Position>,
    pub scale: Option<Scale>,
    pub opacity: Option<f32>,
    pub content: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub align: Option<TextAlign>,
    pub fill: Option<Color>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub source_data: Option<String>,
}

impl ElementPatch {
    /// Apply this patch to an element.
    pub fn apply(&self, element: &mut Element) -> Result<(), StencilError> {
        let reject = |field: &str| {
            StencilError::Validation(format!(
                "'{}' does not apply to {} element '{}'",
                field,
                element.kind.label(),
                element.name
            ))
        };

        // Validate everything before mutating so a rejected patch changes nothing.
        match &element.kind {
            ElementKind::Text(_) => {
                if self.width.is_some() || self.height.is_some() {
                    return Err(reject("width/height"));
                }
                if self.source_data.is_some() {
                    return Err(reject("sourceData"));
                }
            }
            ElementKind::Image(_) => {
                if self.content.is_some()
                    || self.font_size.is_some()
                    || self.font_family.is_some()
                    || self.align.is_some()
                {
                    return Err(reject("text properties"));
                }
                if self.fill.is_some() {
                    return Err(reject("fill"));
                }
            }
            ElementKind::Shape(_) => {
                if self.content.is_some()
                    || self.font_size.is_some()
                    || self.font_family.is_some()
                    || self.align.is_some()
                {
                    return Err(reject("text properties"));
                }
                if self.source_data.is_some() {
                    return Err(reject("sourceData"));
                }
            }
        }
        if let Some(s) = self.scale {
            if !(s.x.is_finite() && s.y.is_finite()) {
                return Err(StencilError::Validation("scale must be finite".into()));
            }
            if element.kind.is_text() && (s.x <= 0.0 || s.y <= 0.0) {
                return Err(reject("non-positive scale"));
            }
        }
        if let Some(size) = self.font_size
            && size <= 0.0
        {
            return Err(StencilError::Validation("font size must be positive".into()));
        }
        if let Some(opacity) = self.opacity
            && !(0.0..=1.0).contains(&opacity)
        {
            return Err(StencilError::Validation(
                "opacity must be between 0 and 1".into(),
            ));
        }

        if let Some(p) = self.position {
            element.position = p;
        }
        let previous_scale = element.scale;
        if let Some(s) = self.scale {
            element.scale = s;
        }
        if let Some(o) = self.opacity {
            element.opacity = o;
        }
        match &mut element.kind {
            ElementKind::Text(t) => {
                if let Some(c) = &self.content {
                    t.content = c.clone();
                }
                if let Some(fs) = self.font_size {
                    t.font_size = fs;
                }
                // text height is the font size; vertical scale folds into it
                if let Some(s) = self.scale {
                    let base = if previous_scale.y > 0.0 { previous_scale.y } else { 1.0 };
                    t.font_size *= s.y / base;
                    element.scale = Scale {
                        x: base * s.x / s.y,
                        y: base,
                    };
                }
                if let Some(ff) = &self.font_family {
                    t.font_family = ff.clone();
                }
                if let Some(a) = self.align {
                    t.align = a;
                }
                if let Some(f) = self.fill {
                    t.fill = f;
                }
            }
            ElementKind::Image(img) => {
                if let Some(w) = self.width {
                    img.width = w;
                }
                if let Some(h) = self.height {
                    img.height = h;
                }
                if let Some(src) = &self.source_data {
                    img.source_data = src.clone();
                }
            }
            ElementKind::Shape(s) => {
                if let Some(w) = self.width {
                    s.width = w;
                }
                if let Some(h) = self.height {
                    s.height = h;
                }
                if s.shape == ShapeKind::Circle {
                    // circles stay round; height wins when both extents are given
                    let r = self.height.or(self.width).unwrap_or(s.width);
                    s.width = r;
                    s.height = r;
                }
                if let Some(f) = self.fill {
                    s.fill = f;
                }
            }
        }
        Ok(())
    }
}
