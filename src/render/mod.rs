//! # Rendering Module
//!
//! Turns an element stack into pixels.
//!
//! ## Modules
//!
//! - [`text`]: font book (TTF via ab_glyph, Spleen bitmap fallback) and text masks
//! - [`shapes`]: rect / ellipse / triangle coverage
//! - [`image`]: embedded bitmap decoding
//! - [`encode`]: PNG / JPEG output
//!
//! ## Coordinate model
//!
//! Elements are stored in edit-surface units. [`scale_elements`] is the one
//! transform from edit space into a target surface: it multiplies position,
//! scale and (for text) font size by the same factor. Batch output uses
//! `factor = export_scale`; previews use `export_scale * preview_scale`.
//!
//! The edit surface is rounded to whole units, so `factor` can leave the
//! Background a fraction of a pixel short of the output. The Background is
//! therefore always painted across the whole surface.
//!
//! ```
//! use stencil::document::{Element, Position, TextProps};
//! use stencil::render::scale_elements;
//!
//! let title = Element::text("Title", Position::new(250.0, 100.0), TextProps::new("Hi", 40.0));
//! let scaled = scale_elements(&[title], 2.16);
//! assert_eq!(scaled[0].position, Position::new(540.0, 216.0));
//! ```

pub mod encode;
pub mod image;
pub mod shapes;
pub mod text;

pub use encode::OutputFormat;
pub use text::FontBook;

use ::image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::sync::Arc;

use crate::document::{Color, Element, ElementKind};
use crate::error::{Result, StencilError};

/// Scale an element stack from edit space into a target surface.
pub fn scale_elements(elements: &[Element], factor: f64) -> Vec<Element> {
    elements
        .iter()
        .map(|element| {
            let mut e = element.clone();
            e.position.x *= factor;
            e.position.y *= factor;
            e.scale.x *= factor;
            e.scale.y *= factor;
            if let ElementKind::Text(text) = &mut e.kind {
                text.font_size *= factor;
            }
            e
        })
        .collect()
}

/// Refuse layers larger than this many pixels.
pub(crate) const MAX_LAYER_PIXELS: f64 = (1u64 << 26) as f64;

/// Pixel bounds of the box `left, top, w, h` clipped to a `surface`.
///
/// Returns `(x, y, width, height)`, or `None` when nothing is visible.
pub(crate) fn clip_box(
    left: f64,
    top: f64,
    w: f64,
    h: f64,
    surface: (u32, u32),
) -> Result<Option<(i64, i64, usize, usize)>> {
    if !(left.is_finite() && top.is_finite() && w.is_finite() && h.is_finite()) {
        return Err(StencilError::Render(format!(
            "element box is not finite ({} {} {}x{})",
            left, top, w, h
        )));
    }
    let x0 = left.floor().max(0.0);
    let y0 = top.floor().max(0.0);
    let x1 = (left + w).ceil().min(surface.0 as f64);
    let y1 = (top + h).ceil().min(surface.1 as f64);
    if x1 <= x0 || y1 <= y0 {
        return Ok(None);
    }
    Ok(Some((
        x0 as i64,
        y0 as i64,
        (x1 - x0) as usize,
        (y1 - y0) as usize,
    )))
}

/// Coverage mask placed on the canvas, plus what to paint through it.
pub(crate) struct Layer {
    /// Top-left corner in canvas pixels (may be negative or off-canvas).
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
    /// Row-major coverage in `0.0..=1.0`.
    pub coverage: Vec<f32>,
    pub paint: Paint,
}

pub(crate) enum Paint {
    Solid(Color),
    /// Same dimensions as the layer.
    Pixels(RgbaImage),
}

impl Paint {
    #[inline]
    fn at(&self, x: u32, y: u32) -> [u8; 4] {
        match self {
            Paint::Solid(c) => c.to_rgba(),
            Paint::Pixels(img) => img.get_pixel(x, y).0,
        }
    }
}

/// Rasterizes element stacks onto RGBA surfaces.
#[derive(Clone, Default)]
pub struct CanvasRenderer {
    fonts: Arc<FontBook>,
}

impl CanvasRenderer {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    /// Paint `elements` bottom-first onto a transparent `width × height` surface.
    ///
    /// Coordinates must already be in surface pixels (see [`scale_elements`]).
    pub fn rasterize(&self, elements: &[Element], width: u32, height: u32) -> Result<RgbaImage> {
        if width == 0 || height == 0 {
            return Err(StencilError::Render(format!(
                "invalid surface {}x{}",
                width, height
            )));
        }
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        let surface = (width, height);

        for element in elements {
            let opacity = element.opacity.clamp(0.0, 1.0);
            if opacity == 0.0 {
                continue;
            }
            let layer = match &element.kind {
                ElementKind::Shape(props) if element.is_background() => Some(Layer {
                    x: 0,
                    y: 0,
                    width: width as usize,
                    height: height as usize,
                    coverage: vec![1.0; width as usize * height as usize],
                    paint: Paint::Solid(props.fill),
                }),
                ElementKind::Text(props) => {
                    text::text_layer(&self.fonts, props, element.position, element.scale)?
                }
                ElementKind::Shape(props) => {
                    shapes::shape_layer(props, element.position, element.scale, surface)?
                }
                ElementKind::Image(props) => {
                    image::image_layer(props, element.position, element.scale, surface)?
                }
            };
            if let Some(layer) = layer {
                composite(&mut canvas, &layer, opacity);
            }
        }
        Ok(canvas)
    }
}

/// Source-over blend of `layer` onto `canvas` (straight alpha).
fn composite(canvas: &mut RgbaImage, layer: &Layer, opacity: f32) {
    let canvas_w = canvas.width() as i64;
    let canvas_h = canvas.height() as i64;

    let x0 = layer.x.max(0);
    let y0 = layer.y.max(0);
    let x1 = (layer.x + layer.width as i64).min(canvas_w);
    let y1 = (layer.y + layer.height as i64).min(canvas_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let stride = canvas_w as usize * 4;
    canvas
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(cy, row)| {
            let ly = (cy as i64 - layer.y) as usize;
            for cx in x0..x1 {
                let lx = (cx - layer.x) as usize;
                let cov = layer.coverage[ly * layer.width + lx];
                if cov <= 0.0 {
                    continue;
                }
                let src = layer.paint.at(lx as u32, ly as u32);
                let sa = src[3] as f32 / 255.0 * cov * opacity;
                if sa <= 0.0 {
                    continue;
                }
                let px = &mut row[cx as usize * 4..cx as usize * 4 + 4];
                let da = px[3] as f32 / 255.0;
                let out_a = sa + da * (1.0 - sa);
                for c in 0..3 {
                    let sc = src[c] as f32;
                    let dc = px[c] as f32;
                    px[c] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
                }
                px[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        });
}

/// Supersampling offsets within a pixel (2×2 grid).
pub(crate) const SAMPLES: [(f64, f64); 4] = [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Position, Scale, ShapeProps, TextProps};

    #[test]
    fn scale_elements_multiplies_position_scale_and_font_size() {
        let mut title = Element::text("Title", Position::new(100.0, 50.0), TextProps::new("x", 20.0));
        title.scale = Scale { x: 1.5, y: 0.5 };
        let rect = Element::new(
            "Box",
            Position::new(10.0, 10.0),
            ElementKind::Shape(ShapeProps::rect(40.0, 20.0, Color::BLACK)),
        );
        let factor = 1080.0 / 500.0;
        let out = scale_elements(&[title, rect], factor);

        assert_eq!(out[0].position, Position::new(100.0 * factor, 50.0 * factor));
        assert_eq!(out[0].scale, Scale { x: 1.5 * factor, y: 0.5 * factor });
        assert_eq!(out[0].kind.as_text().unwrap().font_size, 20.0 * factor);
        // shape extents stay in the payload; scale carries the factor
        match &out[1].kind {
            ElementKind::Shape(s) => assert_eq!((s.width, s.height), (40.0, 20.0)),
            _ => unreachable!(),
        }
        assert_eq!(out[1].scale, Scale::uniform(factor));
    }

    #[test]
    fn later_elements_paint_on_top() {
        let bg = Element::background(crate::document::CanvasSize::new(10, 10), Color::WHITE);
        let red = Element::new(
            "Red",
            Position::new(5.0, 5.0),
            ElementKind::Shape(ShapeProps::rect(4.0, 4.0, Color::rgb(255, 0, 0))),
        );
        let img = CanvasRenderer::default().rasterize(&[bg, red], 10, 10).unwrap();
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn opacity_blends_with_background() {
        let bg = Element::background(crate::document::CanvasSize::new(4, 4), Color::WHITE);
        let mut black = Element::new(
            "Dim",
            Position::new(2.0, 2.0),
            ElementKind::Shape(ShapeProps::rect(4.0, 4.0, Color::BLACK)),
        );
        black.opacity = 0.5;
        let img = CanvasRenderer::default().rasterize(&[bg, black], 4, 4).unwrap();
        let px = img.get_pixel(1, 1).0;
        assert!((126..=129).contains(&px[0]), "{:?}", px);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn off_canvas_elements_are_clipped() {
        let far = Element::new(
            "Far",
            Position::new(-100.0, 500.0),
            ElementKind::Shape(ShapeProps::rect(10.0, 10.0, Color::BLACK)),
        );
        let img = CanvasRenderer::default().rasterize(&[far], 8, 8).unwrap();
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn oversized_shape_is_clipped_to_surface() {
        let mut huge = Element::new(
            "Huge",
            Position::new(50.0, 50.0),
            ElementKind::Shape(ShapeProps::rect(100.0, 100.0, Color::BLACK)),
        );
        huge.scale = Scale::uniform(5000.0);
        let img = CanvasRenderer::default().rasterize(&[huge], 100, 100).unwrap();
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn non_finite_geometry_is_render_error() {
        let mut broken = Element::new(
            "Broken",
            Position::new(5.0, 5.0),
            ElementKind::Shape(ShapeProps::rect(10.0, 10.0, Color::BLACK)),
        );
        broken.scale = Scale::uniform(f64::INFINITY);
        assert!(matches!(
            CanvasRenderer::default().rasterize(&[broken], 10, 10),
            Err(StencilError::Render(_))
        ));
    }

    #[test]
    fn background_fills_surface_when_scale_falls_short() {
        // 1920x1080 edits on 500x281; 281 * 3.84 = 1079.04
        let bg = Element::background(crate::document::CanvasSize::new(500, 281), Color::rgb(0, 0, 200));
        let scaled = scale_elements(&[bg], 1920.0 / 500.0);
        let img = CanvasRenderer::default().rasterize(&scaled, 1920, 1080).unwrap();
        assert_eq!(img.get_pixel(0, 1079).0, [0, 0, 200, 255]);
        assert_eq!(img.get_pixel(1919, 1079).0, [0, 0, 200, 255]);
    }

    #[test]
    fn zero_surface_is_render_error() {
        assert!(matches!(
            CanvasRenderer::default().rasterize(&[], 0, 5),
            Err(StencilError::Render(_))
        ));
    }
}
