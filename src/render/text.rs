//! Text rendering.
//!
//! Families registered in the [`FontBook`] render through ab_glyph with
//! anti-aliasing. Anything else falls back to the embedded Spleen 12×24
//! bitmap font, stretched to the requested size.
//!
//! Glyph height is `fontSize`; the element's `scale.x / scale.y` ratio only
//! stretches glyphs horizontally. Resizing a text element through
//! `ElementPatch::scale` folds the vertical factor into `fontSize`, so the
//! export transform can scale both without doubling up. Lines are split on
//! `\n` and spaced at [`LINE_HEIGHT`] × `fontSize`.

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont, point};
use spleen_font::{FONT_12X24, PSF2Font};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::debug;

use super::{Layer, Paint};
use crate::document::{Position, Scale, TextAlign, TextProps};
use crate::error::{Result, StencilError};

/// Line spacing as a multiple of font size.
pub const LINE_HEIGHT: f32 = 1.16;

/// Refuse masks larger than this many pixels.
const MAX_MASK_PIXELS: usize = 1 << 26;

const SPLEEN_W: usize = 12;
const SPLEEN_H: usize = 24;

/// Font families available to the renderer, keyed by lowercase name.
#[derive(Clone, Default)]
pub struct FontBook {
    faces: HashMap<String, FontArc>,
}

impl FontBook {
    /// Load every `family → path` entry.
    pub fn load(fonts: &BTreeMap<String, PathBuf>) -> Result<Self> {
        let mut book = Self::default();
        for (family, path) in fonts {
            let bytes = std::fs::read(path).map_err(|e| {
                StencilError::Config(format!("font '{}' ({}): {}", family, path.display(), e))
            })?;
            book.insert_bytes(family, bytes)?;
            debug!(family = %family, path = %path.display(), "loaded font");
        }
        Ok(book)
    }

    pub fn insert_bytes(&mut self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| StencilError::Config(format!("font '{}' is invalid: {}", family, e)))?;
        self.faces.insert(family.trim().to_lowercase(), font);
        Ok(())
    }

    pub fn face(&self, family: &str) -> Option<&FontArc> {
        self.faces.get(&family.trim().to_lowercase())
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.faces.keys().map(String::as_str)
    }
}

/// Rendered text as a coverage buffer.
pub struct TextMask {
    pub width: usize,
    pub height: usize,
    /// 0.0 = transparent, 1.0 = fully covered.
    pub data: Vec<f32>,
}

impl TextMask {
    fn new(width: usize, height: usize) -> Result<Self> {
        let width = width.max(1);
        let height = height.max(1);
        if width.saturating_mul(height) > MAX_MASK_PIXELS {
            return Err(StencilError::Render(format!(
                "text block too large ({}x{})",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            data: vec![0.0; width * height],
        })
    }

    #[inline]
    fn add(&mut self, x: i64, y: i64, coverage: f32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            let idx = y as usize * self.width + x as usize;
            self.data[idx] = (self.data[idx] + coverage).min(1.0);
        }
    }
}

/// Layer for a text element, or `None` when nothing would be drawn.
pub(crate) fn text_layer(
    fonts: &FontBook,
    props: &TextProps,
    center: Position,
    scale: Scale,
) -> Result<Option<Layer>> {
    if props.content.is_empty() || props.font_size <= 0.0 || scale.x == 0.0 || scale.y == 0.0 {
        return Ok(None);
    }
    let aspect = (scale.x / scale.y).abs() as f32;
    let size = props.font_size as f32;

    let mask = match fonts.face(&props.font_family) {
        Some(font) => render_ttf(font, &props.content, size, aspect, props.align)?,
        None => render_bitmap(&props.content, size, aspect, props.align)?,
    };

    Ok(Some(Layer {
        x: (center.x - mask.width as f64 / 2.0).round() as i64,
        y: (center.y - mask.height as f64 / 2.0).round() as i64,
        width: mask.width,
        height: mask.height,
        coverage: mask.data,
        paint: Paint::Solid(props.fill),
    }))
}

fn lines(content: &str) -> Vec<&str> {
    content.split('\n').map(|l| l.trim_end_matches('\r')).collect()
}

fn align_offset(align: TextAlign, block_width: f32, line_width: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => (block_width - line_width) / 2.0,
        TextAlign::Right => block_width - line_width,
    }
}

/// Render text with a TTF/OTF face.
pub fn render_ttf(
    font: &FontArc,
    content: &str,
    size: f32,
    aspect: f32,
    align: TextAlign,
) -> Result<TextMask> {
    let px = PxScale {
        x: size * aspect,
        y: size,
    };
    let scaled = font.as_scaled(px);
    let line_height = size * LINE_HEIGHT;

    // Layout: glyph positions per line
    let mut laid_out: Vec<(Vec<(GlyphId, f32)>, f32)> = Vec::new();
    for line in lines(content) {
        let mut glyphs = Vec::new();
        let mut caret = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for ch in line.chars() {
            let id = font.glyph_id(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            prev = Some(id);
        }
        laid_out.push((glyphs, caret));
    }

    let block_width = laid_out.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
    let mut mask = TextMask::new(
        block_width.ceil() as usize,
        (line_height * laid_out.len() as f32).ceil() as usize,
    )?;

    let ascent = scaled.ascent();
    let descent = scaled.descent();
    let leading = (line_height - (ascent - descent)) / 2.0;

    for (i, (glyphs, line_width)) in laid_out.iter().enumerate() {
        let baseline = i as f32 * line_height + leading + ascent;
        let offset = align_offset(align, block_width, *line_width);
        for &(id, gx) in glyphs {
            let glyph = id.with_scale_and_position(px, point(offset + gx, baseline));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|x, y, coverage| {
                    mask.add(
                        x as i64 + bounds.min.x as i64,
                        y as i64 + bounds.min.y as i64,
                        coverage,
                    );
                });
            }
        }
    }
    Ok(mask)
}

/// Render text with the Spleen 12×24 bitmap font, nearest-neighbor scaled.
pub fn render_bitmap(content: &str, size: f32, aspect: f32, align: TextAlign) -> Result<TextMask> {
    let mut spleen = PSF2Font::new(FONT_12X24)
        .map_err(|_| StencilError::Render("embedded bitmap font failed to load".into()))?;

    let cell_h = size;
    let cell_w = size * SPLEEN_W as f32 / SPLEEN_H as f32 * aspect;
    let line_height = size * LINE_HEIGHT;

    let text_lines = lines(content);
    let line_widths: Vec<f32> = text_lines
        .iter()
        .map(|l| l.chars().count() as f32 * cell_w)
        .collect();
    let block_width = line_widths.iter().copied().fold(0.0f32, f32::max);
    let mut mask = TextMask::new(
        block_width.ceil() as usize,
        (line_height * text_lines.len() as f32).ceil() as usize,
    )?;

    let mut cache: HashMap<char, Vec<u8>> = HashMap::new();
    let out_w = cell_w.round().max(1.0) as usize;
    let out_h = cell_h.round().max(1.0) as usize;

    for (i, line) in text_lines.iter().enumerate() {
        let top = i as f32 * line_height + (line_height - cell_h) / 2.0;
        let offset = align_offset(align, block_width, line_widths[i]);
        for (n, ch) in line.chars().enumerate() {
            let bitmap = cache
                .entry(ch)
                .or_insert_with(|| spleen_glyph(&mut spleen, ch));
            let x0 = (offset + n as f32 * cell_w).round() as i64;
            let y0 = top.round() as i64;
            for dy in 0..out_h {
                let sy = (dy * SPLEEN_H / out_h).min(SPLEEN_H - 1);
                for dx in 0..out_w {
                    let sx = (dx * SPLEEN_W / out_w).min(SPLEEN_W - 1);
                    if bitmap[sy * SPLEEN_W + sx] == 1 {
                        mask.add(x0 + dx as i64, y0 + dy as i64, 1.0);
                    }
                }
            }
        }
    }
    Ok(mask)
}

/// 12×24 glyph bitmap, 1 = ink. Unknown characters render as a box.
fn spleen_glyph(spleen: &mut PSF2Font, ch: char) -> Vec<u8> {
    let mut glyph = vec![0u8; SPLEEN_W * SPLEEN_H];
    let utf8 = ch.to_string();
    match spleen.glyph_for_utf8(utf8.as_bytes()) {
        Some(rows) => {
            for (row_y, row) in rows.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if row_y < SPLEEN_H && col_x < SPLEEN_W && on {
                        glyph[row_y * SPLEEN_W + col_x] = 1;
                    }
                }
            }
        }
        None => draw_box(&mut glyph, SPLEEN_W, SPLEEN_H),
    }
    glyph
}

fn draw_box(glyph: &mut [u8], width: usize, height: usize) {
    for x in 0..width {
        glyph[x] = 1;
        glyph[(height - 1) * width + x] = 1;
    }
    for y in 0..height {
        glyph[y * width] = 1;
        glyph[y * width + width - 1] = 1;
    }
}
