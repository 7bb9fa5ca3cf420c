//! Shape coverage masks.
//!
//! Extents are `width·|scale.x| × height·|scale.y|` centered on the element
//! position. Circles become ellipses under non-uniform scale. Triangles are
//! isosceles with the apex at top center.

use rayon::prelude::*;

use super::{Layer, Paint, SAMPLES, clip_box};
use crate::document::{Position, Scale, ShapeKind, ShapeProps};
use crate::error::Result;

/// Coverage of the shape inside `surface`; only the visible part is allocated.
pub(crate) fn shape_layer(
    props: &ShapeProps,
    center: Position,
    scale: Scale,
    surface: (u32, u32),
) -> Result<Option<Layer>> {
    let w = (props.width * scale.x).abs();
    let h = (props.height * scale.y).abs();
    if w == 0.0 || h == 0.0 {
        return Ok(None);
    }
    let Some((x, y, width, height)) =
        clip_box(center.x - w / 2.0, center.y - h / 2.0, w, h, surface)?
    else {
        return Ok(None);
    };

    let shape = props.shape;
    let mut coverage = vec![0.0f32; width * height];
    coverage
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out)| {
            for (col, cell) in out.iter_mut().enumerate() {
                let hits = SAMPLES
                    .iter()
                    .filter(|(dx, dy)| {
                        let px = (x + col as i64) as f64 + dx;
                        let py = (y + row as i64) as f64 + dy;
                        inside(shape, px - center.x, py - center.y, w, h)
                    })
                    .count();
                *cell = hits as f32 / SAMPLES.len() as f32;
            }
        });

    Ok(Some(Layer {
        x,
        y,
        width,
        height,
        coverage,
        paint: Paint::Solid(props.fill),
    }))
}

/// Point test relative to the shape center.
fn inside(shape: ShapeKind, dx: f64, dy: f64, w: f64, h: f64) -> bool {
    let hw = w / 2.0;
    let hh = h / 2.0;
    if hw <= 0.0 || hh <= 0.0 {
        return false;
    }
    match shape {
        ShapeKind::Rect => dx.abs() <= hw && dy.abs() <= hh,
        ShapeKind::Circle => (dx / hw).powi(2) + (dy / hh).powi(2) <= 1.0,
        ShapeKind::Triangle => {
            if dy.abs() > hh {
                return false;
            }
            // half-width grows linearly from 0 at the apex to hw at the base
            let depth = (dy + hh) / h;
            dx.abs() <= hw * depth
        }
    }
}
