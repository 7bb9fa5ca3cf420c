//! # Preview Renderer
//!
//! Reduced-size rendering of the template with one data row substituted.
//!
//! The preview surface is the canvas fitted into the preview budget
//! (default 400×400) and then halved:
//!
//! ```text
//! preview_scale = min(budget.w / canvas.w, budget.h / canvas.h) * 0.5
//! ```
//!
//! Elements go through the same transform as batch output, with
//! `factor = export_scale * preview_scale`, so a preview is a faithful
//! miniature of the full-resolution design.

use image::RgbaImage;
use tracing::debug;

use crate::config::PreviewBudget;
use crate::data::DataTable;
use crate::document::{CanvasSize, DocumentSnapshot, Element};
use crate::error::{Result, StencilError};
use crate::mapping::FieldMapping;
use crate::render::{CanvasRenderer, scale_elements};

/// Extra reduction applied on top of fit-to-budget.
pub const PREVIEW_REDUCTION: f64 = 0.5;

/// A rendered preview.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub row_index: usize,
    /// Output pixels per canvas pixel.
    pub scale: f64,
    pub image: RgbaImage,
    /// Elements as drawn, in preview-surface pixels, after substitution.
    pub elements: Vec<Element>,
}

impl PreviewFrame {
    /// Text drawn for the named element, if it is a text element.
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.kind.as_text())
            .map(|t| t.content.as_str())
    }
}

/// `min(budget.w / canvas.w, budget.h / canvas.h) * 0.5`.
pub fn preview_scale(canvas: CanvasSize, budget: PreviewBudget) -> f64 {
    let fit = (budget.width as f64 / canvas.width as f64)
        .min(budget.height as f64 / canvas.height as f64);
    fit * PREVIEW_REDUCTION
}

/// Render row `row_index` of `table` over `snapshot`.
///
/// Returns `Ok(None)` when the table is empty; an index past the end is
/// [`StencilError::RowOutOfRange`]. Nothing passed in is mutated.
pub fn render_preview(
    renderer: &CanvasRenderer,
    snapshot: &DocumentSnapshot,
    table: &DataTable,
    mapping: &FieldMapping,
    row_index: usize,
    budget: PreviewBudget,
) -> Result<Option<PreviewFrame>> {
    if table.is_empty() {
        return Ok(None);
    }
    let row = table.row(row_index).ok_or(StencilError::RowOutOfRange {
        index: row_index,
        len: table.len(),
    })?;

    let canvas = snapshot.canvas_size();
    let scale = preview_scale(canvas, budget);
    let width = ((canvas.width as f64 * scale).round() as u32).max(1);
    let height = ((canvas.height as f64 * scale).round() as u32).max(1);

    let mut elements = scale_elements(snapshot.elements(), snapshot.export_scale() * scale);
    mapping.apply(&mut elements, row);

    debug!(row = row_index, width, height, scale, "rendering preview");
    let image = renderer.rasterize(&elements, width, height)?;

    Ok(Some(PreviewFrame {
        row_index,
        scale,
        image,
        elements,
    }))
}
