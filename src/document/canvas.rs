//! Immutable document snapshots.
//!
//! Preview and batch rendering never read the live [`super::CanvasDocument`];
//! they take a [`DocumentSnapshot`] first, so edits made while a batch runs
//! cannot reach in-flight renders.

use std::sync::Arc;

use super::types::{CanvasSize, Element};

/// Frozen copy of a document at one revision.
///
/// Cheap to clone: the element stack is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    revision: u64,
    canvas_size: CanvasSize,
    edit_surface: CanvasSize,
    elements: Arc<[Element]>,
}

impl DocumentSnapshot {
    pub(crate) fn new(
        revision: u64,
        canvas_size: CanvasSize,
        edit_surface: CanvasSize,
        elements: Vec<Element>,
    ) -> Self {
        Self {
            revision,
            canvas_size,
            edit_surface,
            elements: elements.into(),
        }
    }

    /// Document revision this snapshot was taken at.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Target output resolution.
    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas_size
    }

    /// On-screen edit resolution the element coordinates are expressed in.
    pub fn edit_surface(&self) -> CanvasSize {
        self.edit_surface
    }

    /// Element stack, bottom first.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// `editSurfaceWidth / canvasSize.width`.
    pub fn display_scale(&self) -> f64 {
        self.edit_surface.width as f64 / self.canvas_size.width as f64
    }

    /// Factor mapping edit-space coordinates to output space:
    /// `canvasSize.width / editSurfaceWidth`.
    pub fn export_scale(&self) -> f64 {
        self.canvas_size.width as f64 / self.edit_surface.width as f64
    }
}
