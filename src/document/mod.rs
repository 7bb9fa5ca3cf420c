//! # Canvas Document Model
//!
//! The authoritative template: an ordered element stack (index 0 = bottom)
//! plus the target output resolution.
//!
//! Element coordinates are stored in *edit-surface* units. The edit surface
//! is the on-screen canvas, fitted into a budget (e.g. 500×500) and never
//! larger than the output resolution. Scaling up to the output happens only
//! at render time, via [`DocumentSnapshot::export_scale`].
//!
//! ```
//! use stencil::document::{CanvasDocument, CanvasSize, SurfaceBudget};
//!
//! let doc = CanvasDocument::with_defaults(CanvasSize::new(1080, 1080), SurfaceBudget::default());
//! assert_eq!(doc.edit_surface().width, 500);
//! let snapshot = doc.snapshot();
//! assert_eq!(snapshot.export_scale(), 1080.0 / 500.0);
//! ```
//!
//! Invariants held by every mutation:
//!
//! - exactly one element is named `"Background"` and it sits at index 0
//! - every element name is unique and non-empty

pub mod canvas;
pub mod template;
pub mod types;

pub use canvas::DocumentSnapshot;
pub use template::TemplateFile;
pub use types::*;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StencilError};

/// Offset applied to pasted copies, in edit units.
pub const PASTE_OFFSET: f64 = 20.0;

/// Maximum on-screen edit surface. The surface is the canvas size fitted
/// into this box (never upscaled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceBudget {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SurfaceBudget {
    fn default() -> Self {
        Self {
            max_width: 500,
            max_height: 500,
        }
    }
}

impl SurfaceBudget {
    /// Fit a canvas size into this budget, preserving aspect.
    pub fn fit(&self, canvas: CanvasSize) -> CanvasSize {
        let scale = (self.max_width as f64 / canvas.width as f64)
            .min(self.max_height as f64 / canvas.height as f64)
            .min(1.0);
        CanvasSize {
            width: ((canvas.width as f64 * scale).round() as u32).max(1),
            height: ((canvas.height as f64 * scale).round() as u32).max(1),
        }
    }
}

/// Direction for z-order moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZDirection {
    Up,
    Down,
}

/// Request to add an element. `name: None` auto-generates a unique name.
#[derive(Debug, Clone)]
pub struct NewElement {
    pub name: Option<String>,
    pub kind: ElementKind,
    /// Defaults to the center of the edit surface.
    pub position: Option<Position>,
    pub scale: Scale,
}

impl NewElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            name: None,
            kind,
            position: None,
            scale: Scale::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

/// The editable template.
#[derive(Debug, Clone)]
pub struct CanvasDocument {
    elements: Vec<Element>,
    canvas_size: CanvasSize,
    edit_surface: CanvasSize,
    budget: SurfaceBudget,
    /// Monotonic disambiguator for auto-generated names.
    next_id: u64,
    /// Bumped on every mutation; carried by snapshots.
    revision: u64,
}

impl CanvasDocument {
    /// Empty document (Background only).
    pub fn new(canvas_size: CanvasSize, budget: SurfaceBudget) -> Result<Self> {
        validate_canvas_size(canvas_size)?;
        let edit_surface = budget.fit(canvas_size);
        Ok(Self {
            elements: vec![Element::background(edit_surface, Color::WHITE)],
            canvas_size,
            edit_surface,
            budget,
            next_id: 1,
            revision: 0,
        })
    }

    /// Default template: Background + "Title" + "Subtitle" text.
    pub fn with_defaults(canvas_size: CanvasSize, budget: SurfaceBudget) -> Self {
        let canvas_size = if validate_canvas_size(canvas_size).is_ok() {
            canvas_size
        } else {
            CanvasSize::default()
        };
        let edit_surface = budget.fit(canvas_size);
        let w = edit_surface.width as f64;
        let h = edit_surface.height as f64;
        let mut title = TextProps::new("Your Title Here", (h * 0.08).round().max(8.0));
        title.font_family = "sans".into();
        let mut subtitle = TextProps::new("Subtitle text", (h * 0.045).round().max(6.0));
        subtitle.font_family = "sans".into();
        subtitle.fill = Color::rgb(0x44, 0x44, 0x44);

        Self {
            elements: vec![
                Element::background(edit_surface, Color::WHITE),
                Element::text("Title", Position::new(w / 2.0, h * 0.4), title),
                Element::text("Subtitle", Position::new(w / 2.0, h * 0.55), subtitle),
            ],
            canvas_size,
            edit_surface,
            budget,
            next_id: 1,
            revision: 0,
        }
    }

    /// Rebuild a document from stored parts, checking every invariant.
    pub fn from_parts(
        canvas_size: CanvasSize,
        edit_surface: CanvasSize,
        budget: SurfaceBudget,
        elements: Vec<Element>,
    ) -> Result<Self> {
        validate_canvas_size(canvas_size)?;
        validate_canvas_size(edit_surface)?;
        if edit_surface.width > canvas_size.width || edit_surface.height > canvas_size.height {
            return Err(StencilError::Validation(format!(
                "edit surface {}x{} exceeds canvas {}x{}",
                edit_surface.width, edit_surface.height, canvas_size.width, canvas_size.height
            )));
        }
        validate_elements(&elements)?;
        Ok(Self {
            elements,
            canvas_size,
            edit_surface,
            budget,
            next_id: 1,
            revision: 0,
        })
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas_size
    }

    pub fn edit_surface(&self) -> CanvasSize {
        self.edit_surface
    }

    pub fn budget(&self) -> SurfaceBudget {
        self.budget
    }

    /// Ratio of edit surface width to output width (≤ 1).
    pub fn edit_scale(&self) -> f64 {
        self.edit_surface.width as f64 / self.canvas_size.width as f64
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Append an element on top of the stack. Returns its name.
    pub fn add_element(&mut self, new: NewElement) -> Result<String> {
        let name = match new.name {
            Some(name) => {
                self.check_free_name(&name)?;
                name
            }
            None => self.generate_name(new.kind.label()),
        };
        let position = new.position.unwrap_or_else(|| self.surface_center());
        let mut element = Element::new(name.clone(), position, new.kind);
        element.scale = new.scale;
        self.elements.push(element);
        self.touch();
        Ok(name)
    }

    /// Remove an element. Deleting the background (or an unknown name) is a no-op.
    ///
    /// Returns the removed element.
    pub fn delete_element(&mut self, name: &str) -> Option<Element> {
        if name == BACKGROUND {
            return None;
        }
        let idx = self.index_of(name)?;
        let removed = self.elements.remove(idx);
        self.touch();
        Some(removed)
    }

    /// Rename an element. The caller migrates mapping/selection state.
    pub fn rename_element(&mut self, name: &str, new_name: &str) -> Result<()> {
        if name == new_name {
            return if self.contains(name) {
                Ok(())
            } else {
                Err(unknown(name))
            };
        }
        if name == BACKGROUND {
            return Err(StencilError::Validation(
                "the background element cannot be renamed".into(),
            ));
        }
        let idx = self.index_of(name).ok_or_else(|| unknown(name))?;
        self.check_free_name(new_name)?;
        self.elements[idx].name = new_name.to_string();
        self.touch();
        Ok(())
    }

    /// Change the output resolution.
    ///
    /// Refits the edit surface and the background box; other elements keep
    /// their stored edit-space coordinates.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<()> {
        let size = CanvasSize::new(width, height);
        validate_canvas_size(size)?;
        self.canvas_size = size;
        self.edit_surface = self.budget.fit(size);
        let surface = self.edit_surface;
        let bg = &mut self.elements[0];
        bg.position = Position::new(surface.width as f64 / 2.0, surface.height as f64 / 2.0);
        bg.scale = Scale::default();
        match &mut bg.kind {
            ElementKind::Shape(s) => {
                s.width = surface.width as f64;
                s.height = surface.height as f64;
            }
            ElementKind::Image(img) => {
                img.width = surface.width as f64;
                img.height = surface.height as f64;
            }
            ElementKind::Text(_) => {}
        }
        self.touch();
        Ok(())
    }

    /// Move an element one step in z-order. The background is pinned at the
    /// bottom; moves that would pass it, or the top, are no-ops.
    ///
    /// Returns whether the stack changed.
    pub fn reorder(&mut self, name: &str, direction: ZDirection) -> Result<bool> {
        let idx = self.index_of(name).ok_or_else(|| unknown(name))?;
        if idx == 0 {
            return Ok(false);
        }
        let target = match direction {
            ZDirection::Up if idx + 1 < self.elements.len() => idx + 1,
            ZDirection::Down if idx > 1 => idx - 1,
            _ => return Ok(false),
        };
        self.elements.swap(idx, target);
        self.touch();
        Ok(true)
    }

    /// Apply a property-panel edit.
    pub fn patch_element(&mut self, name: &str, patch: &ElementPatch) -> Result<()> {
        let idx = self.index_of(name).ok_or_else(|| unknown(name))?;
        if idx == 0 && (patch.position.is_some() || patch.scale.is_some() || patch.width.is_some() || patch.height.is_some()) {
            return Err(StencilError::Validation(
                "the background follows the canvas size; use set_canvas_size".into(),
            ));
        }
        patch.apply(&mut self.elements[idx])?;
        self.touch();
        Ok(())
    }

    /// Insert a copy of `element` offset by [`PASTE_OFFSET`], named
    /// `<name>_copy` (or `<name>_copy_N` when taken). Returns the new name.
    pub fn paste(&mut self, element: &Element) -> Result<String> {
        if element.is_background() {
            return Err(StencilError::Validation(
                "the background element cannot be copied".into(),
            ));
        }
        let base = format!("{}_copy", element.name);
        let mut name = base.clone();
        let mut n = 2;
        while self.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        let mut copy = element.clone();
        copy.name = name.clone();
        copy.position.x += PASTE_OFFSET;
        copy.position.y += PASTE_OFFSET;
        self.elements.push(copy);
        self.touch();
        Ok(name)
    }

    /// Names of elements that may be bound to a data column (Text only,
    /// background excluded), bottom to top.
    pub fn mapping_candidates(&self) -> Vec<&str> {
        self.elements
            .iter()
            .filter(|e| !e.is_background())
            .filter(|e| match &e.kind {
                ElementKind::Text(_) => true,
                ElementKind::Image(_) | ElementKind::Shape(_) => false,
            })
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Immutable copy for preview/batch rendering.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot::new(
            self.revision,
            self.canvas_size,
            self.edit_surface,
            self.elements.clone(),
        )
    }

    fn surface_center(&self) -> Position {
        Position::new(
            self.edit_surface.width as f64 / 2.0,
            self.edit_surface.height as f64 / 2.0,
        )
    }

    fn check_free_name(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(StencilError::Validation("element name cannot be empty".into()));
        }
        if name == BACKGROUND {
            return Err(StencilError::Validation(format!("'{}' is reserved", BACKGROUND)));
        }
        if self.contains(name) {
            return Err(StencilError::Validation(format!(
                "an element named '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    fn generate_name(&mut self, label: &str) -> String {
        loop {
            let candidate = format!("{}_{}", label, self.next_id);
            self.next_id += 1;
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }
}

fn unknown(name: &str) -> StencilError {
    StencilError::Validation(format!("no element named '{}'", name))
}

fn validate_canvas_size(size: CanvasSize) -> Result<()> {
    if size.width == 0 || size.height == 0 {
        return Err(StencilError::Validation(format!(
            "canvas size must be positive, got {}x{}",
            size.width, size.height
        )));
    }
    Ok(())
}

/// Check the background and name-uniqueness invariants on a stored stack.
pub(crate) fn validate_elements(elements: &[Element]) -> Result<()> {
    match elements.first() {
        Some(first) if first.is_background() => {}
        _ => {
            return Err(StencilError::Validation(format!(
                "'{}' must be the bottom element",
                BACKGROUND
            )));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for el in elements {
        if el.name.trim().is_empty() {
            return Err(StencilError::Validation("element name cannot be empty".into()));
        }
        if !seen.insert(el.name.as_str()) {
            return Err(StencilError::Validation(format!(
                "duplicate element name '{}'",
                el.name
            )));
        }
    }
    Ok(())
}
