//! Template save/load.
//!
//! A template file holds the canvas document and its field mapping (never
//! the data table):
//!
//! ```json
//! {
//!   "version": 1,
//!   "canvasSize": {"width": 1080, "height": 1080},
//!   "editSurface": {"width": 500, "height": 500},
//!   "elements": [ ... ],
//!   "mappings": {"Title": "headline"}
//! }
//! ```
//!
//! `editSurface` is stored so coordinates load back exactly even when the
//! loading side uses a different surface budget. Files written before the
//! field existed are refitted with the loader's budget.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use super::types::{CanvasSize, Element};
use super::{CanvasDocument, SurfaceBudget};
use crate::error::{Result, StencilError};
use crate::mapping::FieldMapping;

/// Current template format version.
pub const TEMPLATE_VERSION: u32 = 1;

/// Serialized template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFile {
    #[serde(default = "default_version")]
    pub version: u32,
    pub canvas_size: CanvasSize,
    #[serde(default)]
    pub edit_surface: Option<CanvasSize>,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    TEMPLATE_VERSION
}

impl TemplateFile {
    /// Capture a document and its mapping.
    pub fn capture(doc: &CanvasDocument, mapping: &FieldMapping) -> Self {
        Self {
            version: TEMPLATE_VERSION,
            canvas_size: doc.canvas_size(),
            edit_surface: Some(doc.edit_surface()),
            elements: doc.elements().to_vec(),
            mappings: mapping
                .iter()
                .map(|(el, col)| (el.to_string(), col.to_string()))
                .collect(),
        }
    }

    /// Rebuild the document and mapping.
    ///
    /// Mapping entries that point at missing or non-text elements are
    /// dropped with a warning rather than failing the load.
    pub fn restore(self, budget: SurfaceBudget) -> Result<(CanvasDocument, FieldMapping)> {
        if self.version > TEMPLATE_VERSION {
            return Err(StencilError::Import(format!(
                "template version {} is newer than supported version {}",
                self.version, TEMPLATE_VERSION
            )));
        }
        let surface = self
            .edit_surface
            .unwrap_or_else(|| budget.fit(self.canvas_size));
        let doc = CanvasDocument::from_parts(self.canvas_size, surface, budget, self.elements)?;

        let mut mapping = FieldMapping::new();
        for (element, column) in self.mappings {
            match doc.element(&element) {
                Some(el) if el.kind.is_text() && !el.is_background() => {
                    mapping.insert(element, column);
                }
                _ => warn!(
                    element = %element,
                    column = %column,
                    "dropping mapping for missing or non-text element"
                ),
            }
        }
        Ok((doc, mapping))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StencilError::Import(format!("invalid template: {}", e)))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
