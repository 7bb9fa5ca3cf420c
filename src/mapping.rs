//! Field mapping: element name → data column.
//!
//! The mapping itself is a plain keyed store. Validation (text elements
//! only, element must exist) and migration on rename/delete live in
//! [`crate::session::BulkCreateSession`], which owns both the document and
//! the mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::Row;
use crate::document::{Element, ElementKind};

/// Partial mapping from element name to column name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: BTreeMap<String, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: impl Into<String>, column: impl Into<String>) {
        self.entries.insert(element.into(), column.into());
    }

    pub fn remove(&mut self, element: &str) -> Option<String> {
        self.entries.remove(element)
    }

    pub fn get(&self, element: &str) -> Option<&str> {
        self.entries.get(element).map(String::as_str)
    }

    /// Move the entry keyed by `old` to `new`, if any.
    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(column) = self.entries.remove(old) {
            self.entries.insert(new.to_string(), column);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Substitute row values into mapped text elements.
    ///
    /// Only `Text` elements change. A mapped column missing from the row
    /// leaves the element's literal content in place, so absent data never
    /// blanks a design.
    pub fn apply(&self, elements: &mut [Element], row: &Row) {
        for el in elements.iter_mut() {
            let Some(column) = self.get(&el.name) else {
                continue;
            };
            match &mut el.kind {
                ElementKind::Text(text) => {
                    if let Some(value) = row.get(column) {
                        text.content = value.to_string();
                    }
                }
                ElementKind::Image(_) | ElementKind::Shape(_) => {}
            }
        }
    }
}
