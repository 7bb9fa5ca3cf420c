//! # Bulk Create Session
//!
//! [`BulkCreateSession`] owns one editing session: the template document,
//! the imported data table, the field mapping, the selected element and the
//! clipboard. Every operation goes through it, so state that spans those
//! pieces (a rename migrating its mapping entry, a delete clearing the
//! selection) is kept consistent in one place.
//!
//! ```
//! use stencil::config::Config;
//! use stencil::session::BulkCreateSession;
//!
//! let mut session = BulkCreateSession::new(Config::default());
//! session.import_csv("headline\nHello World\n").unwrap();
//! session.set_mapping("Title", Some("headline")).unwrap();
//!
//! let frame = session.render_preview(0).unwrap().unwrap();
//! assert_eq!(frame.text_of("Title"), Some("Hello World"));
//! ```

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::batch::{BatchEngine, BatchOptions, BatchProgress, BatchReport};
use crate::config::Config;
use crate::data::{self, DataTable, TableRequest};
use crate::document::{
    CanvasDocument, CanvasSize, DocumentSnapshot, Element, ElementPatch, NewElement, TemplateFile,
    ZDirection,
};
use crate::error::{Result, StencilError};
use crate::mapping::FieldMapping;
use crate::preview::{self, PreviewFrame};
use crate::render::{CanvasRenderer, FontBook};
use crate::services::TextGenerator;

pub struct BulkCreateSession {
    config: Config,
    renderer: CanvasRenderer,
    document: CanvasDocument,
    table: DataTable,
    mapping: FieldMapping,
    selection: Option<String>,
    clipboard: Option<Element>,
}

impl BulkCreateSession {
    /// Session with the default template and the bitmap font only.
    pub fn new(config: Config) -> Self {
        Self::with_renderer(config, CanvasRenderer::default())
    }

    /// Session whose renderer uses the fonts listed in `config.fonts`.
    pub fn with_fonts(config: Config) -> Result<Self> {
        let fonts = FontBook::load(&config.fonts)?;
        Ok(Self::with_renderer(config, CanvasRenderer::new(Arc::new(fonts))))
    }

    pub fn with_renderer(config: Config, renderer: CanvasRenderer) -> Self {
        let document = CanvasDocument::with_defaults(CanvasSize::default(), config.edit_surface);
        Self {
            config,
            renderer,
            document,
            table: DataTable::default(),
            mapping: FieldMapping::new(),
            selection: None,
            clipboard: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn renderer(&self) -> &CanvasRenderer {
        &self.renderer
    }

    pub fn document(&self) -> &CanvasDocument {
        &self.document
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.document.snapshot()
    }

    // ----- elements -----

    /// Add an element on top and select it.
    pub fn add_element(&mut self, new: NewElement) -> Result<String> {
        let name = self.document.add_element(new)?;
        self.selection = Some(name.clone());
        Ok(name)
    }

    /// Delete an element with its mapping entry. The background is ignored.
    ///
    /// Returns whether anything was removed.
    pub fn delete_element(&mut self, name: &str) -> bool {
        if self.document.delete_element(name).is_none() {
            return false;
        }
        self.mapping.remove(name);
        if self.selection.as_deref() == Some(name) {
            self.selection = None;
        }
        true
    }

    /// Rename an element, moving its mapping entry and selection along.
    pub fn rename_element(&mut self, name: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(StencilError::Validation("element name cannot be empty".into()));
        }
        self.document.rename_element(name, new_name)?;
        self.mapping.rename(name, new_name);
        if self.selection.as_deref() == Some(name) {
            self.selection = Some(new_name.to_string());
        }
        debug!(from = %name, to = %new_name, "renamed element");
        Ok(())
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.document.set_canvas_size(width, height)
    }

    pub fn reorder(&mut self, name: &str, direction: ZDirection) -> Result<bool> {
        self.document.reorder(name, direction)
    }

    pub fn patch_element(&mut self, name: &str, patch: &ElementPatch) -> Result<()> {
        self.document.patch_element(name, patch)
    }

    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.document.contains(name) {
            return Err(StencilError::Validation(format!("no element named '{}'", name)));
        }
        self.selection = Some(name.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Copy an element to the clipboard.
    pub fn copy(&mut self, name: &str) -> Result<()> {
        let element = self
            .document
            .element(name)
            .ok_or_else(|| StencilError::Validation(format!("no element named '{}'", name)))?;
        if element.is_background() {
            return Err(StencilError::Validation(
                "the background element cannot be copied".into(),
            ));
        }
        self.clipboard = Some(element.clone());
        Ok(())
    }

    /// Paste the clipboard as a new, selected element.
    pub fn paste(&mut self) -> Result<String> {
        let element = self
            .clipboard
            .as_ref()
            .ok_or_else(|| StencilError::Validation("clipboard is empty".into()))?;
        let name = self.document.paste(element)?;
        self.selection = Some(name.clone());
        Ok(name)
    }

    // ----- mapping -----

    pub fn mapping_candidates(&self) -> Vec<&str> {
        self.document.mapping_candidates()
    }

    /// Bind `element` to `column`, or unbind it with `None`.
    ///
    /// Only text elements can be bound. When a table is loaded the column
    /// must be one of its columns.
    pub fn set_mapping(&mut self, element: &str, column: Option<&str>) -> Result<()> {
        let Some(column) = column.map(str::trim).filter(|c| !c.is_empty()) else {
            self.mapping.remove(element);
            return Ok(());
        };
        let el = self
            .document
            .element(element)
            .ok_or_else(|| StencilError::Validation(format!("no element named '{}'", element)))?;
        if el.is_background() || !el.kind.is_text() {
            return Err(StencilError::Validation(format!(
                "only text elements can be mapped; '{}' is {}",
                element,
                el.kind.label()
            )));
        }
        if !self.table.columns().is_empty() && !self.table.columns().iter().any(|c| c == column) {
            return Err(StencilError::Validation(format!(
                "unknown column '{}'",
                column
            )));
        }
        self.mapping.insert(element, column);
        Ok(())
    }

    // ----- data import -----

    fn replace_table(&mut self, table: DataTable, source: &str) {
        info!(
            source,
            columns = table.columns().len(),
            rows = table.len(),
            "data table replaced"
        );
        self.table = table;
    }

    pub fn import_csv(&mut self, content: &str) -> Result<()> {
        let table = data::csv::parse_csv(content)?;
        self.replace_table(table, "csv");
        Ok(())
    }

    pub fn import_csv_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let table = data::csv::parse_csv_bytes(bytes)?;
        self.replace_table(table, "csv");
        Ok(())
    }

    pub fn import_spreadsheet(&mut self, bytes: &[u8]) -> Result<()> {
        let table = data::spreadsheet::parse_spreadsheet(bytes)?;
        self.replace_table(table, "spreadsheet");
        Ok(())
    }

    /// Import a file, choosing the parser from its extension.
    pub fn import_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => self.import_spreadsheet(&bytes),
            _ => self.import_csv_bytes(&bytes),
        }
    }

    pub fn import_manual(&mut self, columns: Vec<String>, grid: Vec<Vec<String>>) -> Result<()> {
        let table = DataTable::from_manual(columns, grid)?;
        self.replace_table(table, "manual");
        Ok(())
    }

    /// Replace the table with AI-generated rows. The current table survives
    /// any failure.
    pub async fn generate_table(
        &mut self,
        generator: &dyn TextGenerator,
        request: &TableRequest,
        brand: Option<&str>,
    ) -> Result<()> {
        let table = data::generate::generate_table(generator, request, brand).await?;
        self.replace_table(table, "generated");
        Ok(())
    }

    // ----- rendering -----

    /// Render row `row_index` at preview size. `Ok(None)` when no data is loaded.
    pub fn render_preview(&self, row_index: usize) -> Result<Option<PreviewFrame>> {
        preview::render_preview(
            &self.renderer,
            &self.snapshot(),
            &self.table,
            &self.mapping,
            row_index,
            self.config.preview_budget,
        )
    }

    /// Engine over this session's renderer and batch config.
    pub fn batch_engine(&self) -> BatchEngine {
        BatchEngine::new(Arc::new(self.renderer.clone()), self.config.batch.clone())
    }

    /// Run a batch over a snapshot of the current template and mapping.
    pub async fn run_batch<F>(
        &self,
        engine: &BatchEngine,
        options: &BatchOptions,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(BatchProgress) + Send,
    {
        engine
            .run(
                self.snapshot(),
                self.mapping.clone(),
                &self.table,
                options,
                cancel,
                on_progress,
            )
            .await
    }

    // ----- templates -----

    pub fn template(&self) -> TemplateFile {
        TemplateFile::capture(&self.document, &self.mapping)
    }

    /// Replace document and mapping from a template. Selection and
    /// clipboard are cleared; the data table is kept.
    pub fn apply_template(&mut self, template: TemplateFile) -> Result<()> {
        let (document, mapping) = template.restore(self.config.edit_surface)?;
        self.document = document;
        self.mapping = mapping;
        self.selection = None;
        self.clipboard = None;
        Ok(())
    }

    pub fn save_template(&self, path: &Path) -> Result<()> {
        self.template().write(path)?;
        info!(path = %path.display(), "template saved");
        Ok(())
    }

    pub fn load_template(&mut self, path: &Path) -> Result<()> {
        let template = TemplateFile::read(path)?;
        self.apply_template(template)?;
        info!(path = %path.display(), "template loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BACKGROUND, ElementKind, ShapeProps, TextProps};
    use crate::document::ElementMeta;
    use pretty_assertions::assert_eq;

    fn session() -> BulkCreateSession {
        let mut s = BulkCreateSession::new(Config::default());
        s.import_csv("headline,cta\nHello,Buy\nBye,Go\n").unwrap();
        s
    }

    #[test]
    fn rename_migrates_mapping_and_selection() {
        let mut s = session();
        s.set_mapping("Title", Some("headline")).unwrap();
        s.select("Title").unwrap();
        s.rename_element("Title", "Headline").unwrap();
        assert_eq!(s.mapping().get("Headline"), Some("headline"));
        assert_eq!(s.mapping().get("Title"), None);
        assert_eq!(s.selection(), Some("Headline"));
    }

    #[test]
    fn rename_collision_changes_nothing() {
        let mut s = session();
        s.set_mapping("Title", Some("headline")).unwrap();
        let err = s.rename_element("Title", "Subtitle").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(s.mapping().get("Title"), Some("headline"));
        assert!(s.rename_element("Title", "  ").unwrap_err().is_validation());
    }

    #[test]
    fn delete_removes_mapping_and_selection() {
        let mut s = session();
        s.set_mapping("Subtitle", Some("cta")).unwrap();
        s.select("Subtitle").unwrap();
        assert!(s.delete_element("Subtitle"));
        assert_eq!(s.mapping().get("Subtitle"), None);
        assert_eq!(s.selection(), None);
        assert!(!s.delete_element(BACKGROUND));
        assert!(s.document().contains(BACKGROUND));
    }

    #[test]
    fn mapping_rejects_non_text_and_unknown_columns() {
        let mut s = session();
        let shape = s
            .add_element(NewElement::new(ElementKind::Shape(ShapeProps::editor_default())))
            .unwrap();
        assert!(s.set_mapping(&shape, Some("headline")).unwrap_err().is_validation());
        assert!(s.set_mapping(BACKGROUND, Some("headline")).unwrap_err().is_validation());
        assert!(s.set_mapping("Title", Some("nope")).unwrap_err().is_validation());
        assert!(s.set_mapping("Ghost", Some("headline")).unwrap_err().is_validation());
        s.set_mapping("Title", Some("headline")).unwrap();
        s.set_mapping("Title", None).unwrap();
        assert!(s.mapping().is_empty());
        assert_eq!(s.mapping_candidates(), vec!["Title", "Subtitle"]);
    }

    #[test]
    fn failed_import_keeps_previous_table() {
        let mut s = session();
        let before = s.table().clone();
        assert!(s.import_csv("a,b\n ,\n").is_err());
        assert!(s.import_manual(vec!["".into()], vec![vec!["x".into()]]).is_err());
        assert_eq!(s.table(), &before);
        s.import_manual(vec!["x".into()], vec![vec!["1".into()], vec!["".into()]])
            .unwrap();
        assert_eq!(s.table().len(), 1);
    }

    #[test]
    fn copy_paste_selects_offset_copy() {
        let mut s = session();
        s.copy("Title").unwrap();
        let first = s.paste().unwrap();
        let second = s.paste().unwrap();
        assert_eq!(first, "Title_copy");
        assert_eq!(second, "Title_copy_2");
        assert_eq!(s.selection(), Some("Title_copy_2"));
        let original = s.document().element("Title").unwrap().position;
        let copy = s.document().element("Title_copy").unwrap().position;
        assert_eq!(copy.x, original.x + crate::document::PASTE_OFFSET);
        assert!(s.copy(BACKGROUND).unwrap_err().is_validation());
    }

    #[test]
    fn paste_with_empty_clipboard_fails() {
        let mut s = session();
        assert!(s.paste().unwrap_err().is_validation());
    }

    #[test]
    fn preview_uses_mapping_and_fallback() {
        let mut s = BulkCreateSession::new(Config::default());
        s.import_manual(
            vec!["headline".into(), "other".into()],
            vec![vec!["Hello World".into(), "x".into()]],
        )
        .unwrap();
        s.set_mapping("Title", Some("headline")).unwrap();
        s.set_mapping("Subtitle", Some("other")).unwrap();
        let frame = s.render_preview(0).unwrap().unwrap();
        assert_eq!(frame.text_of("Title"), Some("Hello World"));
        assert_eq!(frame.text_of("Subtitle"), Some("x"));
        assert!(s.render_preview(1).unwrap_err().is_validation());
    }

    #[test]
    fn template_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let mut s = session();
        s.add_element(NewElement::new(ElementKind::Text(TextProps::editor_default())).named("Price"))
            .unwrap();
        s.set_mapping("Price", Some("cta")).unwrap();
        s.set_canvas_size(1200, 628).unwrap();
        s.save_template(&path).unwrap();

        let mut fresh = BulkCreateSession::new(Config::default());
        fresh.load_template(&path).unwrap();
        assert_eq!(fresh.document().elements(), s.document().elements());
        assert_eq!(fresh.document().canvas_size(), CanvasSize::new(1200, 628));
        assert_eq!(fresh.mapping(), s.mapping());
        assert_eq!(fresh.selection(), None);
    }

    #[tokio::test]
    async fn batch_runs_over_session_state() {
        let mut s = session();
        s.set_mapping("Title", Some("headline")).unwrap();
        let engine = BatchEngine::new(
            Arc::new(s.renderer().clone()),
            crate::config::BatchConfig {
                throttle_ms: 0,
                ..Default::default()
            },
        );
        let report = s
            .run_batch(&engine, &BatchOptions::new(2), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.items[1].row.get("headline"), Some("Bye"));
        let decoded = image::load_from_memory(&report.items[0].image).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1080));
    }
}
