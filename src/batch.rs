//! # Batch Render Engine
//!
//! Renders one full-resolution design per data row.
//!
//! A batch runs against a [`DocumentSnapshot`] taken before the first row, so
//! template edits made while it runs never reach in-flight renders. The
//! export scale is computed once per batch in [`RenderPlan::new`].
//!
//! Rows are processed strictly in order: row *n+1* starts only after row
//! *n*'s render, caption and save steps finish. Between rows the engine
//! waits for the configured throttle, and calls to the text generator are
//! bounded by a semaphore (`max_concurrent_generations`, default 1).
//!
//! A failing row never aborts the batch. It is logged, recorded as a
//! [`RowFailure`] and left out of [`BatchReport::items`].

use image::RgbaImage;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BatchConfig, CaptionFailurePolicy};
use crate::data::{DataTable, Row};
use crate::document::{DocumentSnapshot, Element};
use crate::error::{Result, StencilError};
use crate::mapping::FieldMapping;
use crate::render::{CanvasRenderer, OutputFormat, scale_elements};
use crate::services::{ContentCollection, ContentItem, TextGenerator};

/// Everything needed to render any row of one batch.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    snapshot: DocumentSnapshot,
    mapping: FieldMapping,
    export_scale: f64,
    format: OutputFormat,
    jpeg_quality: u8,
}

impl RenderPlan {
    pub fn new(
        snapshot: DocumentSnapshot,
        mapping: FieldMapping,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Self {
        let export_scale = snapshot.export_scale();
        Self {
            snapshot,
            mapping,
            export_scale,
            format,
            jpeg_quality,
        }
    }

    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    pub fn export_scale(&self) -> f64 {
        self.export_scale
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Element stack for `row` in output pixels, mapped values substituted.
    pub fn elements_for(&self, row: &Row) -> Vec<Element> {
        let mut elements = scale_elements(self.snapshot.elements(), self.export_scale);
        self.mapping.apply(&mut elements, row);
        elements
    }

    /// Rasterize `row` at full canvas resolution.
    pub fn rasterize(&self, renderer: &CanvasRenderer, row: &Row) -> Result<RgbaImage> {
        let size = self.snapshot.canvas_size();
        renderer.rasterize(&self.elements_for(row), size.width, size.height)
    }
}

/// Produces encoded image bytes for one row.
///
/// Runs on the blocking thread pool.
pub trait RowRenderer: Send + Sync {
    fn render_row(&self, plan: &RenderPlan, row: &Row) -> Result<Vec<u8>>;
}

impl RowRenderer for CanvasRenderer {
    fn render_row(&self, plan: &RenderPlan, row: &Row) -> Result<Vec<u8>> {
        let image = plan.rasterize(self, row)?;
        plan.format.encode(&image, plan.jpeg_quality)
    }
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Rows to render, from the top of the table. Must not exceed the row count.
    pub max_items: usize,
    pub format: OutputFormat,
    pub generate_caption: bool,
    pub save_to_collection: bool,
}

impl BatchOptions {
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items,
            format: OutputFormat::default(),
            generate_caption: false,
            save_to_collection: false,
        }
    }
}

/// Reported after each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based index of the row just processed.
    pub current: usize,
    pub total: usize,
    pub succeeded: usize,
}

/// One successfully rendered design.
#[derive(Debug, Clone)]
pub struct RenderedItem {
    pub image: Vec<u8>,
    pub format: OutputFormat,
    pub row: Row,
    pub caption: Option<String>,
    /// `design_<n>.<ext>`, n counting successful items from 1.
    pub filename: String,
}

/// Pipeline step a row failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Render,
    Caption,
}

#[derive(Debug, Clone)]
pub struct RowFailure {
    /// 0-based table row.
    pub index: usize,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub items: Vec<RenderedItem>,
    pub failures: Vec<RowFailure>,
    /// Rows started (less than requested if cancelled).
    pub attempted: usize,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.len()
    }

    pub fn skipped(&self) -> usize {
        self.failures.len()
    }

    /// e.g. "8 of 10 designs rendered (2 skipped)".
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} of {} designs rendered",
            self.succeeded(),
            self.attempted
        );
        if self.skipped() > 0 {
            s.push_str(&format!(" ({} skipped)", self.skipped()));
        }
        if self.cancelled {
            s.push_str(", cancelled");
        }
        s
    }
}

pub struct BatchEngine {
    renderer: Arc<dyn RowRenderer>,
    config: BatchConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    collection: Option<Arc<dyn ContentCollection>>,
    brand_context: Option<String>,
    generation_permits: Arc<Semaphore>,
}

impl BatchEngine {
    pub fn new(renderer: Arc<dyn RowRenderer>, config: BatchConfig) -> Self {
        let permits = config.max_concurrent_generations.max(1);
        Self {
            renderer,
            config,
            generator: None,
            collection: None,
            brand_context: None,
            generation_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_collection(mut self, collection: Arc<dyn ContentCollection>) -> Self {
        self.collection = Some(collection);
        self
    }

    pub fn with_brand_context(mut self, brand: Option<String>) -> Self {
        self.brand_context = brand;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Render the first `options.max_items` rows of `table`.
    ///
    /// Errors only when the batch cannot start (empty table, bad options,
    /// missing collaborator). Per-row failures land in the report.
    pub async fn run<F>(
        &self,
        snapshot: DocumentSnapshot,
        mapping: FieldMapping,
        table: &DataTable,
        options: &BatchOptions,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(BatchProgress) + Send,
    {
        self.check(table, options)?;

        let plan = Arc::new(RenderPlan::new(
            snapshot,
            mapping,
            options.format,
            self.config.jpeg_quality,
        ));
        let total = options.max_items;
        let throttle = self.config.throttle();
        let mut report = BatchReport::default();

        info!(
            rows = total,
            format = %options.format,
            captions = options.generate_caption,
            export_scale = plan.export_scale(),
            revision = plan.snapshot().revision(),
            "batch started"
        );

        for (index, row) in table.rows().iter().take(total).enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                info!(completed = index, total, "batch cancelled");
                break;
            }
            report.attempted += 1;

            match self.process_row(&plan, table, row, options).await {
                Ok((image, caption)) => {
                    let n = report.items.len() + 1;
                    let item = RenderedItem {
                        filename: format!("design_{}.{}", n, options.format.extension()),
                        image,
                        format: options.format,
                        row: row.clone(),
                        caption,
                    };
                    if options.save_to_collection {
                        self.save(&item, n).await;
                    }
                    debug!(row = index, file = %item.filename, "row rendered");
                    report.items.push(item);
                }
                Err((stage, e)) => {
                    warn!(row = index, stage = ?stage, error = %e, "row skipped");
                    report.failures.push(RowFailure {
                        index,
                        stage,
                        message: e.to_string(),
                    });
                }
            }

            on_progress(BatchProgress {
                current: index + 1,
                total,
                succeeded: report.items.len(),
            });

            if index + 1 < total && !throttle.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(throttle) => {}
                }
            }
        }

        info!(
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            cancelled = report.cancelled,
            "batch finished"
        );
        Ok(report)
    }

    fn check(&self, table: &DataTable, options: &BatchOptions) -> Result<()> {
        if table.is_empty() {
            return Err(StencilError::Validation("data table is empty".into()));
        }
        if options.max_items == 0 || options.max_items > table.len() {
            return Err(StencilError::Validation(format!(
                "batch size must be between 1 and {}, got {}",
                table.len(),
                options.max_items
            )));
        }
        if options.generate_caption && self.generator.is_none() {
            return Err(StencilError::Validation(
                "captions requested but no text generator is configured".into(),
            ));
        }
        if options.save_to_collection && self.collection.is_none() {
            return Err(StencilError::Validation(
                "saving requested but no content collection is configured".into(),
            ));
        }
        Ok(())
    }

    async fn process_row(
        &self,
        plan: &Arc<RenderPlan>,
        table: &DataTable,
        row: &Row,
        options: &BatchOptions,
    ) -> std::result::Result<(Vec<u8>, Option<String>), (FailureStage, StencilError)> {
        let renderer = Arc::clone(&self.renderer);
        let task_plan = Arc::clone(plan);
        let task_row = row.clone();
        let image = tokio::task::spawn_blocking(move || renderer.render_row(&task_plan, &task_row))
            .await
            .map_err(|e| StencilError::Render(format!("render task failed: {}", e)))
            .and_then(|r| r)
            .map_err(|e| (FailureStage::Render, e))?;

        if !options.generate_caption {
            return Ok((image, None));
        }
        match self.caption(table, row).await {
            Ok(caption) => Ok((image, Some(caption))),
            Err(e) => match self.config.caption_failure {
                CaptionFailurePolicy::SkipRow => Err((FailureStage::Caption, e)),
                CaptionFailurePolicy::OmitCaption => {
                    warn!(error = %e, "caption failed, keeping design without caption");
                    Ok((image, None))
                }
            },
        }
    }

    async fn caption(&self, table: &DataTable, row: &Row) -> Result<String> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| StencilError::Generation("no text generator configured".into()))?;
        let _permit = self
            .generation_permits
            .acquire()
            .await
            .map_err(|_| StencilError::Generation("generation limiter closed".into()))?;

        let prompt = caption_prompt(table.columns(), row, self.brand_context.as_deref());
        let text = generator.generate_text(&prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(StencilError::Generation("empty caption".into()));
        }
        Ok(text.to_string())
    }

    async fn save(&self, item: &RenderedItem, n: usize) {
        let Some(collection) = &self.collection else {
            return;
        };
        let content = ContentItem {
            title: format!("Bulk design {}", n),
            caption: item.caption.clone(),
            image_data: item.format.data_url(&item.image),
            source: serde_json::to_value(&item.row).unwrap_or_default(),
        };
        if let Err(e) = collection.add(content).await {
            warn!(file = %item.filename, error = %e, "failed to save design to collection");
        }
    }
}

/// Caption prompt built from the row's values in column order.
pub fn caption_prompt(columns: &[String], row: &Row, brand: Option<&str>) -> String {
    let mut prompt =
        String::from("Write a short, engaging social media caption for a design with these details:\n");
    for (column, value) in row.ordered(columns) {
        if !value.trim().is_empty() {
            prompt.push_str(&format!("- {}: {}\n", column, value.trim()));
        }
    }
    if let Some(brand) = brand {
        prompt.push_str(&format!("Brand context: {}\n", brand));
    }
    prompt.push_str("Respond with only the caption text.");
    prompt
}
