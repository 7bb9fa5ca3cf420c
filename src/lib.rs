//! # Stencil - Template-Driven Batch Image Generation
//!
//! Stencil binds rows of tabular data to a canvas template and renders one
//! image per row. It provides:
//!
//! - **Canvas documents**: named text, image and shape elements over a background
//! - **Data import**: CSV, spreadsheets, manual grids and AI-generated tables
//! - **Field mapping**: element name → column, substituted at render time
//! - **Preview and batch rendering**: one transform from edit space to output pixels
//! - **Export**: ZIP archives of designs plus caption files
//!
//! ## Quick Start
//!
//! ```no_run
//! use stencil::{
//!     batch::BatchOptions,
//!     config::Config,
//!     export,
//!     session::BulkCreateSession,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), stencil::StencilError> {
//! let mut session = BulkCreateSession::new(Config::default());
//! session.import_csv("headline\nSpring sale\nNew arrivals\n")?;
//! session.set_mapping("Title", Some("headline"))?;
//!
//! let engine = session.batch_engine();
//! let report = session
//!     .run_batch(&engine, &BatchOptions::new(2), &CancellationToken::new(), |p| {
//!         println!("{}/{}", p.current, p.total);
//!     })
//!     .await?;
//!
//! std::fs::write("designs.zip", export::package(&report.items)?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`document`] | Canvas document model, snapshots, template files |
//! | [`data`] | Data table and import modes |
//! | [`mapping`] | Field mapping |
//! | [`render`] | Rasterizer and encoders |
//! | [`preview`] | Preview renderer |
//! | [`batch`] | Batch render engine |
//! | [`export`] | ZIP packaging |
//! | [`services`] | Text generation, key-value store, content collection |
//! | [`session`] | Editing session tying it all together |
//! | [`config`] | Configuration |
//! | [`error`] | Error types |

pub mod batch;
pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod export;
pub mod mapping;
pub mod preview;
pub mod render;
pub mod services;
pub mod session;

// Re-exports for convenience
pub use config::Config;
pub use error::StencilError;
pub use session::BulkCreateSession;
