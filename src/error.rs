//! # Error Types
//!
//! This module defines error types used throughout the stencil library.
//!
//! Validation and import errors surface immediately to the caller. Per-row
//! render and caption failures inside a batch are recorded in the batch
//! report instead (see [`crate::batch::BatchReport`]).

use thiserror::Error;

/// Main error type for stencil operations
#[derive(Debug, Error)]
pub enum StencilError {
    /// Caller violated a documented invariant (duplicate name, reserved name, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row index outside the data table
    #[error("Row {index} out of range (table has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    /// Malformed or empty input data; the data table is left unchanged
    #[error("Import error: {0}")]
    Import(String),

    /// Text generation collaborator failed or returned unusable content
    #[error("Generation error: {0}")]
    Generation(String),

    /// Nothing to export, or archive assembly failed
    #[error("Packaging error: {0}")]
    Packaging(String),

    /// Rasterizing or encoding a single design failed
    #[error("Render error: {0}")]
    Render(String),

    /// Image decoding error (embedded image sources)
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StencilError {
    /// True for errors caused by the caller breaking an invariant.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StencilError::Validation(_) | StencilError::RowOutOfRange { .. }
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, StencilError>;
