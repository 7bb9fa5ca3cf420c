//! # External Collaborators
//!
//! Interfaces the core consumes but does not own:
//!
//! | Trait | Used for | Implementations |
//! |-------|----------|-----------------|
//! | [`TextGenerator`] | captions, AI-generated tables | [`HttpTextGenerator`] |
//! | [`KeyValueStore`] | brand context, saved content | [`MemoryStore`], [`JsonFileStore`] |
//! | [`ContentCollection`] | saving rendered designs | [`StoreCollection`] |

mod collection;
mod http;
mod store;

pub use collection::{ContentItem, SavedItem, StoreCollection};
pub use http::HttpTextGenerator;
pub use store::{JsonFileStore, MemoryStore};

use async_trait::async_trait;

use crate::error::Result;

/// Store key holding the brand-context string used in prompts.
pub const BRAND_CONTEXT_KEY: &str = "brand_context";

/// Remote text generation.
///
/// Implementations may enforce their own timeout. An empty response is a
/// failure from the core's point of view.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String>;
}

/// Scoped key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Returns whether the value was stored.
    fn set(&self, key: &str, value: serde_json::Value) -> bool;
}

/// Destination for rendered designs the user chose to keep.
#[async_trait]
pub trait ContentCollection: Send + Sync {
    async fn add(&self, item: ContentItem) -> Result<SavedItem>;
}

/// Brand context string from the store, if set and non-empty.
pub fn brand_context(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(BRAND_CONTEXT_KEY)
        .and_then(|v| v.as_str().map(str::trim).map(str::to_string))
        .filter(|s| !s.is_empty())
}
