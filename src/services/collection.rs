//! Content collection backed by a key-value store.
//!
//! Saved items are appended to a JSON array under the `collection` key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{ContentCollection, KeyValueStore};
use crate::error::{Result, StencilError};

/// Store key of the saved-items array.
pub const COLLECTION_KEY: &str = "collection";

/// Item handed to the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    pub caption: Option<String>,
    /// `data:image/...;base64,` URL of the rendered design.
    pub image_data: String,
    /// Row values the design was rendered from.
    #[serde(default)]
    pub source: serde_json::Value,
}

/// Item as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub item: ContentItem,
}

/// [`ContentCollection`] appending to a [`KeyValueStore`].
pub struct StoreCollection {
    store: Arc<dyn KeyValueStore>,
}

impl StoreCollection {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All saved items, oldest first.
    ///
    /// Fails when the stored value is not an array of saved items.
    pub fn items(&self) -> Result<Vec<SavedItem>> {
        match self.store.get(COLLECTION_KEY) {
            None | Some(serde_json::Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                StencilError::Validation(format!(
                    "'{}' in the store is not a saved-item list: {}",
                    COLLECTION_KEY, e
                ))
            }),
        }
    }
}

#[async_trait]
impl ContentCollection for StoreCollection {
    async fn add(&self, item: ContentItem) -> Result<SavedItem> {
        let saved = SavedItem {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            item,
        };
        let mut items = self.items()?;
        items.push(saved.clone());
        if !self.store.set(COLLECTION_KEY, serde_json::to_value(&items)?) {
            return Err(StencilError::Io(std::io::Error::other(
                "content collection could not be persisted",
            )));
        }
        Ok(saved)
    }
}
