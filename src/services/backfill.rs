//! Lazy, idempotent backfill of object metadata.
//!
//! The upload itself happens out-of-band between the client and the
//! backend, so size and content type are unknown at creation time. The
//! first metadata read pays one head call and persists the result; every
//! later read is served from the item row. Two concurrent backfills for the
//! same item may both head and both write; they converge to the same state,
//! so no per-item lock is taken.

use crate::models::item::Item;
use crate::models::object_ref::ObjectRef;
use crate::services::items::{ItemStore, PipelineError};
use crate::services::object_store::{ObjectStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackfillError {
    /// Caller-contract violation, never retried.
    #[error("item `{0}` is not an object-backed file item")]
    NotObjectItem(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Clone)]
pub struct MetadataBackfill {
    store: Arc<dyn ObjectStore>,
    items: Arc<dyn ItemStore>,
}

impl MetadataBackfill {
    pub fn new(store: Arc<dyn ObjectStore>, items: Arc<dyn ItemStore>) -> Self {
        Self { store, items }
    }

    /// Return the item's object metadata, fetching and persisting it on
    /// first demand. Size and content type are written together or not at
    /// all; once present they are returned as-is with zero backend calls.
    pub async fn run(&self, item: &Item) -> Result<ObjectRef, BackfillError> {
        let Some(object_file) = item.object_ref() else {
            return Err(BackfillError::NotObjectItem(item.id));
        };

        if object_file.has_metadata() {
            return Ok(object_file.clone());
        }

        let head = match self.store.head_object(&object_file.key).await {
            Ok(head) => head,
            Err(err) => {
                error!(
                    "failed to fetch object metadata for `{}`: {}",
                    object_file.key, err
                );
                return Err(err.into());
            }
        };

        let mut merged = object_file.clone();
        merged.size = Some(head.size);
        merged.contenttype = Some(head.content_type);

        let mut extra = item.extra.0.clone();
        extra.object_file = Some(merged.clone());
        self.items.update_extra(item.id, &extra).await?;

        Ok(merged)
    }
}
