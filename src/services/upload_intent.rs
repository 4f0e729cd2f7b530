//! Upload intents: allocate a key, create the item row, sign an upload URL.
//!
//! The service never observes the upload itself. The signed URL is handed
//! to the caller, the bytes travel straight to the backend, and the object
//! is only confirmed lazily by the metadata backfill on first read.

use crate::models::item::{FILE_ITEM_TYPE, Item, ItemExtra};
use crate::models::object_ref::ObjectRef;
use crate::services::items::{Actor, ItemPipeline, PipelineError};
use crate::services::keys::KeyGenerator;
use crate::services::object_store::{ObjectStore, SignPutOptions, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Display names are capped independently of the allocated key.
pub const FILENAME_TRUNCATE_LIMIT: usize = 100;

pub const DEFAULT_UPLOAD_EXPIRY_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum UploadIntentError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The created item together with the signed URL the caller uploads to.
#[derive(Debug)]
pub struct UploadIntent {
    pub item: Item,
    pub upload_url: String,
}

#[derive(Clone)]
pub struct UploadIntentService {
    pipeline: ItemPipeline,
    store: Arc<dyn ObjectStore>,
    keys: KeyGenerator,
    expiry_secs: u64,
}

impl UploadIntentService {
    pub fn new(
        pipeline: ItemPipeline,
        store: Arc<dyn ObjectStore>,
        keys: KeyGenerator,
        expiry_secs: u64,
    ) -> Self {
        Self {
            pipeline,
            store,
            keys,
            expiry_secs,
        }
    }

    /// Create the item record and mint a bounded-expiry signed PUT URL for
    /// its freshly allocated key, tagged with caller and item identifiers.
    ///
    /// If item creation fails, no URL is requested (no orphaned key). If
    /// signing fails after creation, the row persists with metadata absent;
    /// the caller is expected to retry the whole intent, not resume.
    pub async fn create_upload_intent(
        &self,
        actor: &Actor,
        parent_id: Option<Uuid>,
        filename: &str,
    ) -> Result<UploadIntent, UploadIntentError> {
        let name: String = filename.chars().take(FILENAME_TRUNCATE_LIMIT).collect();
        let key = self.keys.allocate();

        let extra = ItemExtra::with_object_file(ObjectRef::new(&name, &key));
        let item = self
            .pipeline
            .create_item(actor, &name, FILE_ITEM_TYPE, parent_id, extra)
            .await?;

        let mut tags = HashMap::new();
        tags.insert("member".to_string(), actor.id.to_string());
        tags.insert("item".to_string(), item.id.to_string());

        let upload_url = match self
            .store
            .sign_put_url(
                &key,
                SignPutOptions {
                    expiry_secs: self.expiry_secs,
                    tags,
                },
            )
            .await
        {
            Ok(url) => url,
            Err(err) => {
                error!("failed to sign upload url for `{}`: {}", key, err);
                return Err(err.into());
            }
        };

        Ok(UploadIntent { item, upload_url })
    }
}
