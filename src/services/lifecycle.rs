//! Lifecycle interception: keep the blob object in sync with the item row
//! across copy and delete.
//!
//! The two hooks differ deliberately in blocking discipline. The pre-copy
//! hook must complete before the copy proceeds, and its failure aborts the
//! operation: a persisted copy pointing at a key with no backing object is
//! worse than no copy. The post-delete hook runs after the row delete has
//! committed, so its failure is logged and swallowed: a dangling blob is an
//! acceptable state, a misleading error to the caller is not.

use crate::models::item::Item;
use crate::services::items::{
    Actor, COPY_ITEM_OP, DELETE_ITEM_OP, HookRegistry, PostHook, PreHook,
};
use crate::services::keys::KeyGenerator;
use crate::services::object_store::{CopyOptions, ObjectStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

fn audit_tags(actor: &Actor, item_id: uuid::Uuid) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    tags.insert("member".to_string(), actor.id.to_string());
    tags.insert("item".to_string(), item_id.to_string());
    tags
}

/// Duplicates the backing object before a file-item copy is persisted,
/// rewriting the in-flight record onto the fresh key.
pub struct ObjectCopyHook {
    store: Arc<dyn ObjectStore>,
    keys: KeyGenerator,
}

#[async_trait]
impl PreHook for ObjectCopyHook {
    async fn run(&self, item: &mut Item, actor: &Actor) -> anyhow::Result<()> {
        let item_id = item.id;
        let Some(object_file) = item.object_ref() else {
            return Ok(());
        };

        let source_key = object_file.key.clone();
        let content_type = object_file.contenttype.clone();
        let name = object_file.name.clone();
        let dest_key = self.keys.allocate();

        self.store
            .copy_object(
                &source_key,
                &dest_key,
                CopyOptions {
                    content_type,
                    disposition_name: Some(name),
                    tags: audit_tags(actor, item_id),
                },
            )
            .await?;

        // The persisted copy must never point at the source's key.
        if let Some(object_file) = item.object_ref_mut() {
            object_file.key = dest_key;
        }
        Ok(())
    }
}

/// Removes the backing object after a file-item row delete has committed.
pub struct ObjectDeleteHook {
    store: Arc<dyn ObjectStore>,
}

#[async_trait]
impl PostHook for ObjectDeleteHook {
    async fn run(&self, item: &Item, _actor: &Actor) {
        let Some(object_file) = item.object_ref() else {
            return;
        };
        if let Err(err) = self.store.delete_object(&object_file.key).await {
            error!(
                "failed to delete backing object `{}` for item {}: {}",
                object_file.key, item.id, err
            );
        }
    }
}

/// Register both hooks against the pipeline's copy and delete operations.
pub fn register_hooks(registry: &mut HookRegistry, store: Arc<dyn ObjectStore>, keys: KeyGenerator) {
    registry.register_pre(
        COPY_ITEM_OP,
        Arc::new(ObjectCopyHook {
            store: store.clone(),
            keys,
        }),
    );
    registry.register_post(DELETE_ITEM_OP, Arc::new(ObjectDeleteHook { store }));
}
