//! Shared handler state: one coordinator instance built from injected
//! pipeline and object-store handles, no process-wide singleton.

use crate::services::backfill::MetadataBackfill;
use crate::services::items::ItemPipeline;
use crate::services::local_store::LocalStore;
use crate::services::upload_intent::UploadIntentService;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub pipeline: ItemPipeline,
    pub backfill: MetadataBackfill,
    pub uploads: UploadIntentService,
    pub local: Arc<LocalStore>,
}
