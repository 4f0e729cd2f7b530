//! Route table for the file-item coordinator.
//!
//! ## Structure
//! - **Item endpoints**
//!   - `POST   /items/uploads` — create an item + signed upload URL
//!   - `GET    /items/{id}` — fetch an item
//!   - `GET    /items/{id}/metadata` — object metadata, backfilled on read
//!   - `POST   /items/{id}/copy` — copy item and backing object
//!   - `DELETE /items/{id}` — delete item, then backing object
//!
//! - **Storage endpoints** (targets of signed URLs)
//!   - `PUT /storage/{*key}` — direct upload, signature-checked
//!   - `GET /storage/{*key}` — stream an object back out
//!
//! The wildcard `*key` covers the sharded keys like `1f2a/9c3d/0b4e-1700000000000`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        item_handlers::{copy_item, create_upload, delete_item, get_item, get_metadata},
        storage_handlers::{get_object, put_object},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router for all coordinator routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // item routes
        .route("/items/uploads", post(create_upload))
        .route("/items/{id}", get(get_item).delete(delete_item))
        .route("/items/{id}/metadata", get(get_metadata))
        .route("/items/{id}/copy", post(copy_item))
        // storage routes backing signed URLs
        .route("/storage/{*key}", put(put_object).get(get_object))
}
