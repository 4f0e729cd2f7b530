//! HTTP handlers for file items: upload intents, lazy metadata, and the
//! generic get/copy/delete operations the lifecycle hooks ride on.

use crate::{errors::AppError, models::object_ref::ObjectRef, services::items::Actor, state::AppState};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::item::Item;

/// Caller identity, resolved by the fronting auth layer into a header.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    headers
        .get("x-member-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .map(|id| Actor { id })
        .ok_or_else(|| AppError::bad_request("missing or invalid x-member-id header"))
}

#[derive(Debug, Deserialize)]
pub struct ParentQuery {
    #[serde(rename = "parentId")]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UploadBody {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadIntentResponse {
    pub item: Item,
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}

/// `POST /items/uploads?parentId=` — allocate a key, create the item and
/// hand back a signed upload URL. The bytes travel out-of-band.
pub async fn create_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ParentQuery>,
    Json(body): Json<UploadBody>,
) -> Result<Json<UploadIntentResponse>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let Some(filename) = body.filename.filter(|name| !name.is_empty()) else {
        return Err(AppError::bad_request("missing `filename` in body"));
    };

    let intent = state
        .uploads
        .create_upload_intent(&actor, query.parent_id, &filename)
        .await?;

    Ok(Json(UploadIntentResponse {
        item: intent.item,
        upload_url: intent.upload_url,
    }))
}

/// `GET /items/{id}/metadata` — the item's merged object metadata,
/// backfilled from the store on first read.
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ObjectRef>, AppError> {
    let item = state.pipeline.get_item(id).await?;
    let object_file = state.backfill.run(&item).await?;
    Ok(Json(object_file))
}

/// `GET /items/{id}`
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, AppError> {
    Ok(Json(state.pipeline.get_item(id).await?))
}

/// `POST /items/{id}/copy?parentId=` — full copy with a new id; the
/// pre-copy hook duplicates the backing object onto a fresh key first.
pub async fn copy_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<ParentQuery>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let copy = state.pipeline.copy_item(&actor, id, query.parent_id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// `DELETE /items/{id}` — delete the row, then best-effort removal of the
/// backing object. Store failures never surface here: the delete already
/// committed.
pub async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, AppError> {
    let actor = actor_from_headers(&headers)?;
    Ok(Json(state.pipeline.delete_item(&actor, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::routes::routes;
    use crate::services::backfill::MetadataBackfill;
    use crate::services::items::testing::memory_pool;
    use crate::services::items::{HookRegistry, ItemPipeline, SqliteItemStore};
    use crate::services::keys::KeyGenerator;
    use crate::services::local_store::LocalStore;
    use crate::services::object_store::ObjectStore;
    use crate::services::object_store::testing::MemoryStore;
    use crate::services::upload_intent::{DEFAULT_UPLOAD_EXPIRY_SECS, UploadIntentService};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let db = memory_pool().await;
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let items = Arc::new(SqliteItemStore::new(db.clone()));
        let pipeline = ItemPipeline::new(items.clone(), Arc::new(HookRegistry::default()));
        let backfill = MetadataBackfill::new(store.clone(), items);
        let uploads = UploadIntentService::new(
            pipeline.clone(),
            store,
            KeyGenerator,
            DEFAULT_UPLOAD_EXPIRY_SECS,
        );
        let local = Arc::new(LocalStore::new(
            std::env::temp_dir().join(format!("object-items-test-{}", Uuid::new_v4())),
            "http://localhost:3000",
            "test-key-id",
            "test-secret",
        ));
        AppState {
            db,
            pipeline,
            backfill,
            uploads,
            local,
        }
    }

    fn upload_request(member_header: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/items/uploads")
            .header("content-type", "application/json");
        if let Some(member) = member_header {
            builder = builder.header("x-member-id", member);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn upload_without_filename_is_a_bad_request() {
        let app = routes().with_state(test_state().await);
        let member = Uuid::new_v4().to_string();

        let response = app.oneshot(upload_request(Some(&member), "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_with_empty_filename_is_a_bad_request() {
        let app = routes().with_state(test_state().await);
        let member = Uuid::new_v4().to_string();

        let response = app
            .oneshot(upload_request(Some(&member), r#"{"filename":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_member_header_is_a_bad_request() {
        let app = routes().with_state(test_state().await);

        let response = app
            .oneshot(upload_request(None, r#"{"filename":"report.pdf"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_member_header_is_a_bad_request() {
        let app = routes().with_state(test_state().await);

        let response = app
            .oneshot(upload_request(Some("not-a-uuid"), r#"{"filename":"report.pdf"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_upload_intent_succeeds() {
        let app = routes().with_state(test_state().await);
        let member = Uuid::new_v4().to_string();

        let response = app
            .oneshot(upload_request(Some(&member), r#"{"filename":"report.pdf"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
