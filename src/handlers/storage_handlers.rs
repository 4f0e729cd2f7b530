//! HTTP handlers for the disk-backed storage routes that honor signed
//! upload URLs. Bodies are streamed, never buffered whole.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct SignedPutQuery {
    pub expires: i64,
    #[serde(default)]
    pub member: String,
    #[serde(default)]
    pub item: String,
    pub signature: String,
}

/// `PUT /storage/{*key}` — accept a direct upload against a signed URL.
pub async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedPutQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    state.local.verify_put_signature(
        &key,
        query.expires,
        &query.member,
        &query.item,
        &query.signature,
    )?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let mut tags = HashMap::new();
    if !query.member.is_empty() {
        tags.insert("member".to_string(), query.member.clone());
    }
    if !query.item.is_empty() {
        tags.insert("item".to_string(), query.item.clone());
    }

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    state
        .local
        .put_object_stream(&key, content_type, tags, stream)
        .await?;

    Ok(StatusCode::OK)
}

/// `GET /storage/{*key}` — stream an object back out.
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (head, file) = state.local.get_object_reader(&key).await?;
    let stream = ReaderStream::new(file);

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&head.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&head.size.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}
