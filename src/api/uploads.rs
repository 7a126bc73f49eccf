//! Asset upload endpoint.

use axum::{
    body::Bytes,
    extract::{Query, State},
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::assets::{AssetUpload, AssetUploader};
use crate::models::ImageRef;
use crate::AppState;

/// Upload query parameters.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original file name; its extension decides the stored type.
    pub filename: String,
}

/// POST /api/uploads - Store raw image bytes and return a durable reference.
pub async fn upload_asset(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<ImageRef> {
    let image = state
        .assets
        .upload(AssetUpload::new(query.filename, body.to_vec()))
        .await?;
    success(image)
}
