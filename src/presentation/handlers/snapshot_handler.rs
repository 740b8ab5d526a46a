// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::providers::brightdata::{self, BrightDataClient, SnapshotState};

/// 快照调试查询参数
#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// 要匹配的Prompt文本
    pub prompt: Option<String>,
}

/// 快照调试透传
///
/// 直连供应商快照存储，返回与指定Prompt匹配的单个条目
pub async fn get_snapshot_data(
    Path(snapshot_id): Path<String>,
    Query(query): Query<SnapshotQuery>,
    Extension(client): Extension<Arc<BrightDataClient>>,
) -> impl IntoResponse {
    match client.fetch_snapshot(&snapshot_id).await {
        Ok(SnapshotState::Ready(entries)) => {
            let matching = match &query.prompt {
                Some(prompt) => entries.into_iter().find(|entry| {
                    brightdata::entry_prompt_text(entry)
                        .map(|text| text.trim() == prompt.trim())
                        .unwrap_or(false)
                }),
                None => entries.into_iter().next(),
            };

            match matching {
                Some(entry) => (StatusCode::OK, Json(entry)).into_response(),
                None => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "success": false, "error": "no matching entry" })),
                )
                    .into_response(),
            }
        }
        Ok(SnapshotState::Running) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "snapshot still running" })),
        )
            .into_response(),
        Err(e) => {
            error!("Snapshot passthrough failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
