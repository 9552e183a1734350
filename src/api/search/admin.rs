//! 搜索索引管理接口（仅管理员）

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use mohen_blog::search::SearchIndexStats;

use crate::auth::require_admin;
use crate::state::AppState;

use super::types::InitResponse;

/// POST /api/search/init — 重建并回填索引
///
/// Rebuild failures come back in the payload with status "error" rather
/// than a 5xx, so the operator sees the underlying message.
pub async fn init_index(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<InitResponse>, (StatusCode, Json<Value>)> {
    require_admin(&state, &cookies).await?;

    match state.search.initialize().await {
        Ok(count) => {
            tracing::info!("搜索索引重建完成, 共索引 {} 篇文章", count);
            Ok(Json(InitResponse {
                message: format!("索引重建完成，已索引 {count} 篇文章"),
                status: "completed".to_string(),
            }))
        }
        Err(e) => {
            tracing::error!("搜索索引重建失败: {}", e);
            Ok(Json(InitResponse {
                message: format!("索引重建失败: {e}"),
                status: "error".to_string(),
            }))
        }
    }
}

/// GET /api/search/stats — 索引覆盖率
pub async fn index_stats(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<SearchIndexStats>, (StatusCode, Json<Value>)> {
    require_admin(&state, &cookies).await?;
    Ok(Json(state.search.stats().await))
}
