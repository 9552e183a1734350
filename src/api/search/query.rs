//! 搜索查询接口：全文搜索、标题联想、热门词

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use mohen_blog::models::{is_valid_status, ArticleListResponse};

use crate::state::AppState;

use super::types::{PopularParams, PopularResponse, SearchParams, SuggestParams, SuggestionsResponse};

/// GET /api/search/
///
/// The query service already degrades on its own; the only errors this
/// handler produces are parameter validation failures.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ArticleListResponse>>, (StatusCode, Json<Value>)> {
    if params.skip < 0 || params.limit < 1 || params.limit > 100 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "分页参数无效: skip >= 0, 1 <= limit <= 100"})),
        ));
    }
    if let Some(status) = params.status.as_deref() {
        if !is_valid_status(status) {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "无效的文章状态"})),
            ));
        }
    }

    let hits = state
        .search
        .search(
            &params.q,
            params.skip,
            params.limit,
            params.status.as_deref(),
            params.author.as_deref(),
        )
        .await;
    Ok(Json(hits))
}

/// GET /api/search/suggestions
pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<SuggestionsResponse>, (StatusCode, Json<Value>)> {
    if params.limit < 1 || params.limit > 20 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "limit 取值范围为 1-20"})),
        ));
    }

    let suggestions = state.search.suggest(&params.q, params.limit).await;
    Ok(Json(SuggestionsResponse {
        query: params.q,
        count: suggestions.len(),
        suggestions,
    }))
}

/// GET /api/search/popular
pub async fn popular(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PopularParams>,
) -> Result<Json<PopularResponse>, (StatusCode, Json<Value>)> {
    if params.limit < 1 || params.limit > 50 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "limit 取值范围为 1-50"})),
        ));
    }

    let popular_searches = state.search.popular(params.limit).await;
    Ok(Json(PopularResponse {
        count: popular_searches.len(),
        popular_searches,
    }))
}
