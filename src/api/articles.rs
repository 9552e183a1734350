//! 文章与评论接口
//!
//! The search index never needs explicit maintenance here: triggers on the
//! article table (SQLite) or the tsvector column (Postgres) pick up every
//! insert, update and delete made below.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::Cookies;

use mohen_blog::db::Database;
use mohen_blog::models::{
    is_valid_status, Article, ArticleListResponse, User, ROLE_ADMIN, STATUS_DRAFT,
    STATUS_PUBLISHED,
};
use mohen_blog::search::hydrate::hydrate;

use crate::auth::require_user;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub status: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub status: Option<String>,
    pub author_id: Option<i64>,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "服务器错误"})),
    )
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": "文章不存在"})))
}

async fn fetch_article(db: &Database, id: i64) -> Result<Option<Article>, sqlx::Error> {
    match db {
        Database::Sqlite(pool) => {
            sqlx::query_as("SELECT * FROM article WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
        }
        Database::Postgres(pool) => {
            sqlx::query_as("SELECT * FROM article WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
        }
    }
}

/// Replace an article's tag set. Tags are get-or-created by name.
/// 重置文章标签，标签按名称取或建
async fn set_tags(db: &Database, article_id: i64, names: &[String]) -> Result<(), sqlx::Error> {
    match db {
        Database::Sqlite(pool) => {
            let mut tx = pool.begin().await?;
            sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                .bind(article_id)
                .execute(&mut *tx)
                .await?;
            for name in names {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                sqlx::query("INSERT OR IGNORE INTO tag (name) VALUES (?)")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                let (tag_id,): (i64,) = sqlx::query_as("SELECT id FROM tag WHERE name = ?")
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;
                sqlx::query(
                    "INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)",
                )
                .bind(article_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        }
        Database::Postgres(pool) => {
            let mut tx = pool.begin().await?;
            sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
                .bind(article_id)
                .execute(&mut *tx)
                .await?;
            for name in names {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let (tag_id,): (i64,) = sqlx::query_as(
                    "INSERT INTO tag (name) VALUES ($1) \
                     ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
                     RETURNING id",
                )
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
                sqlx::query(
                    "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                )
                .bind(article_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await
        }
    }
}

fn can_edit(user: &User, article: &Article) -> bool {
    user.role == ROLE_ADMIN || user.id == article.author_id
}

pub async fn create_article(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Article>), (StatusCode, Json<Value>)> {
    let user = require_user(&state, &cookies).await?;

    if req.title.trim().is_empty() || req.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "标题和内容不能为空"})),
        ));
    }
    let status = req.status.as_deref().unwrap_or(STATUS_DRAFT);
    if !is_valid_status(status) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "无效的文章状态"})),
        ));
    }

    let article: Article = match &state.db {
        Database::Sqlite(pool) => {
            let result = sqlx::query(
                "INSERT INTO article (title, content, summary, status, author_id) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&req.title)
            .bind(&req.content)
            .bind(&req.summary)
            .bind(status)
            .bind(user.id)
            .execute(pool)
            .await
            .map_err(|_| server_error())?;
            sqlx::query_as("SELECT * FROM article WHERE id = ?")
                .bind(result.last_insert_rowid())
                .fetch_one(pool)
                .await
                .map_err(|_| server_error())?
        }
        Database::Postgres(pool) => sqlx::query_as(
            "INSERT INTO article (title, content, summary, status, author_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.summary)
        .bind(status)
        .bind(user.id)
        .fetch_one(pool)
        .await
        .map_err(|_| server_error())?,
    };

    set_tags(&state.db, article.id, &req.tags)
        .await
        .map_err(|_| server_error())?;

    tracing::info!("文章已创建: id={} by {}", article.id, user.username);
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn update_article(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
    Json(req): Json<UpdateArticleRequest>,
) -> Result<Json<Article>, (StatusCode, Json<Value>)> {
    let user = require_user(&state, &cookies).await?;

    let article = fetch_article(&state.db, id)
        .await
        .map_err(|_| server_error())?
        .ok_or_else(not_found)?;
    if !can_edit(&user, &article) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "无权修改该文章"})),
        ));
    }

    if let Some(status) = req.status.as_deref() {
        if !is_valid_status(status) {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "无效的文章状态"})),
            ));
        }
    }

    let title = req.title.unwrap_or(article.title);
    let content = req.content.unwrap_or(article.content);
    let summary = req.summary.or(article.summary);
    let status = req.status.unwrap_or(article.status);

    let updated: Article = match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query(
                "UPDATE article SET title = ?, content = ?, summary = ?, status = ?, \
                 updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(&title)
            .bind(&content)
            .bind(&summary)
            .bind(&status)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|_| server_error())?;
            sqlx::query_as("SELECT * FROM article WHERE id = ?")
                .bind(id)
                .fetch_one(pool)
                .await
                .map_err(|_| server_error())?
        }
        Database::Postgres(pool) => sqlx::query_as(
            "UPDATE article SET title = $1, content = $2, summary = $3, status = $4, \
             updated_at = NOW() WHERE id = $5 RETURNING *",
        )
        .bind(&title)
        .bind(&content)
        .bind(&summary)
        .bind(&status)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|_| server_error())?,
    };

    if let Some(tags) = &req.tags {
        set_tags(&state.db, id, tags)
            .await
            .map_err(|_| server_error())?;
    }

    Ok(Json(updated))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user = require_user(&state, &cookies).await?;

    let article = fetch_article(&state.db, id)
        .await
        .map_err(|_| server_error())?
        .ok_or_else(not_found)?;
    if !can_edit(&user, &article) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "无权删除该文章"})),
        ));
    }

    match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query("DELETE FROM article WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|_| server_error())?;
        }
        Database::Postgres(pool) => {
            sqlx::query("DELETE FROM article WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(|_| server_error())?;
        }
    }

    tracing::info!("文章已删除: id={}", id);
    Ok(Json(json!({"message": "已删除"})))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Article>, (StatusCode, Json<Value>)> {
    let article = fetch_article(&state.db, id)
        .await
        .map_err(|_| server_error())?
        .ok_or_else(not_found)?;

    // 浏览计数尽力而为，不阻塞响应
    match &state.db {
        Database::Sqlite(pool) => {
            let _ = sqlx::query("UPDATE article SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await;
        }
        Database::Postgres(pool) => {
            let _ = sqlx::query("UPDATE article SET view_count = view_count + 1 WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await;
        }
    }

    Ok(Json(article))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ArticleListResponse>>, (StatusCode, Json<Value>)> {
    if params.skip < 0 || params.limit < 1 || params.limit > 100 {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "分页参数无效: skip >= 0, 1 <= limit <= 100"})),
        ));
    }
    let status = params.status.as_deref().unwrap_or(STATUS_PUBLISHED);
    if !is_valid_status(status) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "无效的文章状态"})),
        ));
    }

    let ids: Vec<(i64,)> = match &state.db {
        Database::Sqlite(pool) => {
            let mut sql = String::from("SELECT id FROM article WHERE status = ?");
            if params.author_id.is_some() {
                sql.push_str(" AND author_id = ?");
            }
            sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
            let mut query = sqlx::query_as(&sql).bind(status);
            if let Some(author_id) = params.author_id {
                query = query.bind(author_id);
            }
            query
                .bind(params.limit)
                .bind(params.skip)
                .fetch_all(pool)
                .await
                .map_err(|_| server_error())?
        }
        Database::Postgres(pool) => {
            let mut sql = String::from("SELECT id FROM article WHERE status = $1");
            let mut n = 1;
            if params.author_id.is_some() {
                n += 1;
                sql.push_str(&format!(" AND author_id = ${n}"));
            }
            sql.push_str(&format!(
                " ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
                n + 1,
                n + 2
            ));
            let mut query = sqlx::query_as(&sql).bind(status);
            if let Some(author_id) = params.author_id {
                query = query.bind(author_id);
            }
            query
                .bind(params.limit)
                .bind(params.skip)
                .fetch_all(pool)
                .await
                .map_err(|_| server_error())?
        }
    };

    let ids: Vec<i64> = ids.into_iter().map(|(id,)| id).collect();
    let list = hydrate(&state.db, &ids).await.map_err(|_| server_error())?;
    Ok(Json(list))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Path(id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let user = require_user(&state, &cookies).await?;

    if req.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "评论内容不能为空"})),
        ));
    }

    fetch_article(&state.db, id)
        .await
        .map_err(|_| server_error())?
        .ok_or_else(not_found)?;

    match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query("INSERT INTO comment (article_id, author_id, content) VALUES (?, ?, ?)")
                .bind(id)
                .bind(user.id)
                .bind(&req.content)
                .execute(pool)
                .await
                .map_err(|_| server_error())?;
        }
        Database::Postgres(pool) => {
            sqlx::query("INSERT INTO comment (article_id, author_id, content) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(user.id)
                .bind(&req.content)
                .execute(pool)
                .await
                .map_err(|_| server_error())?;
        }
    }

    Ok((StatusCode::CREATED, Json(json!({"message": "评论已发布"}))))
}
