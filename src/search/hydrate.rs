//! Rehydration of backend id lists into article list projections / 结果回填
//!
//! Backends and the fallback return already-ordered article ids; this module
//! turns them into full response shapes with one author-joined row query and
//! one tag query, then walks the input order (map-then-loop) so the
//! relevance order survives. Ids that no longer resolve are skipped: a hit
//! can race against a delete and must not produce a phantom entry.

use std::collections::HashMap;

use sqlx::{PgPool, SqlitePool};

use crate::db::Database;
use crate::models::{ArticleListResponse, ArticleListRow, TagInfo};

pub async fn hydrate(db: &Database, ids: &[i64]) -> Result<Vec<ArticleListResponse>, sqlx::Error> {
    match db {
        Database::Sqlite(pool) => hydrate_sqlite(pool, ids).await,
        Database::Postgres(pool) => hydrate_postgres(pool, ids).await,
    }
}

pub async fn hydrate_sqlite(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<Vec<ArticleListResponse>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");

    let sql = format!(
        "SELECT a.id, a.title, a.summary, a.status, a.view_count, a.created_at, a.updated_at, \
                u.id AS author_id, u.username, u.full_name, u.role, \
                (SELECT COUNT(*) FROM comment c WHERE c.article_id = a.id) AS comment_count \
         FROM article a \
         JOIN users u ON u.id = a.author_id \
         WHERE a.id IN ({placeholders})"
    );
    let mut query = sqlx::query_as::<_, ArticleListRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    let tag_sql = format!(
        "SELECT at.article_id, t.id, t.name \
         FROM article_tags at \
         JOIN tag t ON t.id = at.tag_id \
         WHERE at.article_id IN ({placeholders}) \
         ORDER BY t.name"
    );
    let mut tag_query = sqlx::query_as::<_, (i64, i64, String)>(&tag_sql);
    for id in ids {
        tag_query = tag_query.bind(id);
    }
    let tag_rows = tag_query.fetch_all(pool).await?;

    Ok(assemble(ids, rows, tag_rows))
}

pub async fn hydrate_postgres(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<ArticleListResponse>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = (1..=ids.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT a.id, a.title, a.summary, a.status, a.view_count, a.created_at, a.updated_at, \
                u.id AS author_id, u.username, u.full_name, u.role, \
                (SELECT COUNT(*) FROM comment c WHERE c.article_id = a.id) AS comment_count \
         FROM article a \
         JOIN users u ON u.id = a.author_id \
         WHERE a.id IN ({placeholders})"
    );
    let mut query = sqlx::query_as::<_, ArticleListRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    let tag_sql = format!(
        "SELECT at.article_id, t.id, t.name \
         FROM article_tags at \
         JOIN tag t ON t.id = at.tag_id \
         WHERE at.article_id IN ({placeholders}) \
         ORDER BY t.name"
    );
    let mut tag_query = sqlx::query_as::<_, (i64, i64, String)>(&tag_sql);
    for id in ids {
        tag_query = tag_query.bind(id);
    }
    let tag_rows = tag_query.fetch_all(pool).await?;

    Ok(assemble(ids, rows, tag_rows))
}

/// Fold the flat rows back into the backend's id order / 按后端顺序组装
fn assemble(
    ids: &[i64],
    rows: Vec<ArticleListRow>,
    tag_rows: Vec<(i64, i64, String)>,
) -> Vec<ArticleListResponse> {
    let mut tags: HashMap<i64, Vec<TagInfo>> = HashMap::new();
    for (article_id, id, name) in tag_rows {
        tags.entry(article_id).or_default().push(TagInfo { id, name });
    }

    let mut by_id: HashMap<i64, ArticleListRow> =
        rows.into_iter().map(|r| (r.id, r)).collect();

    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(row) = by_id.remove(id) {
            let article_tags = tags.remove(id).unwrap_or_default();
            out.push(row.into_response(article_tags));
        }
    }
    out
}
