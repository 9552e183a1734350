//! Substring fallback scan / 子串兜底扫描
//!
//! Availability net under the primary index: a case-insensitive containment
//! scan over title and content of published articles, same filters, same
//! pagination, same response shape, newest first. Used whenever the primary
//! backend fails or returns nothing.

use crate::db::Database;
use crate::models::{ArticleListResponse, STATUS_PUBLISHED};

use super::{hydrate, SearchError};

pub struct FallbackSearch {
    db: Database,
}

impl FallbackSearch {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn search(
        &self,
        query: &str,
        skip: i64,
        limit: i64,
        status: Option<&str>,
        author: Option<&str>,
    ) -> Result<Vec<ArticleListResponse>, SearchError> {
        let status = status.unwrap_or(STATUS_PUBLISHED);

        let ids: Vec<i64> = match &self.db {
            Database::Sqlite(pool) => {
                let pattern = format!("%{}%", query.to_lowercase());
                let mut sql = String::from(
                    "SELECT a.id FROM article a \
                     WHERE a.status = ? AND (lower(a.title) LIKE ? OR lower(a.content) LIKE ?)",
                );
                if author.is_some() {
                    sql.push_str(" AND a.author_id IN (SELECT id FROM users WHERE username = ?)");
                }
                sql.push_str(" ORDER BY a.created_at DESC LIMIT ? OFFSET ?");

                let mut id_query = sqlx::query_scalar::<_, i64>(&sql)
                    .bind(status)
                    .bind(&pattern)
                    .bind(&pattern);
                if let Some(author) = author {
                    id_query = id_query.bind(author);
                }
                id_query.bind(limit).bind(skip).fetch_all(pool).await?
            }
            Database::Postgres(pool) => {
                let pattern = format!("%{}%", query);
                let mut sql = String::from(
                    "SELECT a.id FROM article a \
                     WHERE a.status = $1 AND (a.title ILIKE $2 OR a.content ILIKE $2)",
                );
                let mut next = 3;
                if author.is_some() {
                    sql.push_str(&format!(
                        " AND a.author_id IN (SELECT id FROM users WHERE username = ${next})"
                    ));
                    next += 1;
                }
                sql.push_str(&format!(
                    " ORDER BY a.created_at DESC LIMIT ${} OFFSET ${}",
                    next,
                    next + 1
                ));

                let mut id_query = sqlx::query_scalar::<_, i64>(&sql)
                    .bind(status)
                    .bind(&pattern);
                if let Some(author) = author {
                    id_query = id_query.bind(author);
                }
                id_query.bind(limit).bind(skip).fetch_all(pool).await?
            }
        };

        Ok(hydrate::hydrate(&self.db, &ids).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{STATUS_DRAFT, STATUS_PUBLISHED};
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup() -> (SqlitePool, FallbackSearch, i64) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::sqlite_migrations(&pool).await.unwrap();
        let now = Utc::now();
        let author = sqlx::query(
            "INSERT INTO users (username, password_hash, full_name, role, enabled, created_at, updated_at) \
             VALUES ('erin', 'x', NULL, 'user', 1, ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap()
        .last_insert_rowid();
        let fallback = FallbackSearch::new(Database::Sqlite(pool.clone()));
        (pool, fallback, author)
    }

    async fn insert_article(
        pool: &SqlitePool,
        author: i64,
        title: &str,
        content: &str,
        status: &str,
        age_secs: i64,
    ) -> i64 {
        let ts = Utc::now() - Duration::seconds(age_secs);
        sqlx::query(
            "INSERT INTO article (title, content, summary, status, author_id, view_count, created_at, updated_at) \
             VALUES (?, ?, NULL, ?, ?, 0, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(status)
        .bind(author)
        .bind(ts)
        .bind(ts)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn matches_title_and_content_case_insensitively() {
        let (pool, fallback, author) = setup().await;
        let by_title =
            insert_article(&pool, author, "GraphQL Basics", "queries", STATUS_PUBLISHED, 10).await;
        let by_content =
            insert_article(&pool, author, "API design", "graphql under the hood", STATUS_PUBLISHED, 5).await;
        insert_article(&pool, author, "REST notes", "plain http", STATUS_PUBLISHED, 1).await;

        let hits = fallback.search("GrAphQl", 0, 10, None, None).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        // newest first
        assert_eq!(ids, vec![by_content, by_title]);
    }

    #[tokio::test]
    async fn skips_unpublished_articles() {
        let (pool, fallback, author) = setup().await;
        insert_article(&pool, author, "Hidden gem", "draft body", STATUS_DRAFT, 0).await;

        let hits = fallback.search("gem", 0, 10, None, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn paginates_in_recency_order() {
        let (pool, fallback, author) = setup().await;
        let newest = insert_article(&pool, author, "serde part 3", "x", STATUS_PUBLISHED, 1).await;
        let middle = insert_article(&pool, author, "serde part 2", "x", STATUS_PUBLISHED, 2).await;
        let oldest = insert_article(&pool, author, "serde part 1", "x", STATUS_PUBLISHED, 3).await;

        let first = fallback.search("serde", 0, 2, None, None).await.unwrap();
        let second = fallback.search("serde", 2, 2, None, None).await.unwrap();
        let ids: Vec<i64> = first.iter().chain(second.iter()).map(|h| h.id).collect();
        assert_eq!(ids, vec![newest, middle, oldest]);
    }
}
