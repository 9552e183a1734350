//! Server-engine backend: tsvector column + GIN index / PostgreSQL tsvector 后端
//!
//! A `tsv` column on the article table holds the tokenized projection of
//! title/content/summary; a row trigger recomputes it on insert and update,
//! deletes need nothing. Queries go through `plainto_tsquery` with the
//! `simple` configuration (the same one the trigger uses), ordered newest
//! first: the engine offers no cheap relevance score here and that is an
//! accepted limitation. / tsv列由触发器维护，查询按时间倒序

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{ArticleListResponse, STATUS_PUBLISHED};

use super::{distinct_titles, hydrate, tokenizer, SearchBackend, SearchError, WordFrequency};

const DROP_STATEMENTS: &[&str] = &[
    "DROP TRIGGER IF EXISTS article_tsv_update ON article",
    "DROP FUNCTION IF EXISTS update_article_tsvector()",
    "DROP INDEX IF EXISTS idx_article_tsv",
    "ALTER TABLE article DROP COLUMN IF EXISTS tsv",
];

const CREATE_STATEMENTS: &[&str] = &[
    "ALTER TABLE article ADD COLUMN IF NOT EXISTS tsv tsvector",
    r#"CREATE OR REPLACE FUNCTION update_article_tsvector() RETURNS trigger AS $$
BEGIN
    NEW.tsv := to_tsvector('simple',
        coalesce(NEW.title, '') || ' ' || coalesce(NEW.content, '') || ' ' || coalesce(NEW.summary, ''));
    RETURN NEW;
END
$$ LANGUAGE plpgsql"#,
    "DROP TRIGGER IF EXISTS article_tsv_update ON article",
    r#"CREATE TRIGGER article_tsv_update
        BEFORE INSERT OR UPDATE ON article
        FOR EACH ROW EXECUTE FUNCTION update_article_tsvector()"#,
    "CREATE INDEX IF NOT EXISTS idx_article_tsv ON article USING GIN (tsv)",
];

pub struct PostgresTsvBackend {
    pool: PgPool,
}

impl PostgresTsvBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchBackend for PostgresTsvBackend {
    async fn create_index(&self) -> Result<(), SearchError> {
        for stmt in CREATE_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        tracing::info!("tsvector index structures created");
        Ok(())
    }

    async fn drop_index(&self) -> Result<(), SearchError> {
        // trigger first, the function cannot be dropped while it is referenced
        for stmt in DROP_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        tracing::info!("tsvector index structures dropped");
        Ok(())
    }

    async fn populate_index(&self) -> Result<u64, SearchError> {
        // a no-op write re-fires the tsv trigger on every existing row
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE article SET title = title")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!("tsvector index populated: {} articles", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn search(
        &self,
        query: &str,
        skip: i64,
        limit: i64,
        status: Option<&str>,
        author: Option<&str>,
    ) -> Result<Vec<ArticleListResponse>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let status = status.unwrap_or(STATUS_PUBLISHED);

        // the raw query goes straight to plainto_tsquery, no client-side tokenization
        let mut sql = String::from(
            "SELECT a.id FROM article a \
             WHERE a.tsv @@ plainto_tsquery('simple', $1) AND a.status = $2",
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

        let mut id_query = sqlx::query_scalar::<_, i64>(&sql).bind(query).bind(status);
        if let Some(author) = author {
            id_query = id_query.bind(author);
        }
        let ids = id_query
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        Ok(hydrate::hydrate_postgres(&self.pool, &ids).await?)
    }

    async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<String>, SearchError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT title FROM article \
             WHERE tsv @@ plainto_tsquery('simple', $1) AND status = $2 \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(query)
        .bind(STATUS_PUBLISHED)
        .bind(limit * 10)
        .fetch_all(&self.pool)
        .await?;

        Ok(distinct_titles(titles, limit as usize))
    }

    async fn popular(&self, limit: i64) -> Result<Vec<WordFrequency>, SearchError> {
        let titles: Vec<String> = sqlx::query_scalar("SELECT title FROM article WHERE status = $1")
            .bind(STATUS_PUBLISHED)
            .fetch_all(&self.pool)
            .await?;
        Ok(tokenizer::top_terms(titles, limit as usize))
    }
}
