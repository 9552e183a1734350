//! Embedded-engine backend: FTS5 virtual table + triggers / SQLite FTS5 后端
//!
//! Index structure: virtual table `articles_fts` mirroring the article table,
//! with only title/content/summary tokenized. Three triggers keep it in sync
//! inside the article mutation's own transaction, so a committed write is
//! immediately visible to queries on the same database.
//! 三个触发器在同一事务内维护索引

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{ArticleListResponse, STATUS_PUBLISHED};

use super::{distinct_titles, hydrate, tokenizer, SearchBackend, SearchError, WordFrequency};

/// Dropped in order before every install so a partial previous install never
/// blocks `create_index`. / 先删后建，兼容残留结构
const DROP_STATEMENTS: &[&str] = &[
    "DROP TRIGGER IF EXISTS articles_ai",
    "DROP TRIGGER IF EXISTS articles_ad",
    "DROP TRIGGER IF EXISTS articles_au",
    "DROP TABLE IF EXISTS articles_fts",
];

const CREATE_STATEMENTS: &[&str] = &[
    r#"CREATE VIRTUAL TABLE articles_fts USING fts5(
        id UNINDEXED,
        title,
        content,
        summary,
        author_id UNINDEXED,
        status UNINDEXED,
        created_at UNINDEXED,
        updated_at UNINDEXED
    )"#,
    r#"CREATE TRIGGER articles_ai AFTER INSERT ON article BEGIN
        INSERT INTO articles_fts (id, title, content, summary, author_id, status, created_at, updated_at)
        VALUES (new.id, new.title, new.content, new.summary, new.author_id, new.status, new.created_at, new.updated_at);
    END"#,
    r#"CREATE TRIGGER articles_ad AFTER DELETE ON article BEGIN
        DELETE FROM articles_fts WHERE id = old.id;
    END"#,
    r#"CREATE TRIGGER articles_au AFTER UPDATE ON article BEGIN
        UPDATE articles_fts
        SET title = new.title,
            content = new.content,
            summary = new.summary,
            author_id = new.author_id,
            status = new.status,
            created_at = new.created_at,
            updated_at = new.updated_at
        WHERE id = old.id;
    END"#,
];

pub struct SqliteFtsBackend {
    pool: SqlitePool,
}

impl SqliteFtsBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchBackend for SqliteFtsBackend {
    async fn create_index(&self) -> Result<(), SearchError> {
        for stmt in DROP_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        for stmt in CREATE_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        tracing::info!("FTS5 index structures created");
        Ok(())
    }

    async fn drop_index(&self) -> Result<(), SearchError> {
        for stmt in DROP_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        tracing::info!("FTS5 index structures dropped");
        Ok(())
    }

    async fn populate_index(&self) -> Result<u64, SearchError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM articles_fts").execute(&mut *tx).await?;
        let result = sqlx::query(
            "INSERT INTO articles_fts (id, title, content, summary, author_id, status, created_at, updated_at) \
             SELECT id, title, content, summary, author_id, status, created_at, updated_at \
             FROM article WHERE status = ?",
        )
        .bind(STATUS_PUBLISHED)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!("FTS5 index populated: {} articles", result.rows_affected());
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
        // No usable tokens means no round-trip at all
        let Some(match_expr) = tokenizer::build_match_query(query) else {
            return Ok(Vec::new());
        };
        let status = status.unwrap_or(STATUS_PUBLISHED);

        let mut sql = String::from(
            "SELECT articles_fts.id FROM articles_fts \
             JOIN article a ON a.id = articles_fts.id \
             WHERE articles_fts MATCH ? AND a.status = ?",
        );
        if author.is_some() {
            sql.push_str(" AND a.author_id IN (SELECT id FROM users WHERE username = ?)");
        }
        sql.push_str(" ORDER BY rank, a.created_at DESC LIMIT ? OFFSET ?");

        let mut id_query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(&match_expr)
            .bind(status);
        if let Some(author) = author {
            id_query = id_query.bind(author);
        }
        let ids = id_query
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;

        Ok(hydrate::hydrate_sqlite(&self.pool, &ids).await?)
    }

    async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<String>, SearchError> {
        let Some(match_expr) = tokenizer::build_match_query(query) else {
            return Ok(Vec::new());
        };
        // Over-fetch because duplicate titles collapse client-side
        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT title FROM articles_fts \
             WHERE articles_fts MATCH ? AND status = ? \
             ORDER BY rank LIMIT ?",
        )
        .bind(&match_expr)
        .bind(STATUS_PUBLISHED)
        .bind(limit * 10)
        .fetch_all(&self.pool)
        .await?;

        Ok(distinct_titles(titles, limit as usize))
    }

    async fn popular(&self, limit: i64) -> Result<Vec<WordFrequency>, SearchError> {
        let titles: Vec<String> = sqlx::query_scalar("SELECT title FROM article WHERE status = ?")
            .bind(STATUS_PUBLISHED)
            .fetch_all(&self.pool)
            .await?;
        Ok(tokenizer::top_terms(titles, limit as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{STATUS_ARCHIVED, STATUS_DRAFT};
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        // one connection, otherwise every pooled connection sees its own
        // private in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::sqlite_migrations(&pool).await.unwrap();
        pool
    }

    async fn seed_author(pool: &SqlitePool, username: &str) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (username, password_hash, full_name, role, enabled, created_at, updated_at) \
             VALUES (?, 'x', NULL, 'user', 1, ?, ?)",
        )
        .bind(username)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
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

    async fn setup() -> (SqlitePool, SqliteFtsBackend, i64) {
        let pool = memory_pool().await;
        let backend = SqliteFtsBackend::new(pool.clone());
        backend.create_index().await.unwrap();
        let author = seed_author(&pool, "alice").await;
        (pool, backend, author)
    }

    #[tokio::test]
    async fn basic_search_finds_every_match() {
        let (pool, backend, author) = setup().await;
        let a = insert_article(&pool, author, "Introduction to Rust", "intro", STATUS_PUBLISHED, 30).await;
        let b = insert_article(&pool, author, "Advanced Rust Patterns", "patterns", STATUS_PUBLISHED, 20).await;
        let c = insert_article(&pool, author, "Go for Rustaceans", "crossover", STATUS_PUBLISHED, 10).await;

        let hits = backend.search("rust", 0, 10, None, None).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(hits.len(), 3);
        for id in [a, b, c] {
            assert!(ids.contains(&id));
        }
    }

    #[tokio::test]
    async fn prefix_matches_but_short_tokens_do_not() {
        let (pool, backend, author) = setup().await;
        let id = insert_article(
            &pool, author,
            "Kubernetes Scheduler Internals",
            "how pods land on nodes",
            STATUS_PUBLISHED,
            0,
        )
        .await;

        let hits = backend.search("kube", 0, 10, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        // single-char token is dropped before it reaches the engine
        let hits = backend.search("k", 0, 10, None, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn drafts_and_archived_never_surface() {
        let (pool, backend, author) = setup().await;
        let published =
            insert_article(&pool, author, "Release notes", "v1", STATUS_PUBLISHED, 10).await;
        insert_article(&pool, author, "Release notes", "v2 draft", STATUS_DRAFT, 5).await;
        insert_article(&pool, author, "Release notes", "v0 archive", STATUS_ARCHIVED, 20).await;

        let hits = backend.search("release", 0, 10, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, published);
    }

    #[tokio::test]
    async fn delete_propagates_to_the_index() {
        let (pool, backend, author) = setup().await;
        let id = insert_article(&pool, author, "Ephemeral entry", "gone soon", STATUS_PUBLISHED, 0).await;

        let hits = backend.search("ephemeral", 0, 10, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);

        sqlx::query("DELETE FROM article WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let hits = backend.search("ephemeral", 0, 10, None, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn title_update_propagates_to_suggestions() {
        let (pool, backend, author) = setup().await;
        let id = insert_article(&pool, author, "Obsolete heading", "body", STATUS_PUBLISHED, 0).await;

        let suggestions = backend.suggest("obsolete", 5).await.unwrap();
        assert_eq!(suggestions, vec!["Obsolete heading"]);

        sqlx::query("UPDATE article SET title = 'Fresh heading' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(backend.suggest("obsolete", 5).await.unwrap().is_empty());
        assert_eq!(backend.suggest("fresh", 5).await.unwrap(), vec!["Fresh heading"]);
    }

    #[tokio::test]
    async fn duplicate_titles_suggest_once() {
        let (pool, backend, author) = setup().await;
        insert_article(&pool, author, "Hello World", "first", STATUS_PUBLISHED, 10).await;
        insert_article(&pool, author, "Hello World", "second", STATUS_PUBLISHED, 5).await;

        let suggestions = backend.suggest("hello", 5).await.unwrap();
        assert_eq!(suggestions, vec!["Hello World"]);
    }

    #[tokio::test]
    async fn author_filter_restricts_results() {
        let (pool, backend, alice) = setup().await;
        let bob = seed_author(&pool, "bob").await;
        let hers = insert_article(&pool, alice, "Tracing deep dive", "spans", STATUS_PUBLISHED, 10).await;
        insert_article(&pool, bob, "Tracing for beginners", "spans", STATUS_PUBLISHED, 5).await;

        let hits = backend.search("tracing", 0, 10, None, Some("alice")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, hers);
        assert_eq!(hits[0].author.username, "alice");
    }

    #[tokio::test]
    async fn pagination_walks_the_full_result_set() {
        let (pool, backend, author) = setup().await;
        for i in 0..7 {
            insert_article(
                &pool, author,
                &format!("Pagination probe {i}"),
                "walk",
                STATUS_PUBLISHED,
                100 - i,
            )
            .await;
        }

        let all: Vec<i64> = backend
            .search("pagination", 0, 100, None, None)
            .await
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(all.len(), 7);

        let mut paged = Vec::new();
        let mut skip = 0;
        loop {
            let page = backend.search("pagination", skip, 3, None, None).await.unwrap();
            if page.is_empty() {
                break;
            }
            paged.extend(page.iter().map(|h| h.id));
            skip += 3;
        }
        assert_eq!(paged, all);
    }

    #[tokio::test]
    async fn relevance_order_survives_hydration() {
        let (pool, backend, author) = setup().await;
        // heavy title match should outrank a single mention buried in content
        let heavy = insert_article(
            &pool, author,
            "Tokio tokio tokio",
            "all about the runtime",
            STATUS_PUBLISHED,
            10,
        )
        .await;
        let light = insert_article(
            &pool, author,
            "Weekly digest",
            "a long newsletter that mentions tokio exactly once among many other words about other things",
            STATUS_PUBLISHED,
            5,
        )
        .await;

        let hits = backend.search("tokio", 0, 10, None, None).await.unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![heavy, light]);
    }

    #[tokio::test]
    async fn populate_refreshes_from_the_source_table() {
        let pool = memory_pool().await;
        let author = seed_author(&pool, "carol").await;
        // articles written before any index structures existed
        insert_article(&pool, author, "Historic entry", "pre-index", STATUS_PUBLISHED, 20).await;
        insert_article(&pool, author, "Historic draft", "pre-index", STATUS_DRAFT, 10).await;

        let backend = SqliteFtsBackend::new(pool.clone());
        backend.create_index().await.unwrap();
        assert!(backend.search("historic", 0, 10, None, None).await.unwrap().is_empty());

        let count = backend.populate_index().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(backend.search("historic", 0, 10, None, None).await.unwrap().len(), 1);

        // a second populate is a no-op refresh, not a duplication
        let count = backend.populate_index().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(backend.search("historic", 0, 10, None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_and_drop_are_idempotent() {
        let (_pool, backend, _author) = setup().await;
        backend.create_index().await.unwrap();
        backend.create_index().await.unwrap();
        backend.drop_index().await.unwrap();
        backend.drop_index().await.unwrap();
        backend.create_index().await.unwrap();
    }

    #[tokio::test]
    async fn popular_counts_published_titles_only() {
        let (pool, backend, author) = setup().await;
        insert_article(&pool, author, "rust tips, rust tricks", "a", STATUS_PUBLISHED, 30).await;
        insert_article(&pool, author, "go tips", "b", STATUS_PUBLISHED, 20).await;
        insert_article(&pool, author, "rust secrets", "c", STATUS_DRAFT, 10).await;

        let terms = backend.popular(2).await.unwrap();
        assert_eq!(terms[0], WordFrequency { word: "rust".into(), frequency: 2 });
        assert_eq!(terms[1], WordFrequency { word: "tips".into(), frequency: 2 });
    }

    #[tokio::test]
    async fn index_survives_reopening_the_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("blog.db").display());

        {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&url)
                .await
                .unwrap();
            db::sqlite_migrations(&pool).await.unwrap();
            let backend = SqliteFtsBackend::new(pool.clone());
            backend.create_index().await.unwrap();
            let author = seed_author(&pool, "dave").await;
            insert_article(&pool, author, "Persistent entry", "on disk", STATUS_PUBLISHED, 0).await;
            pool.close().await;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        let backend = SqliteFtsBackend::new(pool.clone());
        let hits = backend.search("persistent", 0, 10, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Persistent entry");
    }
}
