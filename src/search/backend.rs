//! Engine interface and backend selection / 引擎接口与后端绑定

use async_trait::async_trait;
use std::sync::Arc;

use crate::db::Database;
use crate::models::ArticleListResponse;

use super::postgres_tsv::PostgresTsvBackend;
use super::sqlite_fts::SqliteFtsBackend;
use super::{SearchError, WordFrequency};

/// Contract every search backend satisfies. / 搜索后端统一契约
///
/// Backends are constructed with their typed connection pool; callers inject
/// them, there is no global singleton, and tests plug in fakes. `search`
/// returns already-shaped responses so nothing engine-specific leaks upward.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Install every structure needed to keep the index synchronized with
    /// the article table. Recovers from partial installs. / 安装索引结构
    async fn create_index(&self) -> Result<(), SearchError>;

    /// Remove the index structures; succeeds even when only some of them
    /// exist. / 移除索引结构
    async fn drop_index(&self) -> Result<(), SearchError>;

    /// Refresh the index from the published articles, clearing stale
    /// entries first. Returns how many rows were touched. / 从源表重建索引
    async fn populate_index(&self) -> Result<u64, SearchError>;

    /// Relevance-ordered search (ties broken by newest first). `status`
    /// defaults to published; `author` filters by username. / 相关度排序搜索
    async fn search(
        &self,
        query: &str,
        skip: i64,
        limit: i64,
        status: Option<&str>,
        author: Option<&str>,
    ) -> Result<Vec<ArticleListResponse>, SearchError>;

    /// Up to `limit` distinct matching titles for autocomplete. / 标题联想
    async fn suggest(&self, query: &str, limit: i64) -> Result<Vec<String>, SearchError>;

    /// Most frequent title terms of published articles. / 热门词
    async fn popular(&self, limit: i64) -> Result<Vec<WordFrequency>, SearchError>;
}

/// Bind the concrete backend for the connected engine. Called once at
/// startup; the binding never changes for the lifetime of the process.
/// 启动时绑定一次，进程内不再切换
pub fn select_backend(db: &Database) -> Arc<dyn SearchBackend> {
    match db {
        Database::Sqlite(pool) => {
            tracing::info!("Search backend: SQLite FTS5");
            Arc::new(SqliteFtsBackend::new(pool.clone()))
        }
        Database::Postgres(pool) => {
            tracing::info!("Search backend: PostgreSQL tsvector");
            Arc::new(PostgresTsvBackend::new(pool.clone()))
        }
    }
}
