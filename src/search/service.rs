//! Query service: delegation, fallback policy, index lifecycle / 查询服务
//!
//! The one place that decides between the primary backend and the substring
//! fallback. Query operations never surface backend errors to their callers;
//! `initialize` does, so the admin endpoint can report a clear failure.

use std::sync::Arc;

use serde::Serialize;

use crate::db::Database;
use crate::models::{ArticleListResponse, STATUS_PUBLISHED};

use super::backend::SearchBackend;
use super::fallback::FallbackSearch;
use super::{SearchError, WordFrequency};

/// Hard caps for the auxiliary endpoints / 辅助接口上限
const SUGGEST_LIMIT_MAX: i64 = 20;
const POPULAR_LIMIT_MAX: i64 = 50;

/// Index health snapshot for operators / 索引健康度
#[derive(Debug, Clone, Serialize)]
pub struct SearchIndexStats {
    pub fts_indexed_articles: i64,
    pub total_published_articles: i64,
    pub index_coverage: f64,
}

pub struct SearchService {
    backend: Arc<dyn SearchBackend>,
    fallback: FallbackSearch,
    db: Database,
}

impl SearchService {
    pub fn new(backend: Arc<dyn SearchBackend>, db: Database) -> Self {
        Self {
            backend,
            fallback: FallbackSearch::new(db.clone()),
            db,
        }
    }

    /// Search with graceful degradation: an empty or failing primary result
    /// consults the fallback; a failing fallback yields an empty list, never
    /// an error. / 主查询失败或无命中时走兜底
    pub async fn search(
        &self,
        query: &str,
        skip: i64,
        limit: i64,
        status: Option<&str>,
        author: Option<&str>,
    ) -> Vec<ArticleListResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.backend.search(query, skip, limit, status, author).await {
            Ok(hits) if !hits.is_empty() => return hits,
            Ok(_) => tracing::debug!("Primary search empty, trying fallback: {}", query),
            Err(e) => tracing::warn!("Primary search failed, trying fallback: {}", e),
        }

        match self.fallback.search(query, skip, limit, status, author).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Fallback search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Title autocomplete; backend errors degrade to nothing / 标题联想
    pub async fn suggest(&self, query: &str, limit: i64) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let limit = limit.clamp(1, SUGGEST_LIMIT_MAX);
        match self.backend.suggest(query, limit).await {
            Ok(titles) => titles,
            Err(e) => {
                tracing::warn!("Suggestions failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Most frequent title terms / 热门词
    pub async fn popular(&self, limit: i64) -> Vec<WordFrequency> {
        let limit = limit.clamp(1, POPULAR_LIMIT_MAX);
        match self.backend.popular(limit).await {
            Ok(terms) => terms,
            Err(e) => {
                tracing::warn!("Popular terms failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Drop, recreate and repopulate the index. Returns the indexed article
    /// count. Errors propagate: the admin endpoint reports them, startup
    /// wraps this call with a warning instead. / 重建索引
    pub async fn initialize(&self) -> Result<u64, SearchError> {
        if let Err(e) = self.backend.drop_index().await {
            // create_index re-drops stale leftovers itself
            tracing::warn!("Dropping index structures failed: {}", e);
        }
        self.backend.create_index().await?;
        self.backend.populate_index().await
    }

    /// Coverage = indexed / published; a missing index reads as zero
    /// coverage instead of an error. / 覆盖率统计
    pub async fn stats(&self) -> SearchIndexStats {
        let published = match self.published_count().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Published-article count failed: {}", e);
                0
            }
        };
        let indexed = match self.indexed_count().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Indexed-article count failed: {}", e);
                0
            }
        };
        let coverage = if published > 0 {
            indexed as f64 / published as f64
        } else {
            0.0
        };
        SearchIndexStats {
            fts_indexed_articles: indexed,
            total_published_articles: published,
            index_coverage: coverage,
        }
    }

    async fn published_count(&self) -> Result<i64, sqlx::Error> {
        match &self.db {
            Database::Sqlite(pool) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM article WHERE status = ?")
                    .bind(STATUS_PUBLISHED)
                    .fetch_one(pool)
                    .await
            }
            Database::Postgres(pool) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM article WHERE status = $1")
                    .bind(STATUS_PUBLISHED)
                    .fetch_one(pool)
                    .await
            }
        }
    }

    async fn indexed_count(&self) -> Result<i64, sqlx::Error> {
        match &self.db {
            Database::Sqlite(pool) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM articles_fts WHERE status = ?")
                    .bind(STATUS_PUBLISHED)
                    .fetch_one(pool)
                    .await
            }
            Database::Postgres(pool) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM article WHERE tsv IS NOT NULL AND status = $1",
                )
                .bind(STATUS_PUBLISHED)
                .fetch_one(pool)
                .await
            }
        }
    }
}
