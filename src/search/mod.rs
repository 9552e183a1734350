//! Full-text search core / 全文搜索核心
//!
//! Architecture / 架构:
//! - One [`backend::SearchBackend`] contract, two engines: SQLite FTS5 and
//!   PostgreSQL tsvector. The data-store URL decides the binding at startup.
//! - Index consistency comes from database triggers installed by the bound
//!   backend: every article insert/update/delete propagates inside the same
//!   transaction. / 索引一致性由触发器在同一事务内维护
//! - [`service::SearchService`] parses the request, delegates, rehydrates and
//!   degrades to a substring [`fallback::FallbackSearch`] when the primary
//!   index is unavailable or misses. Backend errors never escape to HTTP
//!   handlers for queries.
//! - Call direction: api → service → backend/fallback (unidirectional).
//!   The core only reads articles; it never mutates them. / 调用方向单向

pub mod backend;
pub mod fallback;
pub mod hydrate;
pub mod postgres_tsv;
pub mod service;
pub mod sqlite_fts;
pub mod tokenizer;

pub use backend::{select_backend, SearchBackend};
pub use fallback::FallbackSearch;
pub use service::{SearchIndexStats, SearchService};

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// Search backend failure taxonomy / 搜索错误分类
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("search index unavailable: {0}")]
    IndexUnavailable(String),
}

/// One entry of the popular-terms endpoint / 热门词条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordFrequency {
    pub word: String,
    pub frequency: u64,
}

/// Order-preserving title dedupe used by both backends for suggestions.
/// SQLite rejects DISTINCT combined with ORDER BY rank, so the backends
/// over-fetch and dedupe here. / 保序去重
pub(crate) fn distinct_titles(titles: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(limit);
    for title in titles {
        if seen.insert(title.clone()) {
            out.push(title);
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_titles_preserves_first_occurrence_order() {
        let titles = vec![
            "Hello World".to_string(),
            "Rust Tips".to_string(),
            "Hello World".to_string(),
            "Go Notes".to_string(),
        ];
        assert_eq!(
            distinct_titles(titles, 5),
            vec!["Hello World", "Rust Tips", "Go Notes"]
        );
    }

    #[test]
    fn distinct_titles_respects_limit() {
        let titles = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(distinct_titles(titles, 2).len(), 2);
    }
}
