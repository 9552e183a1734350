use serde::{Deserialize, Serialize};

use mohen_blog::search::WordFrequency;

/// 搜索请求参数
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

fn default_search_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    pub q: String,
    #[serde(default = "default_suggest_limit")]
    pub limit: i64,
}

fn default_suggest_limit() -> i64 {
    5
}

#[derive(Debug, Deserialize)]
pub struct PopularParams {
    #[serde(default = "default_popular_limit")]
    pub limit: i64,
}

fn default_popular_limit() -> i64 {
    10
}

/// 联想响应
#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub query: String,
    pub suggestions: Vec<String>,
    pub count: usize,
}

/// 热门词响应
#[derive(Debug, Serialize)]
pub struct PopularResponse {
    pub popular_searches: Vec<WordFrequency>,
    pub count: usize,
}

/// 重建索引响应
#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub message: String,
    pub status: String,
}
