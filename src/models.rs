//! Data models / 数据模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Article lifecycle states. Lowercase everywhere, including inside the
/// search index structures. / 文章状态，统一小写
pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PUBLISHED: &str = "published";
pub const STATUS_ARCHIVED: &str = "archived";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Returns true for a known article status value / 是否为合法文章状态
pub fn is_valid_status(status: &str) -> bool {
    matches!(status, STATUS_DRAFT | STATUS_PUBLISHED | STATUS_ARCHIVED)
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub status: String,
    pub author_id: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author projection embedded in list responses / 作者摘要
#[derive(Debug, Clone, Serialize)]
pub struct AuthorInfo {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: String,
}

/// Tag projection / 标签摘要
#[derive(Debug, Clone, Serialize)]
pub struct TagInfo {
    pub id: i64,
    pub name: String,
}

/// The shape every search hit and article listing rehydrates into.
/// 搜索命中与文章列表共用的投影
#[derive(Debug, Clone, Serialize)]
pub struct ArticleListResponse {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub status: String,
    pub author: AuthorInfo,
    pub tags: Vec<TagInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub view_count: i64,
    pub comment_count: i64,
}

/// Flat row produced by the hydration query; folded into
/// [`ArticleListResponse`] together with the tag rows.
#[derive(Debug, Clone, FromRow)]
pub struct ArticleListRow {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub status: String,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    pub comment_count: i64,
}

impl ArticleListRow {
    pub fn into_response(self, tags: Vec<TagInfo>) -> ArticleListResponse {
        ArticleListResponse {
            id: self.id,
            title: self.title,
            summary: self.summary,
            status: self.status,
            author: AuthorInfo {
                id: self.author_id,
                username: self.username,
                full_name: self.full_name,
                role: self.role,
            },
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            view_count: self.view_count,
            comment_count: self.comment_count,
        }
    }
}
