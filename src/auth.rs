//! Session handling and permission guards / 会话与权限校验

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower_cookies::Cookies;
use uuid::Uuid;

use mohen_blog::db::Database;
use mohen_blog::models::{User, ROLE_ADMIN};

use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Session lifetime / 会话有效期
const SESSION_TTL_HOURS: i64 = 24 * 7;

/// Create a session row and return its id / 创建会话
pub async fn create_session(db: &Database, user_id: i64) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);
    match db {
        Database::Sqlite(pool) => {
            sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(user_id)
                .bind(expires_at)
                .execute(pool)
                .await?;
        }
        Database::Postgres(pool) => {
            sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
                .bind(&id)
                .bind(user_id)
                .bind(expires_at)
                .execute(pool)
                .await?;
        }
    }
    Ok(id)
}

pub async fn delete_session(db: &Database, session_id: &str) -> Result<(), sqlx::Error> {
    match db {
        Database::Sqlite(pool) => {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(session_id)
                .execute(pool)
                .await?;
        }
        Database::Postgres(pool) => {
            sqlx::query("DELETE FROM sessions WHERE id = $1")
                .bind(session_id)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// Resolve the logged-in user from the session cookie / 根据会话Cookie获取当前用户
pub async fn current_user(state: &AppState, cookies: &Cookies) -> Option<User> {
    let session_id = cookies.get(SESSION_COOKIE_NAME)?.value().to_string();

    let session: Option<(i64, DateTime<Utc>)> = match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE id = ?")
                .bind(&session_id)
                .fetch_optional(pool)
                .await
                .ok()?
        }
        Database::Postgres(pool) => {
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE id = $1")
                .bind(&session_id)
                .fetch_optional(pool)
                .await
                .ok()?
        }
    };
    let (user_id, expires_at) = session?;

    if expires_at < Utc::now() {
        let _ = delete_session(&state.db, &session_id).await;
        return None;
    }

    match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND enabled = 1")
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .ok()?
        }
        Database::Postgres(pool) => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND enabled = TRUE")
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .ok()?
        }
    }
}

/// 要求已登录 / Require a logged-in user
pub async fn require_user(
    state: &AppState,
    cookies: &Cookies,
) -> Result<User, (StatusCode, Json<Value>)> {
    current_user(state, cookies)
        .await
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, Json(json!({"error": "未登录"}))))
}

/// 要求管理员权限 / Require the admin role
pub async fn require_admin(
    state: &AppState,
    cookies: &Cookies,
) -> Result<User, (StatusCode, Json<Value>)> {
    let user = require_user(state, cookies).await?;
    if user.role != ROLE_ADMIN {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "需要管理员权限"})),
        ));
    }
    Ok(user)
}
