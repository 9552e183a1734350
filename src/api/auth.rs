//! 注册 / 登录 / 登出 / 当前用户

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

use mohen_blog::db::Database;
use mohen_blog::models::{User, ROLE_USER};

use crate::auth::{create_session, delete_session, require_user, SESSION_COOKIE_NAME};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "服务器错误"})),
    )
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if req.username.trim().is_empty() || req.password.len() < 6 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "用户名不能为空，密码至少6位"})),
        ));
    }

    let existing: Option<(i64,)> = match &state.db {
        Database::Sqlite(pool) => sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(&req.username)
            .fetch_optional(pool)
            .await
            .map_err(|_| server_error())?,
        Database::Postgres(pool) => sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(&req.username)
            .fetch_optional(pool)
            .await
            .map_err(|_| server_error())?,
    };
    if existing.is_some() {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({"error": "用户名已被占用"})),
        ));
    }

    let password_hash =
        bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|_| server_error())?;

    let user: User = match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query("INSERT INTO users (username, password_hash, full_name, role) VALUES (?, ?, ?, ?)")
                .bind(&req.username)
                .bind(&password_hash)
                .bind(&req.full_name)
                .bind(ROLE_USER)
                .execute(pool)
                .await
                .map_err(|_| server_error())?;
            sqlx::query_as("SELECT * FROM users WHERE username = ?")
                .bind(&req.username)
                .fetch_one(pool)
                .await
                .map_err(|_| server_error())?
        }
        Database::Postgres(pool) => {
            sqlx::query_as(
                "INSERT INTO users (username, password_hash, full_name, role) VALUES ($1, $2, $3, $4) RETURNING *",
            )
            .bind(&req.username)
            .bind(&password_hash)
            .bind(&req.full_name)
            .bind(ROLE_USER)
            .fetch_one(pool)
            .await
            .map_err(|_| server_error())?
        }
    };

    tracing::info!("新用户注册: {}", user.username);
    Ok(Json(json!({ "user": user })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user: Option<User> = match &state.db {
        Database::Sqlite(pool) => {
            sqlx::query_as("SELECT * FROM users WHERE username = ? AND enabled = 1")
                .bind(&req.username)
                .fetch_optional(pool)
                .await
                .map_err(|_| server_error())?
        }
        Database::Postgres(pool) => {
            sqlx::query_as("SELECT * FROM users WHERE username = $1 AND enabled = TRUE")
                .bind(&req.username)
                .fetch_optional(pool)
                .await
                .map_err(|_| server_error())?
        }
    };

    let user = user.ok_or((
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "账号或密码错误"})),
    ))?;

    let valid = bcrypt::verify(&req.password, &user.password_hash).map_err(|_| server_error())?;
    if !valid {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "账号或密码错误"})),
        ));
    }

    let session_id = create_session(&state.db, user.id)
        .await
        .map_err(|_| server_error())?;

    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, session_id);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    Ok(Json(json!({ "user": user })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Value>, StatusCode> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) {
        let _ = delete_session(&state.db, cookie.value()).await;
    }

    // 必须设置相同的 path 才能正确删除 cookie
    let mut removal_cookie = Cookie::new(SESSION_COOKIE_NAME, "");
    removal_cookie.set_path("/");
    cookies.remove(removal_cookie);

    Ok(Json(json!({"message": "已登出"})))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let user = require_user(&state, &cookies).await?;
    Ok(Json(json!({ "user": user })))
}
