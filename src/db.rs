//! Database connection and migrations / 数据库连接与迁移
//!
//! Supports two engines behind one handle: embedded SQLite and server
//! PostgreSQL. The URL scheme decides the engine, and later which search
//! backend gets bound. / URL协议决定引擎与搜索后端

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{PgPool, SqlitePool};

use crate::models::ROLE_ADMIN;

/// Engine family of the active connection / 当前连接的引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite,
    Postgres,
}

/// Connection handle over either engine / 双引擎连接句柄
#[derive(Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

impl Database {
    /// Connect by URL. Unknown schemes are fatal: the search backend binding
    /// depends on knowing the engine. / 根据URL连接，未知协议直接报错
    pub async fn connect(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            let pool = SqlitePoolOptions::new()
                .max_connections(8)
                .connect(url)
                .await?;
            // WAL + busy timeout, same tuning as a single-node deployment needs
            sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
            sqlx::query("PRAGMA busy_timeout=5000").execute(&pool).await?;
            sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;
            tracing::info!("Connected to SQLite database (WAL mode)");
            Ok(Database::Sqlite(pool))
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            let pool = PgPoolOptions::new()
                .max_connections(8)
                .connect(url)
                .await?;
            tracing::info!("Connected to PostgreSQL database");
            Ok(Database::Postgres(pool))
        } else {
            anyhow::bail!("unsupported database URL scheme: {}", url)
        }
    }

    pub fn kind(&self) -> DbKind {
        match self {
            Database::Sqlite(_) => DbKind::Sqlite,
            Database::Postgres(_) => DbKind::Postgres,
        }
    }

    pub fn sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Database::Sqlite(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn postgres(&self) -> Option<&PgPool> {
        match self {
            Database::Postgres(pool) => Some(pool),
            _ => None,
        }
    }
}

/// Generate random password / 生成随机密码
fn generate_random_password(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%^&*";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Run migrations for the connected engine and seed the first admin
/// account. / 运行迁移并初始化管理员账号
pub async fn run_migrations(db: &Database) -> Result<()> {
    match db {
        Database::Sqlite(pool) => sqlite_migrations(pool).await?,
        Database::Postgres(pool) => postgres_migrations(pool).await?,
    }
    seed_admin(db).await?;
    Ok(())
}

/// Table definitions for the embedded engine. The search index structures
/// (articles_fts and its triggers) are installed separately by the search
/// backend. / SQLite表结构，搜索索引由搜索后端单独安装
pub async fn sqlite_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            summary TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            author_id INTEGER NOT NULL REFERENCES users(id),
            view_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_article_status ON article(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_tags (
            article_id INTEGER NOT NULL REFERENCES article(id),
            tag_id INTEGER NOT NULL REFERENCES tag(id),
            PRIMARY KEY (article_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comment (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL REFERENCES article(id),
            author_id INTEGER NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Table definitions for the server engine. The tsv column, its trigger and
/// GIN index are installed by the search backend. / PostgreSQL表结构
pub async fn postgres_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            full_name TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article (
            id BIGSERIAL PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            summary TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            author_id BIGINT NOT NULL REFERENCES users(id),
            view_count BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_article_status ON article(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_tags (
            article_id BIGINT NOT NULL REFERENCES article(id),
            tag_id BIGINT NOT NULL REFERENCES tag(id),
            PRIMARY KEY (article_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comment (
            id BIGSERIAL PRIMARY KEY,
            article_id BIGINT NOT NULL REFERENCES article(id),
            author_id BIGINT NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id),
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the default admin account on an empty user table / 首次运行时创建管理员账号
async fn seed_admin(db: &Database) -> Result<()> {
    let user_count: i64 = match db {
        Database::Sqlite(pool) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await?
        }
        Database::Postgres(pool) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await?
        }
    };
    if user_count > 0 {
        return Ok(());
    }

    let admin_password = generate_random_password(16);
    let password_hash = bcrypt::hash(&admin_password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now();

    match db {
        Database::Sqlite(pool) => {
            sqlx::query(
                "INSERT INTO users (username, password_hash, full_name, role, enabled, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, 1, ?, ?)",
            )
            .bind("admin")
            .bind(&password_hash)
            .bind("Administrator")
            .bind(ROLE_ADMIN)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
        }
        Database::Postgres(pool) => {
            sqlx::query(
                "INSERT INTO users (username, password_hash, full_name, role, enabled, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, TRUE, $5, $6)",
            )
            .bind("admin")
            .bind(&password_hash)
            .bind("Administrator")
            .bind(ROLE_ADMIN)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
        }
    }

    tracing::info!("============================================================");
    tracing::info!("Default admin account created:");
    tracing::info!("  Username: admin");
    tracing::info!("  Password: {}", admin_password);
    tracing::info!("WARNING: Please save the password and change it after login!");
    tracing::info!("============================================================");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn sqlite_migrations_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlite_migrations(&pool).await.unwrap();
        sqlite_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn seed_admin_runs_once() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlite_migrations(&pool).await.unwrap();
        let db = Database::Sqlite(pool.clone());
        seed_admin(&db).await.unwrap();
        seed_admin(&db).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let err = Database::connect("mysql://localhost/blog").await;
        assert!(err.is_err());
    }
}
