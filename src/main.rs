use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod state;

use mohen_blog::config;
use mohen_blog::db::{self, Database};
use mohen_blog::search::{select_backend, SearchService};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mohen_blog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let app_config = config::load_config()?;
    tracing::info!(
        "Server will listen on {}:{}",
        app_config.server.host,
        app_config.server.port
    );

    let database_url = app_config.database_url();

    // SQLite needs the data directory before the first connection / SQLite需要先创建数据目录
    if database_url.starts_with("sqlite:") {
        let data_dir = std::path::Path::new("data");
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)?;
            tracing::info!("Created data directory: {:?}", data_dir);
        }
    }

    let database = Database::connect(&database_url).await?;
    db::run_migrations(&database).await?;

    // Bind the search backend matching the configured engine / 按数据库引擎选择搜索后端
    let backend = select_backend(&database);
    let search = SearchService::new(backend, database.clone());

    // A failed index build must not keep the server down; searches degrade
    // to the substring fallback until an admin re-runs /api/search/init.
    match search.initialize().await {
        Ok(count) => tracing::info!("搜索索引就绪, 已索引 {} 篇文章", count),
        Err(e) => tracing::warn!("搜索索引初始化失败, 将使用兜底搜索: {}", e),
    }

    let state = Arc::new(AppState {
        db: database,
        search,
    });

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        .route("/api/auth/register", post(api::auth::register))
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/me", get(api::auth::me))
        .route("/api/articles", get(api::articles::list_articles))
        .route("/api/articles", post(api::articles::create_article))
        .route("/api/articles/:id", get(api::articles::get_article))
        .route("/api/articles/:id", put(api::articles::update_article))
        .route("/api/articles/:id", delete(api::articles::delete_article))
        .route(
            "/api/articles/:id/comments",
            post(api::articles::create_comment),
        )
        .route("/api/search/", get(api::search::query::search))
        .route(
            "/api/search/suggestions",
            get(api::search::query::suggestions),
        )
        .route("/api/search/popular", get(api::search::query::popular))
        .route("/api/search/init", post(api::search::admin::init_index))
        .route("/api/search/stats", get(api::search::admin::index_stats))
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
