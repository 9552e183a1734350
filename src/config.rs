//! Application configuration module / 应用配置模块
//!
//! Loaded from config.json, created with defaults on first run.
//! The database URL decides which search backend gets bound at startup;
//! `DATABASE_URL` overrides the file value. / 首次运行时创建默认配置文件

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Global configuration instance / 全局配置实例
static CONFIG: OnceCell<Arc<RwLock<AppConfig>>> = OnceCell::new();

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    pub database: DatabaseConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data-store URL. `sqlite:` selects the embedded engine (FTS5 search),
    /// `postgres:` the server engine (tsvector search). / 数据库URL，协议决定搜索后端
    pub url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8360,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:data/mohen.db?mode=rwc".to_string(),
        }
    }
}

impl AppConfig {
    /// Bind address for the HTTP listener / HTTP监听地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Effective database URL, DATABASE_URL wins / 生效的数据库URL
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.database.url.clone())
    }
}

/// Load configuration from config.json, writing defaults when missing / 加载配置
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = Path::new("config.json");
    let cfg = if path.exists() {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)?
    } else {
        let cfg = AppConfig::default();
        std::fs::write(path, serde_json::to_string_pretty(&cfg)?)?;
        tracing::info!("Created default config file: config.json");
        cfg
    };
    CONFIG.get_or_init(|| Arc::new(RwLock::new(cfg.clone())));
    Ok(cfg)
}

/// Current configuration snapshot / 当前配置快照
pub fn config() -> AppConfig {
    CONFIG
        .get()
        .map(|c| c.read().clone())
        .unwrap_or_default()
}
