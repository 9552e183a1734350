use mohen_blog::db::Database;
use mohen_blog::search::SearchService;

/// Shared application state / 应用共享状态
///
/// The search service carries the backend binding chosen at startup; it is
/// constructed once in main and injected here.
pub struct AppState {
    pub db: Database,
    pub search: SearchService,
}
