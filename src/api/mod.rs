pub mod articles;
pub mod auth;
pub mod search;
pub mod server;
