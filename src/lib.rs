pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod queries;
pub mod rate_limit;
pub mod server;
pub mod service;
pub mod token_bucket;

pub use config::Config;
pub use error::{Error, Result};
pub use server::{create_app, AppState};
