pub mod app;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod context;
pub mod models;
pub mod utils;

pub use app::{load_config, Config};
pub use cache::{CacheCoordinator, CacheStats, Target, Tier};
pub use context::CodeAnalyzer;
pub use models::Model;
