pub mod cache;
pub mod config;

pub use cache::CacheState;
pub use config::Config;
