pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logger;
pub mod proxy;
pub mod registry;

pub use config::Config;
pub use error::ProxyError;

pub type Result<T> = std::result::Result<T, ProxyError>;

pub mod prelude {
    pub use crate::cache::TtlCache;
    pub use crate::config::Config;
    pub use crate::fetcher::{CalendarFetcher, HttpFetcher};
    pub use crate::proxy::ProxyServer;
    pub use crate::registry::AliasRegistry;
}
