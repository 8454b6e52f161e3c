// reqtrail - HTTP request/response logging middleware
//
// Logs each request and its response through a configurable sink, warns on
// slow responses, and optionally keeps a pruned audit table of requests.

// Re-export core functionality
pub use reqtrail_core::*;

// Re-export member crates
pub use reqtrail_audit;
pub use reqtrail_cache;
pub use reqtrail_config;

pub use reqtrail_audit::{
    AuditRow, AuditStore, LogSink, MemorySink, MemoryStore, RequestLogError,
    RequestLoggingMiddleware, TracingSink,
};
#[cfg(feature = "sqlite")]
pub use reqtrail_audit::SqliteStore;
pub use reqtrail_cache::{CacheStore, InMemoryCache};
pub use reqtrail_config::{
    ConfigManager, DatabaseLoggingConfig, DurationLimit, FileFormat, RequestLoggingConfig,
};

/// Build request logging middleware straight from a config manager.
///
/// Settings are read from the `request-logging` namespace; output goes to
/// `tracing` and, when database logging is enabled, to `store`.
pub fn request_logging(
    manager: &ConfigManager,
    store: Option<std::sync::Arc<dyn AuditStore>>,
) -> RequestLoggingMiddleware {
    let builder = RequestLoggingMiddleware::builder(RequestLoggingConfig::from_manager(manager));
    match store {
        Some(store) => builder.store(store).build(),
        None => builder.build(),
    }
}

pub mod prelude {
    pub use crate::{
        AuditStore,
        ConfigManager,
        DatabaseLoggingConfig,
        DurationLimit,
        Error,
        HttpRequest,
        HttpResponse,
        LogLevel,
        LogSink,
        MemorySink,
        MemoryStore,
        Middleware,
        MiddlewareChain,
        RequestLoggingConfig,
        RequestLoggingMiddleware,
        TracingSink,
        async_trait,
        request_logging,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::SqliteStore;
}
