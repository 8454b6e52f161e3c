//! Request/response logging for reqtrail
//!
//! [`RequestLoggingMiddleware`] wraps the rest of the pipeline. For every
//! request that passes its gates (enabled, method allow-list, excluded
//! routes) it writes a request line, calls the next stage, then writes a
//! response line and, past the configured duration limit, a warning line.
//!
//! # Features
//!
//! - **Redaction** - configured fields are dropped from logged bodies
//! - **Uploads** - nested upload fields are reported as a flat name list
//! - **Templates** - `{placeholder}` message formats
//! - **Audit table** - one row per request, updated with the response
//! - **Retention** - rows past the retention window are pruned once a day
//! - `sqlite` - [`sqlite::SqliteStore`] (enabled by default)
//!
//! # Quick Start
//!
//! ```no_run
//! use reqtrail_audit::*;
//! use reqtrail_config::{DatabaseLoggingConfig, RequestLoggingConfig};
//! use reqtrail_core::MiddlewareChain;
//! use std::sync::Arc;
//!
//! let config = RequestLoggingConfig::default()
//!     .database_logging(DatabaseLoggingConfig::default().enabled(true));
//!
//! let mut chain = MiddlewareChain::new();
//! chain.use_middleware(
//!     RequestLoggingMiddleware::builder(config)
//!         .store(Arc::new(MemoryStore::new()))
//!         .build(),
//! );
//! ```

pub mod duration;
pub mod error;
pub mod files;
pub mod middleware;
pub mod redact;
pub mod retention;
pub mod route;
pub mod sink;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod template;

pub use duration::DurationMonitor;
pub use error::RequestLogError;
pub use files::{flatten_files, flatten_request_files};
pub use middleware::{
    NON_JSON_PLACEHOLDER, RequestLoggingMiddleware, RequestLoggingMiddlewareBuilder, UNKNOWN_USER,
    truncate_chars,
};
pub use redact::{redact_fields, redact_value};
pub use retention::{PRUNE_GATE_KEY, PruneGate, RetentionPruner, start_of_next_day};
pub use route::RouteMatcher;
pub use sink::{LogRecord, LogSink, MemorySink, REQUEST_LOG_TARGET, TracingSink};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{AuditRow, AuditRowUpdate, AuditStore, MemoryStore, NewAuditRow, StoreError};
pub use template::{MessageTemplate, Placeholders};
