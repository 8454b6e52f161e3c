//! Host pipeline types for reqtrail.
//!
//! The request logging middleware sits between a host's router and its
//! handlers. This crate holds what both sides share: the request and
//! response wrappers, the [`Middleware`] trait with its [`Next`]
//! continuation, the [`Clock`] used for timing, and the diagnostic
//! logging bootstrap.

pub mod clock;
pub mod error;
pub mod files;
pub mod http;
pub mod logging;
pub mod middleware;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use files::{FileInput, UploadedFile};
pub use http::{AuthUser, HttpRequest, HttpResponse, UserSlot};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use middleware::{
    HandlerFn, Middleware, MiddlewareChain, Next, ResponseFuture, handler_fn, next_fn,
};

// Re-export async_trait so middleware implementors share our version
pub use async_trait::async_trait;
