//! Request/response logging middleware

use crate::duration::DurationMonitor;
use crate::error::RequestLogError;
use crate::files::flatten_request_files;
use crate::redact::redact_value;
use crate::retention::{PruneGate, RetentionPruner};
use crate::route::RouteMatcher;
use crate::sink::{LogSink, TracingSink};
use crate::store::{AuditRowUpdate, AuditStore, NewAuditRow};
use crate::template::{MessageTemplate, Placeholders};
use chrono::{DateTime, Utc};
use reqtrail_cache::{CacheStore, InMemoryCache};
use reqtrail_config::RequestLoggingConfig;
use reqtrail_core::middleware::Next;
use reqtrail_core::{Clock, Error, HttpRequest, HttpResponse, Middleware, SystemClock, UserSlot};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Logged in place of response bodies that are neither JSON nor shown raw
pub const NON_JSON_PLACEHOLDER: &str = "Non-JSON content returned";

/// `userId` placeholder value for anonymous requests
pub const UNKNOWN_USER: &str = "unknown";

struct Persistence {
    store: Arc<dyn AuditStore>,
    pruner: RetentionPruner,
    limit_response: usize,
}

/// State of one logged request, carried from the request phase to the response phase
#[derive(Debug, Clone)]
struct InterceptionContext {
    started_at: DateTime<Utc>,
    audit_row_id: Option<i64>,
    ip: String,
    path: String,
    expects_json: bool,
    /// Read after the continuation returns, so users attached downstream are seen
    user: UserSlot,
}

impl InterceptionContext {
    /// Sub-second part of the start time, in microseconds.
    ///
    /// Correlates the request line, response line and audit row. Two
    /// requests starting in the same microsecond share an id.
    fn request_id(&self) -> String {
        format!("{:06}", self.started_at.timestamp_subsec_micros())
    }

    fn micro_timestamp(&self) -> String {
        format!(
            "{}.{:06}",
            self.started_at.timestamp(),
            self.started_at.timestamp_subsec_micros()
        )
    }
}

/// Logs every matching request and its response, optionally to an audit table.
///
/// ```no_run
/// use reqtrail_audit::*;
/// use reqtrail_config::RequestLoggingConfig;
/// use std::sync::Arc;
///
/// let middleware = RequestLoggingMiddleware::builder(RequestLoggingConfig::default())
///     .sink(Arc::new(TracingSink::new()))
///     .build();
/// ```
pub struct RequestLoggingMiddleware {
    config: RequestLoggingConfig,
    routes: RouteMatcher,
    request_template: MessageTemplate,
    response_template: MessageTemplate,
    monitor: DurationMonitor,
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    persistence: Option<Persistence>,
}

impl RequestLoggingMiddleware {
    /// Middleware with tracing output and no audit store
    pub fn new(config: RequestLoggingConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: RequestLoggingConfig) -> RequestLoggingMiddlewareBuilder {
        RequestLoggingMiddlewareBuilder::new(config)
    }

    pub fn config(&self) -> &RequestLoggingConfig {
        &self.config
    }

    /// Whether audit rows are written
    pub fn persists(&self) -> bool {
        self.persistence.is_some()
    }

    /// Enable flag, method allow-list and route exclusions
    pub fn should_log(&self, req: &HttpRequest) -> bool {
        if !self.config.enabled {
            return false;
        }
        if !self
            .config
            .methods
            .iter()
            .any(|method| method.eq_ignore_ascii_case(&req.method))
        {
            return false;
        }
        !self.routes.matches(&req.path)
    }

    async fn log_request(&self, req: &HttpRequest) -> Result<InterceptionContext, RequestLogError> {
        let mut ctx = InterceptionContext {
            started_at: self.clock.now(),
            audit_row_id: None,
            ip: req.ip(),
            path: req.path.clone(),
            expects_json: req.expects_json(),
            user: req.user_slot(),
        };

        let method = req.method.to_ascii_uppercase();
        let input = redact_value(&req.input(), &self.config.exclude_request_fields);
        let body = serde_json::to_string(&input)?;
        let files = flatten_request_files(&req.files);
        let files_json = serde_json::to_string(&files)?;

        let placeholders = Placeholders::new()
            .set("microTimeStamp", ctx.micro_timestamp())
            .set("requestId", ctx.request_id())
            .set("ip", ctx.ip.as_str())
            .set("method", method.as_str())
            .set("uri", ctx.path.as_str())
            .set("requestBody", body.as_str())
            .set("files", files.join(","));
        self.sink.write(
            &self.config.log_channels,
            self.config.log_level,
            &self.request_template.render(&placeholders),
        );

        if let Some(persistence) = &self.persistence {
            let now = self.clock.now();
            let id = persistence
                .store
                .insert(NewAuditRow {
                    ip: ctx.ip.clone(),
                    method,
                    uri: ctx.path.clone(),
                    request_size: body.len(),
                    body,
                    files: files_json,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            trace!(audit_row_id = id, "Audit row inserted");
            ctx.audit_row_id = Some(id);
        }

        Ok(ctx)
    }

    async fn log_response(
        &self,
        ctx: &InterceptionContext,
        response: &HttpResponse,
    ) -> Result<(), RequestLogError> {
        let now = self.clock.now();
        let duration = DurationMonitor::elapsed_ms(ctx.started_at, now);

        if self.monitor.exceeded(duration) {
            self.sink.write(
                &self.config.warning_log_channels,
                self.config.warning_log_level,
                &format!(
                    "Request exceeded response duration threshold. It took {:.2}ms to respond to {}",
                    duration, ctx.path
                ),
            );
        }

        let (target, redirect) = if response.is_redirection() {
            let target = response.target_url().unwrap_or_default().to_string();
            let redirect = format!("Redirecting to {}", target);
            (target, redirect)
        } else {
            (String::new(), String::new())
        };

        let body = self.response_body(ctx, response)?;
        let user_id = ctx.user.get().map(|user| user.id);

        let placeholders = Placeholders::new()
            .set("microTimeStamp", ctx.micro_timestamp())
            .set("requestId", ctx.request_id())
            .set("userId", user_id.as_deref().unwrap_or(UNKNOWN_USER))
            .set("ip", ctx.ip.as_str())
            .set(
                "databaseId",
                ctx.audit_row_id.map(|id| id.to_string()).unwrap_or_default(),
            )
            .set("responseStatusCode", response.status.to_string())
            .set("duration", format!("{:.2}ms", duration))
            .set("responseBody", body.as_str())
            .set("targetUrl", target)
            .set("isRedirecting", redirect);
        self.sink.write(
            &self.config.log_channels,
            self.config.log_level,
            &self.response_template.render(&placeholders),
        );

        if let (Some(persistence), Some(id)) = (&self.persistence, ctx.audit_row_id) {
            let update = AuditRowUpdate {
                user_id,
                status: response.status,
                duration,
                response: truncate_chars(&body, persistence.limit_response),
                response_size: body.len(),
                updated_at: self.clock.now(),
            };
            if !persistence.store.update(id, update).await? {
                warn!(audit_row_id = id, "Audit row missing at response time");
            }
            persistence.pruner.prune_if_due(now).await?;
        }

        Ok(())
    }

    fn response_body(
        &self,
        ctx: &InterceptionContext,
        response: &HttpResponse,
    ) -> Result<String, RequestLogError> {
        if ctx.expects_json {
            let decoded = serde_json::from_slice::<Value>(&response.body).unwrap_or(Value::Null);
            let redacted = redact_value(&decoded, &self.config.exclude_response_fields);
            return Ok(serde_json::to_string(&redacted)?);
        }

        if self.config.show_response_html {
            Ok(response.body_text().into_owned())
        } else {
            Ok(NON_JSON_PLACEHOLDER.to_string())
        }
    }
}

/// First `limit` characters followed by `...` when `body` is longer; `limit == 0` keeps everything.
pub fn truncate_chars(body: &str, limit: usize) -> String {
    if limit == 0 {
        return body.to_string();
    }
    match body.char_indices().nth(limit) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[async_trait::async_trait]
impl Middleware for RequestLoggingMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        if !self.should_log(&req) {
            debug!(method = %req.method, path = %req.path, "Request logging skipped");
            return next(req).await;
        }

        let ctx = self.log_request(&req).await?;
        let response = next(req).await?;
        self.log_response(&ctx, &response).await?;

        Ok(response)
    }
}

/// Builder for [`RequestLoggingMiddleware`]
pub struct RequestLoggingMiddlewareBuilder {
    config: RequestLoggingConfig,
    sink: Option<Arc<dyn LogSink>>,
    store: Option<Arc<dyn AuditStore>>,
    cache: Option<Arc<dyn CacheStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RequestLoggingMiddlewareBuilder {
    pub fn new(config: RequestLoggingConfig) -> Self {
        Self {
            config,
            sink: None,
            store: None,
            cache: None,
            clock: None,
        }
    }

    /// Destination of the log lines (default: [`TracingSink`])
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Audit store, used when database logging is enabled
    pub fn store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Cache holding the prune gate (default: a private [`InMemoryCache`])
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Time source (default: [`SystemClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> RequestLoggingMiddleware {
        let config = self.config;
        let database = &config.database_logging;

        let persistence = match (database.enabled, self.store) {
            (true, Some(store)) => {
                let cache = self
                    .cache
                    .unwrap_or_else(|| Arc::new(InMemoryCache::new()));
                Some(Persistence {
                    pruner: RetentionPruner::new(
                        store.clone(),
                        PruneGate::new(cache),
                        database.persistence_days,
                    ),
                    store,
                    limit_response: database.limit_response,
                })
            }
            (true, None) => {
                warn!("Database logging is enabled but no audit store was given; rows will not be written");
                None
            }
            (false, _) => None,
        };

        RequestLoggingMiddleware {
            routes: RouteMatcher::new(&config.exclude_routes),
            request_template: MessageTemplate::new(config.request_log_format.as_str()),
            response_template: MessageTemplate::new(config.response_log_format.as_str()),
            monitor: DurationMonitor::new(config.request_duration_limit),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            persistence,
            config,
        }
    }
}
