// Middleware system for request/response processing

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// Boxed future resolving to a handler result
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for the next handler in the middleware chain
pub type Next = Box<dyn FnOnce(HttpRequest) -> ResponseFuture + Send>;

/// Type alias for handler functions
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> ResponseFuture + Send + Sync>;

/// Wrap an async function as a [`HandlerFn`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> ResponseFuture { Box::pin(f(req)) })
}

/// Wrap a one-shot async function as a [`Next`] continuation
pub fn next_fn<F, Fut>(f: F) -> Next
where
    F: FnOnce(HttpRequest) -> Fut + Send + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Box::new(move |req: HttpRequest| -> ResponseFuture { Box::pin(f(req)) })
}

/// Middleware trait for processing requests before they reach the handler
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request and optionally pass to next middleware
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        (**self).handle(req, next).await
    }
}

/// Middleware chain executor
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Add a middleware to the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut mws = (*self.middlewares).clone();
        mws.push(Arc::new(middleware));
        self.middlewares = Arc::new(mws);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Execute the middleware chain with a handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(&self, index: usize, req: HttpRequest, handler: HandlerFn) -> ResponseFuture {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();
            let handler_clone = handler.clone();

            trace!(middleware_index = index, "Executing middleware");
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler_clone)),
                    )
                    .await
            })
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HeaderStamp(&'static str);

    #[async_trait]
    impl Middleware for HeaderStamp {
        async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
            let response = next(req).await?;
            let seen = response.header("x-seen").unwrap_or("").to_string();
            Ok(response.with_header("x-seen", format!("{}{}", seen, self.0)))
        }
    }

    #[tokio::test]
    async fn test_empty_chain_calls_handler() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());

        let handler = handler_fn(|_req| async { Ok(HttpResponse::no_content()) });
        let response = chain
            .apply(HttpRequest::new("GET", "/"), handler)
            .await
            .unwrap();
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_chain_runs_middlewares_outside_in() {
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(HeaderStamp("a"));
        chain.use_middleware(HeaderStamp("b"));
        assert_eq!(chain.len(), 2);

        let handler = handler_fn(|_req| async { Ok(HttpResponse::ok()) });
        let response = chain
            .apply(HttpRequest::new("GET", "/"), handler)
            .await
            .unwrap();

        // Innermost middleware sees the response first
        assert_eq!(response.header("x-seen"), Some("ba"));
    }

    #[tokio::test]
    async fn test_handler_errors_pass_through() {
        let mut chain = MiddlewareChain::new();
        chain.use_middleware(HeaderStamp("a"));

        let handler = handler_fn(|_req| async { Err(Error::NotFound("gone".into())) });
        let result = chain.apply(HttpRequest::new("GET", "/"), handler).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_next_fn() {
        let next = next_fn(|req: HttpRequest| async move {
            Ok(HttpResponse::text(req.path))
        });
        let response = next(HttpRequest::new("GET", "/echo")).await.unwrap();
        assert_eq!(response.body_text(), "/echo");
    }
}
