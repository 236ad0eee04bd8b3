//! Middleware pipeline: the host's extension points.
//!
//! Each middleware wraps the next layer, so it can inspect the request,
//! short-circuit with its own response, or decorate the downstream response.
//! The conditional cache uses all three: see [`ConditionalCache`].
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] / [`handler_fn`] — build handlers from a trait object
//!   or from the host's terminal request handler.
//! - [`dispatch`] — runs one request through a stack.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{Request, Response, StatusCode, context::Context};

mod conditional;

pub use conditional::ConditionalCache;

/// A boxed, sendable response future.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxFuture + Send + Sync + 'static>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    index: usize,
}

impl Next {
    pub fn new(middlewares: impl Into<Arc<[MiddlewareHandler]>>) -> Self {
        Self {
            middlewares: middlewares.into(),
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// An exhausted chain yields `500 Internal Server Error`.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => Response::new(StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline"),
        }
    }
}

/// The core trait for all middleware.
///
/// Implementations must be `Send + Sync` because middleware is shared across
/// Tokio tasks, and must return a `Send` future.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture;
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Wraps the host's request handler as the terminal entry of a stack.
///
/// # Examples
///
/// ```
/// use rttp_etag::{Request, Response, StatusCode};
/// use rttp_etag::middleware::{dispatch, handler_fn};
///
/// # tokio_test_block_on(async {
/// let stack = vec![handler_fn(|_req: Request| async { Response::new(StatusCode::NoContent) })];
/// let response = dispatch(&stack, Request::get("/")).await;
/// assert_eq!(response.status(), StatusCode::NoContent);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub fn handler_fn<H, F>(handler: H) -> MiddlewareHandler
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: Context, _next: Next| -> BoxFuture { Box::pin(handler(ctx.into_request())) })
}

/// Runs `request` through `stack`, first entry outermost.
pub async fn dispatch(stack: &[MiddlewareHandler], request: Request) -> Response {
    Next::new(stack.to_vec()).run(Context::new(request)).await
}
