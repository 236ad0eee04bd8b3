//! # rttp-etag
//!
//! Conditional response caching for async content APIs: deterministic ETags
//! over arbitrary JSON payloads, `Cache-Control` / `Pragma` / `Last-Modified`
//! headers, and `304 Not Modified` short-circuiting backed by a shared
//! key-value store.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rttp_etag::cache::{EtagCache, MemoryStore};
//! use rttp_etag::middleware::{ConditionalCache, dispatch, from_middleware, handler_fn};
//! use rttp_etag::options::{CacheSettings, Options};
//! use rttp_etag::{Request, Response, StatusCode};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let cache = EtagCache::new(Arc::new(MemoryStore::new()), CacheSettings::new("site-1"));
//!     let stack = vec![
//!         from_middleware(Arc::new(ConditionalCache::new(cache, Options::default()))),
//!         handler_fn(|_req: Request| async {
//!             Response::json(StatusCode::Ok, json!({"id": 42, "date": "2016-05-10T11:22:33"}))
//!         }),
//!     ];
//!
//!     let first = dispatch(&stack, Request::get("/wp/v2/posts/42")).await;
//!     let etag = first.headers().get("etag").unwrap().to_owned();
//!
//!     let second = dispatch(&stack, Request::get("/wp/v2/posts/42").header("If-None-Match", etag)).await;
//!     assert_eq!(second.status(), StatusCode::NotModified);
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod options;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
