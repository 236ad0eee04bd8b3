//! The conditional-cache middleware.

use std::sync::Arc;

use tracing::debug;

use super::{BoxFuture, Middleware, Next};
use crate::cache::{EtagCache, MutationEvent, decorate, evaluate, invalidate};
use crate::context::Context;
use crate::options::Options;

/// Adds ETag-based conditional caching around the rest of the stack.
///
/// Before dispatch, a matching `If-None-Match` short-circuits with
/// `304 Not Modified` and the downstream handler never runs. After dispatch,
/// a `200 OK` JSON response is fingerprinted, the fingerprint is stored, and
/// the caching headers are attached. Nothing here can fail a request: store
/// trouble means a full, uncached response.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rttp_etag::cache::{EtagCache, MemoryStore};
/// use rttp_etag::middleware::{ConditionalCache, from_middleware};
/// use rttp_etag::options::{CacheSettings, Options};
///
/// let cache = EtagCache::new(Arc::new(MemoryStore::new()), CacheSettings::new("site-1"));
/// let handler = from_middleware(Arc::new(ConditionalCache::new(cache, Options::default())));
/// ```
#[derive(Clone)]
pub struct ConditionalCache {
    cache: EtagCache,
    options: Arc<Options>,
}

impl ConditionalCache {
    pub fn new(cache: EtagCache, options: Options) -> Self {
        Self {
            cache,
            options: Arc::new(options),
        }
    }

    /// Mutation-event callback: forget the resource's stored fingerprints.
    pub async fn on_mutation(&self, event: &MutationEvent) {
        invalidate(&self.cache, event).await;
    }
}

impl Middleware for ConditionalCache {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let cache = self.cache.clone();
        let options = Arc::clone(&self.options);

        Box::pin(async move {
            let request_context = ctx.request_context().clone();

            if let Some(not_modified) = evaluate(&request_context, &cache, &options)
                .await
                .into_response()
            {
                return not_modified;
            }

            let mut response = next.run(ctx).await;
            if let Some(fingerprint) =
                decorate(&mut response, &request_context, &cache, &options).await
            {
                debug!(etag = %fingerprint, "response fingerprinted");
            }
            response
        })
    }
}
