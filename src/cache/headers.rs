//! Post-dispatch header assembly.
//!
//! Turns a successful response's payload into `ETag`, `Cache-Control`,
//! `Pragma`, and `Last-Modified` headers, and records the fingerprint so the
//! evaluator can answer the next conditional request.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::classify::{Shape, classify};
use super::fingerprint::{Fingerprint, fingerprint, modified_time};
use super::store::EtagCache;
use crate::context::RequestContext;
use crate::http::{Response, StatusCode, header};
use crate::options::Options;

/// Cache-Control sent when cache-control headers are disabled.
pub const NO_CACHE: &str = "no-cache, must-revalidate, max-age=0";

/// The caching headers for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeaders {
    pub etag: Option<String>,
    pub cache_control: String,
    pub pragma: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheHeaders {
    /// Builds the header set from options, an optional fingerprint, and the
    /// resource's modification time.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_etag::cache::{CacheHeaders, Fingerprint, NO_CACHE};
    /// use rttp_etag::options::Options;
    ///
    /// let options = Options { add_cache_control_header: false, ..Options::default() };
    /// let headers = CacheHeaders::assemble(&options, Some(&Fingerprint::new("abc", false)), None);
    ///
    /// assert_eq!(headers.etag.as_deref(), Some("\"abc\""));
    /// assert_eq!(headers.cache_control, NO_CACHE);
    /// assert_eq!(headers.pragma, None);
    /// ```
    pub fn assemble(
        options: &Options,
        fingerprint: Option<&Fingerprint>,
        last_modified: Option<DateTime<Utc>>,
    ) -> Self {
        let etag = fingerprint
            .filter(|_| options.add_etag_header)
            .map(Fingerprint::header_value);

        let (cache_control, pragma) = if options.add_cache_control_header {
            let pragma = if options.cache_max_age_seconds > 0 {
                "public"
            } else {
                "no-cache"
            };
            (options.cache_control_value(), Some(pragma.to_owned()))
        } else {
            (NO_CACHE.to_owned(), None)
        };

        let last_modified = last_modified
            .filter(|_| options.add_last_modified_header)
            .map(http_date);

        Self {
            etag,
            cache_control,
            pragma,
            last_modified,
        }
    }

    /// `(name, value)` pairs in emission order, empty values dropped.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (header::ETAG, self.etag.as_deref()),
            (header::CACHE_CONTROL, Some(self.cache_control.as_str())),
            (header::PRAGMA, self.pragma.as_deref()),
            (header::LAST_MODIFIED, self.last_modified.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.filter(|v| !v.is_empty()).map(|v| (name, v)))
    }

    /// Writes the headers onto `response`, replacing earlier values.
    ///
    /// Returns `false` without touching anything when the response headers
    /// are already committed.
    pub fn apply(&self, response: &mut Response) -> bool {
        if response.headers_committed() {
            debug!("headers already committed, skipping cache headers");
            return false;
        }
        for (name, value) in self.pairs() {
            response.headers_mut().set(name, value);
        }
        true
    }
}

/// RFC 1123 date with the zone spelled `GMT`: `Wed, 11 May 2016 08:00:00 GMT`.
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S +0000")
        .to_string()
        .replace("+0000", "GMT")
}

/// Fingerprints a successful JSON response, stores the fingerprint, and
/// attaches the caching headers.
///
/// Responses other than `200 OK`, or without a JSON payload, are left alone.
/// Returns the fingerprint when one was computed.
pub async fn decorate(
    response: &mut Response,
    ctx: &RequestContext,
    cache: &EtagCache,
    options: &Options,
) -> Option<Fingerprint> {
    if response.status() != StatusCode::Ok {
        return None;
    }
    let payload = response.payload()?;
    let shape = classify(payload, ctx);

    let fingerprint = options
        .add_etag_header
        .then(|| fingerprint(payload, &shape, ctx, options.generate_weak_etag));
    let last_modified = match shape {
        Shape::Single(_) => modified_time(payload),
        _ => None,
    };

    if let Some(fingerprint) = &fingerprint {
        for identity in shape.write_targets() {
            cache.remember(identity, fingerprint.hash()).await;
        }
    }

    CacheHeaders::assemble(options, fingerprint.as_ref(), last_modified).apply(response);
    fingerprint
}
