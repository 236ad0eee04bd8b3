//! Per-request context.
//!
//! [`RequestContext`] is the explicit view of the inbound request that the
//! classifier, fingerprinter, and evaluator consume: path segments, decoded
//! query parameters, and the conditional-request header. It is derived once
//! per request and threaded through by reference.

use std::collections::HashMap;

use crate::Request;
use crate::http::{Method, header};

/// The parts of an inbound request the caching layer depends on.
///
/// # Examples
///
/// ```
/// use rttp_etag::{Request, context::RequestContext};
///
/// let request = Request::get("/wp/v2/posts/42").header("If-None-Match", "\"abc\"");
/// let ctx = RequestContext::from_request(&request);
///
/// assert_eq!(ctx.last_segment(), "42");
/// assert_eq!(ctx.trailing_pair(), Some(("posts", "42")));
/// assert_eq!(ctx.if_none_match(), Some("\"abc\""));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    segments: Vec<String>,
    query: HashMap<String, String>,
    if_none_match: Option<String>,
}

impl RequestContext {
    pub fn from_request(request: &Request) -> Self {
        let segments = request
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();

        // Repeated If-None-Match fields are one comma-separated list.
        let tags: Vec<&str> = request.headers().get_all(header::IF_NONE_MATCH).collect();
        let if_none_match = (!tags.is_empty()).then(|| tags.join(", "));

        Self {
            method: request.method().clone(),
            segments,
            query: request.query_params().clone(),
            if_none_match,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The final path segment, or `""` for the root path.
    pub fn last_segment(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// The last two path segments, e.g. `("posts", "42")` for `/wp/v2/posts/42`.
    pub fn trailing_pair(&self) -> Option<(&str, &str)> {
        match self.segments.as_slice() {
            [.., parent, last] => Some((parent.as_str(), last.as_str())),
            _ => None,
        }
    }

    /// Returns `true` when the path ends in an all-digit segment.
    pub fn ends_in_numeric_id(&self) -> bool {
        let last = self.last_segment();
        !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn has_query(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// The raw `If-None-Match` value, if the request carried one.
    pub fn if_none_match(&self) -> Option<&str> {
        self.if_none_match.as_deref()
    }
}

/// The value passed down the middleware pipeline for one request.
pub struct Context {
    request: Request,
    request_context: RequestContext,
}

impl Context {
    pub fn new(request: Request) -> Self {
        let request_context = RequestContext::from_request(&request);
        Self {
            request,
            request_context,
        }
    }

    pub fn request_context(&self) -> &RequestContext {
        &self.request_context
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}
