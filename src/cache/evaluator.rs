//! Pre-dispatch conditional request evaluation.
//!
//! Runs before the host produces a body. When the request's `If-None-Match`
//! carries the fingerprint already stored for the resource it addresses, the
//! request is answered with `304 Not Modified`. Every other outcome, including
//! store failures, lets the request proceed: this is an optimization, never a
//! gate.

use tracing::debug;

use super::fingerprint::Fingerprint;
use super::identity::ResourceIdentity;
use super::store::EtagCache;
use crate::context::RequestContext;
use crate::http::{Response, StatusCode, header};
use crate::options::Options;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Generate the full response.
    Proceed,
    /// The client's copy is current.
    NotModified(Fingerprint),
}

impl Evaluation {
    /// The short-circuit response for a match, `None` when the request proceeds.
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Proceed => None,
            Self::NotModified(fingerprint) => Some(
                Response::new(StatusCode::NotModified)
                    .header(header::ETAG, fingerprint.header_value()),
            ),
        }
    }
}

/// Evaluates the conditional headers of `ctx` against the stored fingerprint.
pub async fn evaluate(ctx: &RequestContext, cache: &EtagCache, options: &Options) -> Evaluation {
    if !ctx.method().is_safe() {
        return Evaluation::Proceed;
    }
    let Some(tokens) = ctx.if_none_match().and_then(parse_entity_tags) else {
        return Evaluation::Proceed;
    };

    if !addresses_single_resource(ctx) {
        debug!("conditional request targets a collection, skipping");
        return Evaluation::Proceed;
    }
    let Some(identity) = ResourceIdentity::from_request(ctx) else {
        return Evaluation::Proceed;
    };

    let Some(stored) = cache.lookup(&identity).await else {
        debug!(kind = %identity.kind, "no stored etag");
        return Evaluation::Proceed;
    };

    if tokens.iter().any(|token| *token == stored) {
        debug!(kind = %identity.kind, etag = %stored, "etag matched, not modified");
        Evaluation::NotModified(Fingerprint::new(stored, options.generate_weak_etag))
    } else {
        Evaluation::Proceed
    }
}

/// A numeric trailing segment, or an explicit page size of one.
fn addresses_single_resource(ctx: &RequestContext) -> bool {
    ctx.ends_in_numeric_id() || ctx.query_param("per_page").map(str::trim) == Some("1")
}

/// Parses an `If-None-Match` list into bare hashes.
///
/// Quotes and any `W/` prefix are stripped so tags compare directly with the
/// unframed stored hash (weak comparison). `*`, unquoted tokens, and empty
/// lists yield `None`: an unparseable header is treated as absent.
pub fn parse_entity_tags(raw: &str) -> Option<Vec<String>> {
    let tags = raw
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(normalize_tag)
        .collect::<Option<Vec<_>>>()?;
    (!tags.is_empty()).then_some(tags)
}

fn normalize_tag(tag: &str) -> Option<String> {
    let opaque = tag.strip_prefix("W/").unwrap_or(tag);
    let inner = opaque.strip_prefix('"')?.strip_suffix('"')?;
    if inner.is_empty() || inner.contains('"') {
        return None;
    }
    Some(inner.to_owned())
}
