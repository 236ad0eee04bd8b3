//! Fingerprint (ETag) computation.
//!
//! A classified payload is reduced to a canonical JSON value, prefixed with
//! the request's last path segment, and hashed with SHA-1. The stored form of
//! a fingerprint is always the bare hex hash; `W/"…"` or `"…"` framing is
//! applied only when a header is written.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sha1::{Digest, Sha1};

use super::classify::Shape;
use super::identity::scalar_to_string;
use crate::context::RequestContext;

/// Formats accepted for `modified_gmt` when it carries no offset.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// An opaque validator for one version of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    hash: String,
    weak: bool,
}

impl Fingerprint {
    pub fn new(hash: impl Into<String>, weak: bool) -> Self {
        Self {
            hash: hash.into(),
            weak,
        }
    }

    /// The unframed hash, as persisted in the cache store.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// The `ETag` header value: `W/"<hash>"` or `"<hash>"`.
    pub fn header_value(&self) -> String {
        frame(&self.hash, self.weak)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// Frames a bare hash as an entity tag.
pub fn frame(hash: &str, weak: bool) -> String {
    if weak {
        format!("W/\"{hash}\"")
    } else {
        format!("\"{hash}\"")
    }
}

/// Computes the fingerprint of a classified payload.
///
/// Never fails: missing or malformed fields contribute `null`.
///
/// # Examples
///
/// ```
/// use rttp_etag::{Request, cache::{classify, fingerprint}, context::RequestContext};
/// use serde_json::json;
///
/// let ctx = RequestContext::from_request(&Request::get("/wp/v2/posts/1"));
/// let payload = json!({"id": 1, "date": "2016-05-10T11:22:33", "guid": {"rendered": "g"}});
/// let shape = classify(&payload, &ctx);
///
/// let strong = fingerprint(&payload, &shape, &ctx, false);
/// let weak = fingerprint(&payload, &shape, &ctx, true);
/// assert_eq!(strong.hash(), weak.hash());
/// assert_eq!(weak.header_value(), format!("W/\"{}\"", weak.hash()));
/// ```
pub fn fingerprint(payload: &Value, shape: &Shape, ctx: &RequestContext, weak: bool) -> Fingerprint {
    let input = hash_input(payload, shape, ctx);
    Fingerprint::new(hex::encode(Sha1::digest(input.as_bytes())), weak)
}

/// The exact string that gets digested: `<last segment>=<canonical json>`.
pub fn hash_input(payload: &Value, shape: &Shape, ctx: &RequestContext) -> String {
    let canonical = match shape {
        Shape::Single(_) => resource_tuple(payload),
        Shape::HomogeneousCollection(_) => match payload {
            Value::Array(items) => Value::Array(items.iter().map(resource_tuple).collect()),
            other => resource_tuple(other),
        },
        Shape::HeterogeneousCollection | Shape::Opaque => values_for_response(payload),
    };
    format!("{}={}", ctx.last_segment(), canonical)
}

/// `[id, date, serialized(guid), modified_gmt as unix seconds]`.
pub fn resource_tuple(item: &Value) -> Value {
    let id = item
        .get("id")
        .or_else(|| item.get("ID"))
        .cloned()
        .unwrap_or(Value::Null);
    let date = item.get("date").cloned().unwrap_or(Value::Null);
    let guid = item
        .get("guid")
        .map(|guid| Value::String(guid.to_string()))
        .unwrap_or(Value::Null);
    let modified = modified_time(item)
        .map(|time| Value::from(time.timestamp()))
        .unwrap_or(Value::Null);

    Value::Array(vec![id, date, guid, modified])
}

/// Fingerprint input for payloads that are not content items.
///
/// Route indexes hash their route names, item lists hash `"{id}:{title}"`
/// per item, and everything else hashes its raw values in order.
pub fn values_for_response(payload: &Value) -> Value {
    if let Some(routes) = payload.get("routes").and_then(Value::as_object) {
        return routes.keys().cloned().map(Value::String).collect();
    }
    if let Some(items) = payload.get("items").and_then(Value::as_array) {
        return items
            .iter()
            .map(|item| {
                let id = item.get("id").and_then(scalar_to_string).unwrap_or_default();
                let title = item.get("title").and_then(title_text).unwrap_or_default();
                Value::String(format!("{id}:{title}"))
            })
            .collect();
    }
    match payload {
        Value::Object(object) => object.values().cloned().collect(),
        Value::Array(items) => Value::Array(items.clone()),
        scalar => Value::Array(vec![scalar.clone()]),
    }
}

/// Parses `modified_gmt` as a UTC timestamp.
pub fn modified_time(item: &Value) -> Option<DateTime<Utc>> {
    let raw = item.get("modified_gmt")?.as_str()?.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn title_text(title: &Value) -> Option<String> {
    match title {
        Value::Object(_) => title.get("rendered").and_then(scalar_to_string),
        other => scalar_to_string(other),
    }
}
