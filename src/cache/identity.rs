//! Resource identity and cache-key derivation.
//!
//! Writes derive identity from a response payload, reads derive it from the
//! request path and query. Both sides go through [`singular`] and
//! [`cache_key`], which is what keeps the keys byte-identical.

use serde_json::Value;

use crate::context::RequestContext;

/// Payload fields that name a resource's type, in preference order.
const KIND_FIELDS: [&str; 4] = ["type", "taxonomy", "name", "term_id"];

/// Payload fields that carry a resource's id, in preference order.
const ID_FIELDS: [&str; 5] = ["id", "ID", "taxonomy_id", "term_id", "slug"];

/// Query parameters that address a resource by slug.
const NAME_FILTERS: [&str; 3] = ["slug", "filter[name]", "name"];

/// Who a fingerprint belongs to: `(type, id, slug)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub kind: String,
    pub id: Option<String>,
    pub slug: Option<String>,
}

impl ResourceIdentity {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            slug: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Extracts identity from a resourceful payload object.
    ///
    /// When no payload field names the type, it is taken from the request
    /// path, which is why the context is required.
    pub fn from_payload(payload: &Value, ctx: &RequestContext) -> Self {
        let id = ID_FIELDS
            .iter()
            .find_map(|field| payload.get(field).and_then(scalar_to_string));
        let slug = payload
            .get("slug")
            .and_then(Value::as_str)
            .filter(|slug| !slug.is_empty())
            .map(str::to_owned);

        let kind = match payload.get("type") {
            Some(Value::String(kind)) if !kind.is_empty() => Some(kind.clone()),
            _ => None,
        }
        .or_else(|| {
            KIND_FIELDS[1..]
                .iter()
                .find_map(|field| payload.get(field).and_then(scalar_to_string))
        })
        .unwrap_or_else(|| kind_from_path(ctx, [id.as_deref(), slug.as_deref()]));

        Self { kind, id, slug }
    }

    /// Derives the identity an inbound request addresses.
    ///
    /// A name filter in the query yields `(type, slug)` from the collection
    /// segment; otherwise a numeric trailing segment yields `(type, id)` from
    /// the last two segments. Anything else addresses no single resource.
    pub fn from_request(ctx: &RequestContext) -> Option<Self> {
        if ctx.has_query() && !ctx.ends_in_numeric_id() {
            let slug = NAME_FILTERS
                .iter()
                .find_map(|key| ctx.query_param(key))
                .filter(|slug| !slug.is_empty())?;
            let collection = ctx.last_segment();
            if collection.is_empty() {
                return None;
            }
            return Some(Self::new(singular(collection)).with_slug(slug));
        }

        if !ctx.ends_in_numeric_id() {
            return None;
        }
        let (collection, id) = ctx.trailing_pair()?;
        Some(Self::new(singular(collection)).with_id(id))
    }

    /// The id-keyed and slug-keyed store keys, id first.
    pub fn cache_keys(&self, tenant: &str) -> Vec<String> {
        [self.id.as_deref(), self.slug.as_deref()]
            .into_iter()
            .flatten()
            .map(|handle| cache_key(tenant, &self.kind, handle))
            .collect()
    }

    /// Key under which the id entry records its slug, so an id-only
    /// invalidation can still find the slug entry.
    pub fn slug_link_key(&self, tenant: &str) -> Option<String> {
        let id = self.id.as_deref()?;
        Some(format!("{}#slug", cache_key(tenant, &self.kind, id)))
    }

    /// The single key a read goes through: id when known, else slug.
    pub fn lookup_key(&self, tenant: &str) -> Option<String> {
        self.id
            .as_deref()
            .or(self.slug.as_deref())
            .map(|handle| cache_key(tenant, &self.kind, handle))
    }
}

/// `tenant:etags:{kind}s/{handle}`.
pub fn cache_key(tenant: &str, kind: &str, handle: &str) -> String {
    format!("{tenant}:etags:{kind}s/{handle}")
}

/// Strips one trailing `s`: `posts` → `post`.
pub fn singular(segment: &str) -> &str {
    segment.strip_suffix('s').unwrap_or(segment)
}

/// Type from the last two path segments: the parent when the last segment is
/// the resource's own id or slug, the last segment otherwise.
fn kind_from_path(ctx: &RequestContext, handles: [Option<&str>; 2]) -> String {
    let names_resource = |segment: &str| {
        ctx.ends_in_numeric_id() || handles.iter().flatten().any(|h| *h == segment)
    };
    let collection = match ctx.trailing_pair() {
        Some((parent, last)) if names_resource(last) => parent,
        _ => ctx.last_segment(),
    };
    singular(collection).to_owned()
}

pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
