//! Response payload classification.
//!
//! Every payload is sorted into exactly one [`Shape`] before any fingerprint
//! logic runs. The collection test looks at the first element's first key
//! only; payloads whose elements disagree after the first may be
//! misclassified. That heuristic is kept as-is because tightening it would
//! change the ETags existing payloads already receive.
//!
//! Only JSON arrays are collections. A map whose values are all compound
//! (a `/types` listing keyed by name) is [`Shape::Opaque`].

use serde_json::Value;

use super::identity::ResourceIdentity;
use crate::context::RequestContext;

/// The closed set of payload shapes the fingerprinter understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// One identifiable content item.
    Single(ResourceIdentity),
    /// A sequence of content items, in response order.
    HomogeneousCollection(Vec<ResourceIdentity>),
    /// A sequence of compound values that are not content items.
    HeterogeneousCollection,
    /// Anything else: index documents, scalars, empty sequences.
    Opaque,
}

impl Shape {
    pub fn is_single(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    /// Identities whose cache entries a fingerprint of this payload should update.
    ///
    /// A one-element collection is what a `per_page=1` lookup addresses, so it
    /// writes under its element. Longer collections write nothing.
    pub fn write_targets(&self) -> &[ResourceIdentity] {
        match self {
            Self::Single(identity) => std::slice::from_ref(identity),
            Self::HomogeneousCollection(items) if items.len() == 1 => items.as_slice(),
            _ => &[],
        }
    }
}

/// Sorts `payload` into a [`Shape`].
///
/// # Examples
///
/// ```
/// use rttp_etag::{Request, cache::{Shape, classify}, context::RequestContext};
/// use serde_json::json;
///
/// let ctx = RequestContext::from_request(&Request::get("/wp/v2/posts/1"));
/// let shape = classify(&json!({"id": 1, "date": "2016-05-10T11:22:33", "guid": "g"}), &ctx);
/// assert!(shape.is_single());
///
/// assert_eq!(classify(&json!([]), &ctx), Shape::Opaque);
/// ```
pub fn classify(payload: &Value, ctx: &RequestContext) -> Shape {
    if is_resourceful(payload) {
        return Shape::Single(ResourceIdentity::from_payload(payload, ctx));
    }

    let Some(items) = collection_items(payload) else {
        return Shape::Opaque;
    };

    if is_resourceful(&items[0]) {
        Shape::HomogeneousCollection(
            items
                .iter()
                .map(|item| ResourceIdentity::from_payload(item, ctx))
                .collect(),
        )
    } else {
        Shape::HeterogeneousCollection
    }
}

/// An object with an `id` (or `ID`) and a `date`.
pub fn is_resourceful(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    (object.contains_key("id") || object.contains_key("ID")) && object.contains_key("date")
}

/// Returns the elements when `payload` passes the first-key collection heuristic.
fn collection_items(payload: &Value) -> Option<&[Value]> {
    let items = payload.as_array()?;
    let first_key = first_key(items.first()?)?;
    items
        .iter()
        .all(|item| has_key(item, &first_key))
        .then_some(items.as_slice())
}

enum Key {
    Name(String),
    Index,
}

fn first_key(value: &Value) -> Option<Key> {
    match value {
        Value::Object(object) => object.keys().next().map(|k| Key::Name(k.clone())),
        Value::Array(items) if !items.is_empty() => Some(Key::Index),
        _ => None,
    }
}

fn has_key(value: &Value, key: &Key) -> bool {
    match (value, key) {
        (Value::Object(object), Key::Name(name)) => object.contains_key(name),
        (Value::Array(items), Key::Index) => !items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Request;

    fn ctx(target: &str) -> RequestContext {
        RequestContext::from_request(&Request::get(target))
    }

    #[test]
    fn single_needs_id_and_date() {
        let c = ctx("/wp/v2/posts/1");
        assert!(classify(&json!({"id": 1, "date": "d", "guid": "g"}), &c).is_single());
        assert!(classify(&json!({"ID": 1, "date": "d"}), &c).is_single());
        assert_eq!(classify(&json!({"id": 1}), &c), Shape::Opaque);
        assert_eq!(classify(&json!({"date": "d"}), &c), Shape::Opaque);
    }

    #[test]
    fn routes_index_is_opaque() {
        let payload = json!({"namespace": "wp/v2", "routes": {"/wp/v2": {}, "/wp/v2/posts": {}}});
        assert_eq!(classify(&payload, &ctx("/wp/v2")), Shape::Opaque);
    }

    #[test]
    fn empty_sequence_is_opaque() {
        assert_eq!(classify(&json!([]), &ctx("/wp/v2/posts")), Shape::Opaque);
    }

    #[test]
    fn scalars_are_opaque() {
        assert_eq!(classify(&json!("text"), &ctx("/x")), Shape::Opaque);
        assert_eq!(classify(&json!(null), &ctx("/x")), Shape::Opaque);
        assert_eq!(classify(&json!([1, 2, 3]), &ctx("/x")), Shape::Opaque);
    }

    #[test]
    fn homogeneous_collection_keeps_order() {
        let payload = json!([
            {"id": 2, "date": "d", "type": "post", "slug": "b"},
            {"id": 1, "date": "d", "type": "post", "slug": "a"},
        ]);
        let Shape::HomogeneousCollection(items) = classify(&payload, &ctx("/wp/v2/posts")) else {
            panic!("expected a homogeneous collection");
        };
        let ids: Vec<_> = items.iter().filter_map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn heterogeneous_collection() {
        let payload = json!([{"name": "Menu A", "count": 1}, {"name": "Menu B"}]);
        assert_eq!(
            classify(&payload, &ctx("/menus")),
            Shape::HeterogeneousCollection
        );
    }

    #[test]
    fn mismatched_first_key_is_not_a_collection() {
        let payload = json!([{"id": 1, "date": "d"}, {"title": "x"}]);
        assert_eq!(classify(&payload, &ctx("/posts")), Shape::Opaque);
    }

    #[test]
    fn first_key_heuristic_only_checks_one_key() {
        // Second element lacks `date` but shares `id`: still treated as homogeneous.
        let payload = json!([{"id": 1, "date": "d"}, {"id": 2}]);
        assert!(matches!(
            classify(&payload, &ctx("/posts")),
            Shape::HomogeneousCollection(_)
        ));
    }

    #[test]
    fn write_targets() {
        let one = json!([{"id": 1, "date": "d", "type": "post", "slug": "a"}]);
        assert_eq!(classify(&one, &ctx("/wp/v2/posts")).write_targets().len(), 1);

        let two = json!([{"id": 1, "date": "d"}, {"id": 2, "date": "d"}]);
        assert!(classify(&two, &ctx("/wp/v2/posts")).write_targets().is_empty());
    }
}
