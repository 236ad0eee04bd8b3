//! Content-mutation invalidation.

use tracing::info;

use super::identity::ResourceIdentity;
use super::store::EtagCache;

/// What happened to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Saved,
    Updated,
    Deleted,
}

/// A mutation reported by the content system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub action: MutationAction,
    pub resource: ResourceIdentity,
}

impl MutationEvent {
    pub fn new(action: MutationAction, resource: ResourceIdentity) -> Self {
        Self { action, resource }
    }
}

/// Drops the id- and slug-keyed fingerprints of the mutated resource.
///
/// `(type, id)` is enough: the slug entry is found through the link the id
/// entry recorded when it was written.
///
/// The next successful response for the resource writes fresh entries.
pub async fn invalidate(cache: &EtagCache, event: &MutationEvent) {
    info!(
        action = ?event.action,
        kind = %event.resource.kind,
        id = ?event.resource.id,
        slug = ?event.resource.slug,
        "invalidating etags"
    );
    cache.forget(&event.resource).await;
}
