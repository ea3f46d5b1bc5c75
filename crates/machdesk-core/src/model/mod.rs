// ── Domain model ──
//
// Records held by the resource store. Every kind implements `Resource`,
// which is the only thing the store and the stream layer know about.

pub mod entity_id;
pub mod machine;

use serde::de::DeserializeOwned;

pub use entity_id::EntityId;
pub use machine::{Machine, MachinePatch};

/// A record kind the resource store can hold.
///
/// Implementors are identified by [`EntityId`] and accept partial updates
/// through their associated `Patch` type.
pub trait Resource: Clone + Send + Sync + DeserializeOwned + 'static {
    /// Partial update carrying the target id.
    type Patch: Send;

    /// Short lowercase name used in logs and errors.
    const KIND: &'static str;

    fn id(&self) -> &EntityId;

    fn patch_target(patch: &Self::Patch) -> &EntityId;

    /// Merge the fields present in `patch` into `self`.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Build a fresh record from a patch whose target is not present.
    fn from_patch(patch: Self::Patch) -> Self;
}
