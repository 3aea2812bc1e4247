//! Entity trait: identity + continuity across state changes.

/// A persisted domain object with a stable identity and a row version.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Version of the stored row; starts at 1 and is bumped by every successful write.
    fn version(&self) -> u64;
}
