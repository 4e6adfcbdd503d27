//! Capabilities a resource can expose to the authorization guard.

/// Resource owned by one or more login identities.
pub trait Ownable {
    /// True when `username` is one of the resource's owning identities.
    /// Comparison is exact.
    fn has_access(&self, username: &str) -> bool;
}

/// Resource with designated participants.
pub trait Participatable {
    fn is_participant(&self, user_id: i64) -> bool;
}

/// Subject of a guarded operation.
///
/// Each view defaults to `None`; a resource overrides the views it
/// supports. A policy requiring a view the subject does not provide is a
/// wiring defect, reported as a configuration error.
pub trait AccessSubject {
    fn as_ownable(&self) -> Option<&dyn Ownable> {
        None
    }

    fn as_participatable(&self) -> Option<&dyn Participatable> {
        None
    }
}

/// Guarded operations with no resource, such as listing, carry this subject.
impl AccessSubject for () {}
