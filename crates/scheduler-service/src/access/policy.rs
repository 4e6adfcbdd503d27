//! Access policies declared by guarded operations.

use std::fmt;

/// Capability a policy checks on its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Caller's username must own the subject.
    Ownable,
    /// Caller's user id must be a participant of the subject.
    Participatable,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Ownable => "ownable",
            Capability::Participatable => "participatable",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required capability plus whether admins skip the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub required_capability: Capability,
    pub allow_admin: bool,
}

impl AccessPolicy {
    pub const fn ownership() -> Self {
        Self {
            required_capability: Capability::Ownable,
            allow_admin: false,
        }
    }

    pub const fn participation() -> Self {
        Self {
            required_capability: Capability::Participatable,
            allow_admin: false,
        }
    }

    pub const fn with_admin_bypass(self) -> Self {
        Self {
            allow_admin: true,
            ..self
        }
    }

    /// Ownership check with the admin bypass set from `allow_admin`.
    pub const fn ownership_with(allow_admin: bool) -> Self {
        Self {
            required_capability: Capability::Ownable,
            allow_admin,
        }
    }
}
