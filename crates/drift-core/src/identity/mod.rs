//! Identity gating for sync and remote mutations.
//!
//! Sign-in and sign-out are external flows; the engine only observes whether
//! an identity is currently present.

use serde::{Deserialize, Serialize};

/// An authenticated identity as resolved by the external auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Resolves the current authenticated identity, or none.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in identity, if any. Absence is not an error; it routes
    /// mutations to local-only behavior.
    fn current_identity(&self) -> Option<Identity>;
}

/// Identity provider backed by a value fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    identity: Option<Identity>,
}

impl StaticIdentityProvider {
    #[must_use]
    pub const fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self { identity: None }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_reports_fixed_identity() {
        let provider = StaticIdentityProvider::signed_in(Identity::new("u-1"));
        assert_eq!(provider.current_identity().unwrap().id, "u-1");
        assert!(StaticIdentityProvider::signed_out()
            .current_identity()
            .is_none());
    }
}
