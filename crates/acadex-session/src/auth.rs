//! Authentication hook for validating a caller's identity.
//!
//! Acadex doesn't implement authentication itself. Identity lives with an
//! external provider, and the [`Authenticator`] trait is the seam: a single
//! async method that takes a bearer token and returns an [`Identity`].
//! The HTTP layer calls it for `/mark-attendance`, and the feed handler calls
//! it during the handshake.

use std::collections::HashMap;
use std::future::Future;

use acadex_protocol::Role;

use crate::SessionError;

/// Who a request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The identity provider's user id (student, teacher, ...).
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Validates a bearer token and returns the caller's identity.
///
/// # Example
///
/// ```rust
/// use acadex_protocol::Role;
/// use acadex_session::{Authenticator, Identity, SessionError};
///
/// /// Treats the token as a student id. Development only.
/// struct TrustingAuthenticator;
///
/// impl Authenticator for TrustingAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
///         if token.is_empty() {
///             return Err(SessionError::AuthFailed("empty token".into()));
///         }
///         Ok(Identity::new(token, Role::Student))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns who it belongs to.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the token is unknown or expired.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// A fixed token table.
///
/// Used by the development binary and by tests. A production deployment
/// plugs the identity provider's verifier in behind [`Authenticator`].
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: accept `token` as `identity`.
    pub fn with_token(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
    }
}
