use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::errors::EngineError;

/// Header carrying the caller's user id, set by the identity provider's proxy
/// after it has verified the session.
pub const USER_HEADER: &str = "x-urbindex-user";

/// Identity of the caller for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    user: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A blank id is treated as anonymous.
    pub fn user(id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            user: (!id.is_empty()).then_some(id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn require_user(&self) -> Result<&str, EngineError> {
        self.current_user().ok_or(EngineError::NotAuthenticated)
    }
}

/// Never rejects: a missing header yields an anonymous context and the
/// engine decides what an anonymous caller may do.
#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(AuthContext::user)
            .unwrap_or_else(AuthContext::anonymous);
        if !auth.is_authenticated() {
            debug!("Anonymous request to {}", parts.uri.path());
        }
        Ok(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_user_is_anonymous() {
        assert!(!AuthContext::user("   ").is_authenticated());
    }

    #[test]
    fn test_user_id_is_trimmed() {
        assert_eq!(AuthContext::user(" alice ").current_user(), Some("alice"));
    }

    #[test]
    fn test_anonymous_cannot_require_user() {
        assert!(matches!(
            AuthContext::anonymous().require_user(),
            Err(EngineError::NotAuthenticated)
        ));
    }
}
