//! Who owns the plans being read or written.

use async_trait::async_trait;
use thiserror::Error;

pub const ANONYMOUS_USER: &str = "anonymous";

const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("no authenticated user")]
    Unauthenticated,

    #[error("invalid user id {0:?}")]
    Invalid(String),
}

/// Source of the current user's id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_id(&self) -> Result<String, IdentityError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn IdentityProvider) {}
};

/// Everyone is the same anonymous user.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn user_id(&self) -> Result<String, IdentityError> {
        Ok(ANONYMOUS_USER.to_string())
    }
}

/// A user id established elsewhere (request header, CLI flag).
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    user_id: String,
}

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Result<Self, IdentityError> {
        let user_id = user_id.into();
        validate_user_id(&user_id)?;
        Ok(Self { user_id })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn user_id(&self) -> Result<String, IdentityError> {
        Ok(self.user_id.clone())
    }
}

/// Ids are path-like segments: non-empty, bounded, `[A-Za-z0-9._@-]`.
pub fn validate_user_id(id: &str) -> Result<(), IdentityError> {
    let ok = !id.is_empty()
        && id.len() <= MAX_USER_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if ok {
        Ok(())
    } else {
        Err(IdentityError::Invalid(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anonymous_user() {
        assert_eq!(AnonymousIdentity.user_id().await.unwrap(), "anonymous");
    }

    #[tokio::test]
    async fn static_identity_returns_its_id() {
        let id = StaticIdentity::new("user-42@example.com").unwrap();
        assert_eq!(id.user_id().await.unwrap(), "user-42@example.com");
    }

    #[test]
    fn rejects_bad_ids() {
        let long = "x".repeat(129);
        for bad in ["", "a/b", "has space", long.as_str()] {
            assert_eq!(
                StaticIdentity::new(bad).unwrap_err(),
                IdentityError::Invalid(bad.to_string())
            );
        }
    }
}
