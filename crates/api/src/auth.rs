//! Actor identity extraction and role checks
//!
//! Credential verification happens upstream (the authenticating gateway);
//! this module only reads the forwarded identity headers and enforces role
//! requirements before mutating operations run.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

/// Role forwarded for the authenticated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Viewer,
    Support,
    Admin,
}

impl ActorRole {
    /// Permission level for this role (higher = more permissions)
    pub fn level(&self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Support => 1,
            Self::Admin => 2,
        }
    }

    /// Whether this role may run ticket lifecycle mutations
    pub fn can_mutate(&self) -> bool {
        self.level() >= 1
    }

    /// Parse a role from string (case insensitive, unknown roles become viewer)
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Self::Admin,
            "support" => Self::Support,
            _ => Self::Viewer,
        }
    }
}

/// The authenticated actor on whose behalf a request runs
#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    /// Require a role allowed to mutate tickets
    pub fn require_support(&self) -> Result<(), ApiError> {
        if self.role.can_mutate() {
            Ok(())
        } else {
            tracing::warn!(actor = %self.name, "actor lacks support role for mutating operation");
            Err(ApiError::Forbidden)
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get("x-actor")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::Unauthorized)?
            .to_string();

        let role = parts
            .headers
            .get("x-actor-role")
            .and_then(|v| v.to_str().ok())
            .map(ActorRole::from_str_lossy)
            .unwrap_or(ActorRole::Viewer);

        Ok(Actor { name, role })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_levels() {
        assert_eq!(ActorRole::Viewer.level(), 0);
        assert_eq!(ActorRole::Support.level(), 1);
        assert_eq!(ActorRole::Admin.level(), 2);
    }

    #[test]
    fn test_role_can_mutate() {
        assert!(!ActorRole::Viewer.can_mutate());
        assert!(ActorRole::Support.can_mutate());
        assert!(ActorRole::Admin.can_mutate());
    }

    #[test]
    fn test_role_from_str_lossy() {
        assert_eq!(ActorRole::from_str_lossy("ADMIN"), ActorRole::Admin);
        assert_eq!(ActorRole::from_str_lossy("support"), ActorRole::Support);
        assert_eq!(ActorRole::from_str_lossy("unknown"), ActorRole::Viewer);
    }

    #[test]
    fn test_require_support() {
        let viewer = Actor {
            name: "v".to_string(),
            role: ActorRole::Viewer,
        };
        assert!(viewer.require_support().is_err());

        let support = Actor {
            name: "s".to_string(),
            role: ActorRole::Support,
        };
        assert!(support.require_support().is_ok());
    }
}
