//! Authenticated principal for request handlers
//!
//! Sessions are owned by the surrounding application. Its middleware places a
//! [`UserPrincipal`] into the request extensions; handlers receive it through
//! the [`CurrentUser`] extractor.
//!
//! ```rust,no_run
//! use kabinet_link::auth::CurrentUser;
//!
//! async fn whoami(CurrentUser(user): CurrentUser) -> String {
//!     format!("Hello, {}!", user.name)
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// The signed-in user, as supplied by the session layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrincipal {
    /// Stable user id; tokens and state are keyed by it
    pub id: i64,
    /// Display name
    pub name: String,
}

impl UserPrincipal {
    /// Create a principal
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Extractor for the current [`UserPrincipal`]
///
/// Rejects with [`LinkError::Unauthenticated`] (401) when no principal was
/// attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserPrincipal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = LinkError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserPrincipal>()
            .cloned()
            .map(Self)
            .ok_or(LinkError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_extracts_principal_from_extensions() {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        request
            .extensions_mut()
            .insert(UserPrincipal::new(42, "Ada"));
        let (mut parts, ()) = request.into_parts();

        let CurrentUser(user) = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(user, UserPrincipal::new(42, "Ada"));
    }

    #[tokio::test]
    async fn test_missing_principal_is_unauthenticated() {
        let (mut parts, ()) = Request::builder().uri("/").body(()).unwrap().into_parts();

        let err = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::Unauthenticated));
    }
}
