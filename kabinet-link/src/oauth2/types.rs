//! Core OAuth2 value types
//!
//! Credentials and tokens are secrets: their `Debug` output is redacted so they
//! can sit inside structs that get logged.

use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "[REDACTED]";

/// OAuth2 client credentials, loaded once at startup
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
}

impl ClientCredentials {
    /// Create credentials from an id and secret
    #[must_use]
    pub const fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &REDACTED)
            .finish()
    }
}

/// Opaque bearer credential returned by the token endpoint
///
/// The value is never decoded or inspected.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token string
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token, for the `Authorization` header and persistence
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Display form that hides all but the last four characters
    ///
    /// Tokens of eight characters or fewer are hidden entirely.
    #[must_use]
    pub fn masked(&self) -> String {
        let chars = self.0.chars().count();
        if chars <= 8 {
            return "*".repeat(chars.max(4));
        }

        let tail: String = self.0.chars().skip(chars - 4).collect();
        format!("{}{tail}", "*".repeat(chars - 4))
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&REDACTED).finish()
    }
}

/// Single-use code issued by the authorization server
///
/// Carried exactly as it arrived in the callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    /// Accept a code from the callback; empty values are treated as absent
    #[must_use]
    pub fn from_query(code: Option<&str>) -> Option<Self> {
        code.filter(|c| !c.is_empty()).map(|c| Self(c.to_string()))
    }

    /// The code as received
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
