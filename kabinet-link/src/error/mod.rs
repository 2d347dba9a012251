//! Error types and their HTTP mapping
//!
//! Every failure of the authorization flow ends up here and is turned into a
//! status code by [`IntoResponse`]. Messages shown to the browser never carry
//! the access token or the client secret.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reqwest::StatusCode as UpstreamStatus;
use thiserror::Error;

use crate::oauth2::CallbackPhase;

/// Message returned for every rejected callback
pub const REJECTION_MESSAGE: &str = "Authorization request rejected";

/// Framework error type
#[derive(Debug, Error)]
pub enum LinkError {
    /// Malformed URL or missing configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The callback arrived without an authorization code
    #[error("Authorization code missing from callback")]
    MissingAuthorizationCode,

    /// The `state` parameter is missing, unknown, expired, or issued to another user
    #[error("OAuth2 state mismatch")]
    StateMismatch,

    /// The authorization server rejected or failed to process the code
    #[error("Token exchange failed: {message}")]
    TokenExchange {
        /// Upstream HTTP status, when a response was received
        status: Option<UpstreamStatus>,
        /// Upstream error message, or a generic one
        message: String,
    },

    /// The protected resource call failed after a token was obtained
    #[error("Resource fetch failed: {message}")]
    ResourceFetch {
        /// Upstream HTTP status, when a response was received
        status: Option<UpstreamStatus>,
        /// Upstream error message, or a generic one
        message: String,
    },

    /// No principal was attached to the request by the session layer
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Page rendering failed
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl LinkError {
    /// Build a token exchange error
    pub fn token_exchange(status: Option<UpstreamStatus>, message: impl Into<String>) -> Self {
        Self::TokenExchange {
            status,
            message: message.into(),
        }
    }

    /// Build a resource fetch error
    pub fn resource_fetch(status: Option<UpstreamStatus>, message: impl Into<String>) -> Self {
        Self::ResourceFetch {
            status,
            message: message.into(),
        }
    }

    /// Terminal callback phase this error leads to
    #[must_use]
    pub const fn terminal_phase(&self) -> CallbackPhase {
        match self {
            Self::MissingAuthorizationCode | Self::StateMismatch | Self::Unauthenticated => {
                CallbackPhase::Rejected
            }
            _ => CallbackPhase::Failed,
        }
    }

    /// HTTP status used when this error reaches the browser
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuthorizationCode | Self::StateMismatch => StatusCode::FORBIDDEN,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidConfiguration(_)
            | Self::TokenExchange { .. }
            | Self::ResourceFetch { .. }
            | Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            Self::MissingAuthorizationCode | Self::StateMismatch => REJECTION_MESSAGE.to_string(),
            Self::Unauthenticated => "You must be signed in to link your account".to_string(),
            Self::TokenExchange { message, .. } | Self::ResourceFetch { message, .. } => message,
            Self::InvalidConfiguration(detail) => {
                tracing::error!(%detail, "Configuration error while handling request");
                "Service is misconfigured".to_string()
            }
            Self::Template(e) => {
                tracing::error!(error = %e, "Failed to render page");
                "Failed to render page".to_string()
            }
        };

        (status, message).into_response()
    }
}
