//! Authorization code exchange
//!
//! Performs the single server-to-server `POST` that trades an authorization
//! code for an access token. There is no retry: codes are single-use, so a
//! second attempt with the same code can never succeed.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::TokenRequestEncoding;
use crate::error::LinkError;
use crate::oauth2::types::{AccessToken, AuthorizationCode, ClientCredentials};
use crate::oauth2::upstream;

/// Token endpoint request body
#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// Token endpoint response; only `access_token` is read
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchanges authorization codes at one token endpoint
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_url: Url,
    credentials: ClientCredentials,
    encoding: TokenRequestEncoding,
}

impl TokenExchanger {
    /// Create an exchanger
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client (carries the timeouts)
    /// * `token_url` - Token endpoint URL
    /// * `credentials` - Client credentials sent with every exchange
    #[must_use]
    pub const fn new(http: reqwest::Client, token_url: Url, credentials: ClientCredentials) -> Self {
        Self {
            http,
            token_url,
            credentials,
            encoding: TokenRequestEncoding::Json,
        }
    }

    /// Send the request body form-encoded or as JSON
    #[must_use]
    pub const fn with_encoding(mut self, encoding: TokenRequestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Token endpoint URL
    #[must_use]
    pub const fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Exchange `code` for an access token
    ///
    /// The code is sent exactly as received. The returned token is the
    /// `access_token` string from the response, unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::TokenExchange`] if the request fails, the server
    /// answers with a non-success status, or the response has no usable
    /// `access_token`. The upstream error message is carried when present.
    pub async fn exchange(&self, code: &AuthorizationCode) -> Result<AccessToken, LinkError> {
        let body = TokenRequest {
            client_id: &self.credentials.client_id,
            client_secret: &self.credentials.client_secret,
            code: code.as_str(),
        };

        let request = self.http.post(self.token_url.clone());
        let request = match self.encoding {
            TokenRequestEncoding::Json => request.json(&body),
            TokenRequestEncoding::Form => request.form(&body),
        };

        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, endpoint = %self.token_url, "Token request failed");
            LinkError::token_exchange(
                None,
                format!("token endpoint {}", upstream::transport_message(&e)),
            )
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::warn!(error = %e, %status, "Failed to read token response");
            LinkError::token_exchange(Some(status), "failed to read token response")
        })?;

        if !status.is_success() {
            let message = upstream::error_message(&text)
                .unwrap_or_else(|| format!("token endpoint returned HTTP {status}"));
            tracing::warn!(%status, %message, "Token endpoint rejected authorization code");
            return Err(LinkError::token_exchange(Some(status), message));
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|_| {
            LinkError::token_exchange(Some(status), "malformed token response")
        })?;

        match parsed.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => {
                let message = upstream::error_message(&text)
                    .unwrap_or_else(|| "token response did not contain an access_token".to_string());
                tracing::warn!(%status, %message, "Token response without access_token");
                Err(LinkError::token_exchange(Some(status), message))
            }
        }
    }
}
