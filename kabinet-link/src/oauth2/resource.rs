//! Protected resource access
//!
//! One authenticated `GET` against the resource server using the bearer token
//! obtained from the exchange.

use serde_json::Value;
use url::Url;

use crate::error::LinkError;
use crate::oauth2::types::AccessToken;
use crate::oauth2::upstream;

/// Fetches a JSON resource on behalf of a user
#[derive(Debug, Clone)]
pub struct ResourceClient {
    http: reqwest::Client,
    resource_url: Url,
}

impl ResourceClient {
    /// Create a client for `resource_url`
    #[must_use]
    pub const fn new(http: reqwest::Client, resource_url: Url) -> Self {
        Self { http, resource_url }
    }

    /// Resource URL this client reads
    #[must_use]
    pub const fn resource_url(&self) -> &Url {
        &self.resource_url
    }

    /// Fetch the resource with `Authorization: Bearer <token>`
    ///
    /// Returns the response body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ResourceFetch`] on transport failure, a non-success
    /// status, or a body that is not JSON.
    pub async fn fetch(&self, token: &AccessToken) -> Result<Value, LinkError> {
        let response = self
            .http
            .get(self.resource_url.clone())
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, endpoint = %self.resource_url, "Resource request failed");
                LinkError::resource_fetch(
                    None,
                    format!("resource server {}", upstream::transport_message(&e)),
                )
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::warn!(error = %e, %status, "Failed to read resource response");
            LinkError::resource_fetch(Some(status), "failed to read resource response")
        })?;

        if !status.is_success() {
            let message = upstream::error_message(&text)
                .unwrap_or_else(|| format!("resource server returned HTTP {status}"));
            tracing::warn!(%status, %message, "Resource server rejected request");
            return Err(LinkError::resource_fetch(Some(status), message));
        }

        serde_json::from_str(&text)
            .map_err(|_| LinkError::resource_fetch(Some(status), "resource is not valid JSON"))
    }
}
