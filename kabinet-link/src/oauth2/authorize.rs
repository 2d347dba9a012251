//! Authorization URL construction
//!
//! Builds the link that sends the browser to the authorization server:
//! `<base>/api/oauth2/authorize?client_id=..&redirect_uri=..&state=..`.

use url::Url;

use crate::config::parse_base_url;
use crate::error::LinkError;
use crate::oauth2::urls::join_path;

/// Path of the authorization endpoint relative to the server base URL
pub const DEFAULT_AUTHORIZE_PATH: &str = "/api/oauth2/authorize";

/// Builds authorization URLs against one authorization server
///
/// Pure: building a URL has no side effects.
#[derive(Debug, Clone)]
pub struct AuthorizationUrlBuilder {
    endpoint: Url,
}

impl AuthorizationUrlBuilder {
    /// Create a builder for `base` using [`DEFAULT_AUTHORIZE_PATH`]
    pub fn new(base: &Url) -> Result<Self, LinkError> {
        Self::with_path(base, DEFAULT_AUTHORIZE_PATH)
    }

    /// Create a builder for `base` with a custom authorization path
    pub fn with_path(base: &Url, path: &str) -> Result<Self, LinkError> {
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(LinkError::InvalidConfiguration(format!(
                "authorization server URL {base} must be absolute with a host"
            )));
        }

        Ok(Self {
            endpoint: join_path(base, path)?,
        })
    }

    /// Authorization endpoint without query parameters
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the authorization URL
    ///
    /// Any query on the base URL is replaced. Values are percent-encoded.
    pub fn build(&self, client_id: &str, redirect_uri: &Url, state: &str) -> Result<Url, LinkError> {
        if state.is_empty() {
            return Err(LinkError::InvalidConfiguration(
                "state must not be empty".to_string(),
            ));
        }

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri.as_str())
            .append_pair("state", state);

        Ok(url)
    }
}

/// Build an authorization URL from string inputs
///
/// Fails with [`LinkError::InvalidConfiguration`] when either URL is malformed
/// or `state` is empty.
pub fn build(
    base_auth_server_url: &str,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<Url, LinkError> {
    let base = parse_base_url("authorization server URL", base_auth_server_url)?;
    let redirect_uri = parse_base_url("redirect URI", redirect_uri)?;

    AuthorizationUrlBuilder::new(&base)?.build(client_id, &redirect_uri, state)
}
