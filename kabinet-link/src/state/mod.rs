//! Application state shared by all handlers
//!
//! Everything is read-only after startup except the state and token stores,
//! which synchronize internally.

use std::sync::Arc;

use crate::config::{LinkConfig, ResolvedEndpoints};
use crate::error::LinkError;
use crate::oauth2::{
    upstream, AuthorizationUrlBuilder, CallbackHandler, InMemoryStateStore, InMemoryTokenStore,
    ResourceClient, StateStore, TokenExchanger, TokenStore,
};

/// Application state for kabinet-link
///
/// Cheap to clone: every field is behind an [`Arc`].
///
/// # Example
///
/// ```rust,no_run
/// use kabinet_link::{config::LinkConfig, state::AppState};
///
/// # fn example() -> anyhow::Result<()> {
/// let config = LinkConfig::load_for_service("kabinet-link")?;
/// let state = AppState::from_config(config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    config: Arc<LinkConfig>,
    endpoints: Arc<ResolvedEndpoints>,
    authorize: Arc<AuthorizationUrlBuilder>,
    callback: Arc<CallbackHandler>,
    states: Arc<dyn StateStore>,
    tokens: Arc<dyn TokenStore>,
}

impl AppState {
    /// Build state with process-local stores
    ///
    /// Fails when the configuration does not validate or the HTTP client
    /// cannot be built.
    pub fn from_config(config: LinkConfig) -> Result<Self, LinkError> {
        let states = Arc::new(InMemoryStateStore::new(config.security.state_ttl()));
        Self::with_stores(config, states, Arc::new(InMemoryTokenStore::new()))
    }

    /// Build state with application-provided stores
    pub fn with_stores(
        config: LinkConfig,
        states: Arc<dyn StateStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, LinkError> {
        let endpoints = config.validate()?;

        let http = upstream::http_client(&config.http).map_err(|e| {
            LinkError::InvalidConfiguration(format!("failed to build HTTP client: {e}"))
        })?;

        let authorize = AuthorizationUrlBuilder::with_path(
            &endpoints.authorization_base,
            &config.endpoints.authorize_path,
        )?;
        let exchanger =
            TokenExchanger::new(http.clone(), endpoints.token_url.clone(), config.credentials())
                .with_encoding(config.http.token_request_encoding);
        let resource = ResourceClient::new(http, endpoints.resource_url.clone());
        let callback = CallbackHandler::new(exchanger, resource, states.clone(), tokens.clone());

        Ok(Self {
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
            authorize: Arc::new(authorize),
            callback: Arc::new(callback),
            states,
            tokens,
        })
    }

    /// Configuration reference
    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Resolved endpoint URLs
    #[must_use]
    pub fn endpoints(&self) -> &ResolvedEndpoints {
        &self.endpoints
    }

    /// Authorization URL builder
    #[must_use]
    pub fn authorize(&self) -> &AuthorizationUrlBuilder {
        &self.authorize
    }

    /// Callback handler
    #[must_use]
    pub fn callback(&self) -> &CallbackHandler {
        &self.callback
    }

    /// State token store
    #[must_use]
    pub fn states(&self) -> &dyn StateStore {
        self.states.as_ref()
    }

    /// Access token store
    #[must_use]
    pub fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }
}
