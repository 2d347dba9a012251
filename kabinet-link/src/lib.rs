//! kabinet-link: connect a web service's users to a Kabinet authorization server
//!
//! The crate implements the client side of the OAuth2 authorization code flow:
//!
//! 1. Render a page with an authorization link bound to a per-user `state`
//!    ([`oauth2::AuthorizationUrlBuilder`])
//! 2. Receive the redirect callback and verify `state`
//!    ([`oauth2::CallbackHandler`])
//! 3. Exchange the one-time code for an access token
//!    ([`oauth2::TokenExchanger`])
//! 4. Call a protected resource with the bearer token
//!    ([`oauth2::ResourceClient`])
//!
//! Sessions and token persistence belong to the surrounding application and
//! are reached through the [`auth::CurrentUser`] extractor and the
//! [`oauth2::TokenStore`] trait.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kabinet_link::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LinkConfig::load_for_service("kabinet-link")?;
//!     let state = AppState::from_config(config)?;
//!
//!     let app = kabinet_link::handlers::router(state);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod oauth2;
pub mod observability;
pub mod state;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use kabinet_link::prelude::*;
    //! ```

    pub use crate::auth::{CurrentUser, UserPrincipal};
    pub use crate::config::{LinkConfig, ResolvedEndpoints};
    pub use crate::error::LinkError;
    pub use crate::oauth2::{
        AccessToken, AuthorizationUrlBuilder, CallbackHandler, CallbackParams, ClientCredentials,
        InMemoryStateStore, InMemoryTokenStore, ResourceClient, StateStore, TokenExchanger,
        TokenStore,
    };
    pub use crate::state::AppState;
}
