//! OAuth2 authorization code flow, client side
//!
//! Leaf-first:
//! - [`AuthorizationUrlBuilder`] builds the link to the authorization server
//! - [`TokenExchanger`] trades the callback code for an access token
//! - [`ResourceClient`] calls the protected API with that token
//! - [`CallbackHandler`] runs the callback, verifying `state` and persisting
//!   the token through a [`TokenStore`]

pub mod authorize;
pub mod callback;
pub mod exchange;
pub mod resource;
pub mod state;
pub mod token_store;
pub mod types;
pub mod upstream;
pub mod urls;

pub use authorize::{AuthorizationUrlBuilder, DEFAULT_AUTHORIZE_PATH};
pub use callback::{CallbackHandler, CallbackParams, CallbackPhase, CallbackSuccess};
pub use exchange::TokenExchanger;
pub use resource::ResourceClient;
pub use state::{
    InMemoryStateStore, StateStore, StateToken, DEFAULT_MAX_PENDING_PER_PRINCIPAL, DEFAULT_STATE_TTL,
};
pub use token_store::{InMemoryTokenStore, TokenStore, TokenStoreError};
pub use types::{AccessToken, AuthorizationCode, ClientCredentials};
