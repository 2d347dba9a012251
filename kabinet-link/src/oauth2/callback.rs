//! Redirect callback orchestration
//!
//! A callback runs through a small state machine:
//!
//! ```text
//! AwaitingCode -> Exchanging -> FetchingResource -> Done
//!      |              |               |
//!      v              v               v
//!   Rejected        Failed          Failed
//! ```
//!
//! `Rejected` is reached before any outbound call (no code, bad state).
//! Exactly one exchange and at most one resource fetch happen per callback,
//! strictly in that order.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::UserPrincipal;
use crate::error::LinkError;
use crate::oauth2::exchange::TokenExchanger;
use crate::oauth2::resource::ResourceClient;
use crate::oauth2::state::StateStore;
use crate::oauth2::token_store::TokenStore;
use crate::oauth2::types::{AccessToken, AuthorizationCode};

/// Phase of a single callback request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    /// Validating the callback query
    AwaitingCode,
    /// Token request in flight
    Exchanging,
    /// Resource request in flight
    FetchingResource,
    /// Resource fetched
    Done,
    /// Refused before any outbound call
    Rejected,
    /// An outbound call failed
    Failed,
}

impl CallbackPhase {
    /// Whether the callback has finished
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::Failed)
    }

    /// Whether `next` is a legal successor of this phase
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingCode, Self::Exchanging | Self::Rejected)
                | (Self::Exchanging, Self::FetchingResource | Self::Failed)
                | (Self::FetchingResource, Self::Done | Self::Failed)
        )
    }
}

/// Query parameters of the redirect callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// State issued with the authorization link
    pub state: Option<String>,
    /// Error code when the user denied access or the request was invalid
    pub error: Option<String>,
    /// Human-readable error detail
    pub error_description: Option<String>,
}

/// Outcome of a successful callback
#[derive(Debug, Clone)]
pub struct CallbackSuccess {
    /// Token obtained from the exchange
    pub token: AccessToken,
    /// Resource fetched with that token, unmodified
    pub resource: Value,
}

/// Tracks and logs phase changes for one callback
struct PhaseTracker {
    user_id: i64,
    phase: CallbackPhase,
}

impl PhaseTracker {
    const fn new(user_id: i64) -> Self {
        Self {
            user_id,
            phase: CallbackPhase::AwaitingCode,
        }
    }

    fn advance(&mut self, next: CallbackPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal callback transition {:?} -> {next:?}",
            self.phase
        );
        tracing::debug!(
            user_id = self.user_id,
            from = ?self.phase,
            to = ?next,
            "OAuth2 callback transition"
        );
        self.phase = next;
    }
}

/// Handles the authorization server's redirect back to this service
#[derive(Clone)]
pub struct CallbackHandler {
    exchanger: TokenExchanger,
    resource: ResourceClient,
    states: Arc<dyn StateStore>,
    tokens: Arc<dyn TokenStore>,
}

impl CallbackHandler {
    /// Create a handler from its collaborators
    #[must_use]
    pub fn new(
        exchanger: TokenExchanger,
        resource: ResourceClient,
        states: Arc<dyn StateStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            exchanger,
            resource,
            states,
            tokens,
        }
    }

    /// Run the callback for `principal`
    ///
    /// The token is saved to the [`TokenStore`] as soon as it is obtained, so
    /// it stays stored even when the resource fetch fails afterwards.
    ///
    /// # Errors
    ///
    /// - [`LinkError::MissingAuthorizationCode`] when `code` is absent or empty
    /// - [`LinkError::StateMismatch`] when `state` does not verify
    /// - [`LinkError::TokenExchange`] or [`LinkError::ResourceFetch`] from the
    ///   outbound calls
    pub async fn handle(
        &self,
        principal: &UserPrincipal,
        params: CallbackParams,
    ) -> Result<CallbackSuccess, LinkError> {
        let mut tracker = PhaseTracker::new(principal.id);

        match self.run(principal, params, &mut tracker).await {
            Ok(success) => {
                tracker.advance(CallbackPhase::Done);
                tracing::info!(user_id = principal.id, "Account linked");
                Ok(success)
            }
            Err(e) => {
                tracker.advance(e.terminal_phase());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        principal: &UserPrincipal,
        params: CallbackParams,
        tracker: &mut PhaseTracker,
    ) -> Result<CallbackSuccess, LinkError> {
        let Some(code) = AuthorizationCode::from_query(params.code.as_deref()) else {
            if let Some(error) = &params.error {
                tracing::warn!(
                    user_id = principal.id,
                    %error,
                    description = params.error_description.as_deref().unwrap_or(""),
                    "Authorization server returned an error"
                );
            } else {
                tracing::warn!(user_id = principal.id, "Callback without authorization code");
            }
            return Err(LinkError::MissingAuthorizationCode);
        };

        let presented = params.state.as_deref().unwrap_or("");
        if presented.is_empty() || !self.states.consume(principal.id, presented).await {
            return Err(LinkError::StateMismatch);
        }

        tracker.advance(CallbackPhase::Exchanging);
        let token = self.exchanger.exchange(&code).await?;

        if let Err(e) = self.tokens.save(principal.id, token.clone()).await {
            tracing::error!(user_id = principal.id, error = %e, "Failed to save access token");
        }

        tracker.advance(CallbackPhase::FetchingResource);
        let resource = self.resource.fetch(&token).await?;

        Ok(CallbackSuccess { token, resource })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::state::InMemoryStateStore;
    use crate::oauth2::token_store::{MockTokenStore, TokenStoreError};
    use crate::oauth2::types::ClientCredentials;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn principal() -> UserPrincipal {
        UserPrincipal::new(7, "Ada")
    }

    fn handler(
        server: &MockServer,
        states: Arc<InMemoryStateStore>,
        tokens: MockTokenStore,
    ) -> CallbackHandler {
        let base = server.uri();
        let exchanger = TokenExchanger::new(
            reqwest::Client::new(),
            Url::parse(&format!("{base}/api/oauth2/access_token")).unwrap(),
            ClientCredentials::new("client".to_string(), "secret".to_string()),
        );
        let resource = ResourceClient::new(
            reqwest::Client::new(),
            Url::parse(&format!("{base}/api/products")).unwrap(),
        );
        CallbackHandler::new(exchanger, resource, states, Arc::new(tokens))
    }

    fn params(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            ..CallbackParams::default()
        }
    }

    async fn mount_token_endpoint(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/api/oauth2/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": token })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_phase_transitions() {
        use CallbackPhase::*;

        assert!(AwaitingCode.can_advance_to(Exchanging));
        assert!(AwaitingCode.can_advance_to(Rejected));
        assert!(Exchanging.can_advance_to(FetchingResource));
        assert!(FetchingResource.can_advance_to(Done));
        assert!(FetchingResource.can_advance_to(Failed));

        assert!(!AwaitingCode.can_advance_to(FetchingResource));
        assert!(!Exchanging.can_advance_to(Rejected));
        assert!(!Done.can_advance_to(Failed));
        assert!(Done.is_terminal() && Rejected.is_terminal() && Failed.is_terminal());
        assert!(!Exchanging.is_terminal());
    }

    #[tokio::test]
    async fn test_missing_code_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let states = Arc::new(InMemoryStateStore::default());
        let state = states.issue(7).await;
        let handler = handler(&server, states, MockTokenStore::new());

        for code in [None, Some("")] {
            let err = handler
                .handle(&principal(), params(code, Some(state.as_str())))
                .await
                .unwrap_err();
            assert!(matches!(err, LinkError::MissingAuthorizationCode));
        }
    }

    #[tokio::test]
    async fn test_denied_authorization_is_rejected() {
        let server = MockServer::start().await;
        let handler = handler(
            &server,
            Arc::new(InMemoryStateStore::default()),
            MockTokenStore::new(),
        );

        let denied = CallbackParams {
            error: Some("access_denied".to_string()),
            ..CallbackParams::default()
        };
        let err = handler.handle(&principal(), denied).await.unwrap_err();
        assert_eq!(err.terminal_phase(), CallbackPhase::Rejected);
    }

    #[tokio::test]
    async fn test_state_mismatch_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let states = Arc::new(InMemoryStateStore::default());
        let issued = states.issue(7).await;
        let handler = handler(&server, states.clone(), MockTokenStore::new());

        let cases = [None, Some(""), Some("arbitraryString")];
        for state in cases {
            let err = handler
                .handle(&principal(), params(Some("abc"), state))
                .await
                .unwrap_err();
            assert!(matches!(err, LinkError::StateMismatch));
        }

        // Issued to user 7, presented by user 8
        let other = UserPrincipal::new(8, "Eve");
        let err = handler
            .handle(&other, params(Some("abc"), Some(issued.as_str())))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::StateMismatch));
    }

    #[tokio::test]
    async fn test_success_saves_token_and_returns_resource() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, "tok123").await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .and(header("authorization", "Bearer tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "products": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut tokens = MockTokenStore::new();
        tokens
            .expect_save()
            .withf(|user_id, token| *user_id == 7 && token.secret() == "tok123")
            .times(1)
            .returning(|_, _| Ok(()));

        let states = Arc::new(InMemoryStateStore::default());
        let state = states.issue(7).await;
        let handler = handler(&server, states.clone(), tokens);

        let success = handler
            .handle(&principal(), params(Some("abc"), Some(state.as_str())))
            .await
            .unwrap();
        assert_eq!(success.token.secret(), "tok123");
        assert_eq!(success.resource, json!({ "products": [] }));

        // State is single use
        let err = handler
            .handle(&principal(), params(Some("abc"), Some(state.as_str())))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::StateMismatch));
    }

    #[tokio::test]
    async fn test_exchange_failure_skips_save_and_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": { "message": "invalid_grant" } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut tokens = MockTokenStore::new();
        tokens.expect_save().never();

        let states = Arc::new(InMemoryStateStore::default());
        let state = states.issue(7).await;
        let handler = handler(&server, states, tokens);

        let err = handler
            .handle(&principal(), params(Some("bad"), Some(state.as_str())))
            .await
            .unwrap_err();
        assert_eq!(err.terminal_phase(), CallbackPhase::Failed);
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_resource_failure_keeps_saved_token() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, "tok123").await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let mut tokens = MockTokenStore::new();
        tokens.expect_save().times(1).returning(|_, _| Ok(()));

        let states = Arc::new(InMemoryStateStore::default());
        let state = states.issue(7).await;
        let handler = handler(&server, states, tokens);

        let err = handler
            .handle(&principal(), params(Some("abc"), Some(state.as_str())))
            .await
            .unwrap_err();
        assert!(matches!(err, LinkError::ResourceFetch { .. }));
    }

    #[tokio::test]
    async fn test_save_failure_does_not_abort() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, "tok123").await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut tokens = MockTokenStore::new();
        tokens
            .expect_save()
            .times(1)
            .returning(|_, _| Err(TokenStoreError::Unavailable("disk full".to_string())));

        let states = Arc::new(InMemoryStateStore::default());
        let state = states.issue(7).await;
        let handler = handler(&server, states, tokens);

        let success = handler
            .handle(&principal(), params(Some("abc"), Some(state.as_str())))
            .await
            .unwrap();
        assert_eq!(success.resource, json!([]));
    }
}
