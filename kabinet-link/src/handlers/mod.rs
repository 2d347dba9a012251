//! HTTP handlers and router
//!
//! - `GET /` renders the authorization link for the signed-in user
//! - `GET <callback_path>` completes the flow
//! - `GET /health/live` liveness probe

use askama::Template;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::auth::{CurrentUser, UserPrincipal};
use crate::error::LinkError;
use crate::health;
use crate::observability;
use crate::oauth2::{AccessToken, CallbackParams};
use crate::state::AppState;

/// Home page with the authorization link
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    user_name: &'a str,
    authorize_url: &'a str,
    linked: bool,
}

/// Page shown to browsers after a successful callback
#[derive(Template)]
#[template(path = "linked.html")]
struct LinkedTemplate<'a> {
    user_name: &'a str,
    access_token: &'a str,
    resource: &'a str,
}

/// JSON body returned after a successful callback
#[derive(Debug, Serialize)]
pub struct LinkedPayload {
    /// User the token was issued for
    pub user: UserPrincipal,
    /// Access token, masked when `security.mask_token` is set
    pub access_token: String,
    /// Resource fetched with the token
    pub resource: Value,
}

/// Build the application router
///
/// The callback route is mounted at `endpoints.callback_path` so that it
/// matches the redirect URI sent to the authorization server.
pub fn router(state: AppState) -> Router {
    let callback_path = format!(
        "/{}",
        state.config().endpoints.callback_path.trim_start_matches('/')
    );

    Router::new()
        .route("/", get(index))
        .route(&callback_path, get(oauth2_callback))
        .route("/health/live", get(health::liveness))
        .layer(TraceLayer::new_for_http().make_span_with(observability::request_span))
        .with_state(state)
}

/// Render the home page
///
/// Issues a fresh `state` bound to the current user on every view.
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, LinkError> {
    let issued = state.states().issue(user.id).await;
    let authorize_url = state.authorize().build(
        &state.config().client_id,
        &state.endpoints().redirect_uri,
        issued.as_str(),
    )?;

    let linked = match state.tokens().load(user.id).await {
        Ok(token) => token.is_some(),
        Err(e) => {
            tracing::warn!(user_id = user.id, error = %e, "Failed to load access token");
            false
        }
    };

    let page = IndexTemplate {
        user_name: &user.name,
        authorize_url: authorize_url.as_str(),
        linked,
    };

    Ok(Html(page.render()?))
}

/// Complete the authorization flow
///
/// Browsers (`Accept: text/html`) get a rendered page, other clients get
/// [`LinkedPayload`] as JSON. A query that cannot be parsed, such as one with
/// a repeated `code`, is rejected like a missing code.
pub async fn oauth2_callback(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> Result<Response, LinkError> {
    // Repeated or malformed parameters never reach the authorization server
    let Query(params) = query.map_err(|e| {
        tracing::warn!(user_id = user.id, error = %e, "Malformed callback query");
        LinkError::MissingAuthorizationCode
    })?;

    let success = state.callback().handle(&user, params).await?;
    let access_token = display_token(&success.token, state.config().security.mask_token);

    if wants_html(&headers) {
        let resource = serde_json::to_string_pretty(&success.resource)
            .unwrap_or_else(|_| success.resource.to_string());
        let page = LinkedTemplate {
            user_name: &user.name,
            access_token: &access_token,
            resource: &resource,
        };
        return Ok(Html(page.render()?).into_response());
    }

    Ok(Json(LinkedPayload {
        user,
        access_token,
        resource: success.resource,
    })
    .into_response())
}

fn display_token(token: &AccessToken, mask: bool) -> String {
    if mask {
        token.masked()
    } else {
        token.secret().to_string()
    }
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}
