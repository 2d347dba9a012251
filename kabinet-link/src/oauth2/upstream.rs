//! Shared handling of authorization and resource server responses

use serde_json::Value;

use crate::config::HttpSettings;

/// Build the HTTP client shared by the token exchanger and resource client
///
/// Redirects are never followed: the client secret and bearer token only go to
/// the configured hosts.
pub fn http_client(settings: &HttpSettings) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(settings.request_timeout())
        .connect_timeout(settings.connect_timeout())
        .build()
}

/// Pull a human-readable error message out of an upstream error body
///
/// Recognized shapes, in order:
/// - `{"error": {"message": ".."}}`
/// - `{"error": "..", "error_description": ".."}` (RFC 6749)
/// - `{"error": ".."}`
/// - `{"message": ".."}`
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    let nested = value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str);
    if let Some(message) = nested {
        return Some(message.to_string());
    }

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Some(
            match value.get("error_description").and_then(Value::as_str) {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            },
        );
    }

    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Describe a transport failure without echoing request details
pub fn transport_message(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "could not connect".to_string()
    } else {
        "request failed".to_string()
    }
}
