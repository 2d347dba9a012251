//! Logging and request tracing
//!
//! Filter precedence: `RUST_LOG`, then `logging.filter`, then a build-dependent
//! default. Every HTTP request runs inside a `request` span carrying a
//! `request_id`, taken from `x-request-id` when the caller sent a usable one.

use axum::http::Request;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Header carrying a caller-supplied request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is accepted
const MAX_REQUEST_ID_LEN: usize = 64;

/// Initialize logging from `settings`
///
/// Fails if the configured filter does not parse or a global subscriber is
/// already installed.
///
/// # Example
///
/// ```rust,no_run
/// use kabinet_link::config::LoggingSettings;
/// use kabinet_link::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init(&LoggingSettings::default())?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = build_filter(rust_log.as_deref(), settings.filter.as_deref())?;
    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.format.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

/// Pick the filter directives
///
/// An unparsable `RUST_LOG` falls through to the configured filter; an
/// unparsable configured filter is an error.
fn build_filter(rust_log: Option<&str>, configured: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }

    match configured {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("invalid logging.filter {directives:?}: {e}")),
        None => Ok(default_filter()),
    }
}

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("debug,kabinet_link=trace")
    } else {
        EnvFilter::new("info")
    }
}

/// Span for one HTTP request, used by the router's trace layer
pub fn request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id(request),
    )
}

fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_REQUEST_ID_LEN
                && id
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
        .map_or_else(|| format!("{:016x}", rand::random::<u64>()), str::to_string)
}
