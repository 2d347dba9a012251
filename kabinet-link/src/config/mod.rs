//! Configuration management for kabinet-link
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `KABINET_` prefix, `__` for nesting)
//! 2. `./config.toml` (development)
//! 3. `~/.config/kabinet-link/{service}/config.toml` (user config, XDG)
//! 4. `/etc/kabinet-link/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! Environment variable format: `KABINET_SECTION__FIELD_NAME`
//! - Example: `KABINET_CLIENT_SECRET=...`
//! - Example: `KABINET_HTTP__REQUEST_TIMEOUT_MS=3000`
//!
//! # Example Configuration
//!
//! ```toml
//! client_id = "super-service-3000"
//! client_secret = "change-me"
//! home_url = "http://localhost:3000"
//! authorization_server_url = "https://kabinet.example.com"
//!
//! [http]
//! request_timeout_ms = 5000
//! token_request_encoding = "json"
//!
//! [security]
//! state_ttl_secs = 600
//! mask_token = true
//!
//! [logging]
//! filter = "info,kabinet_link=debug"
//! format = "json"
//! ```
//!
//! The four top-level keys are required. A missing or malformed value is a
//! fatal startup error reported by [`LinkConfig::validate`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::LinkError;
use crate::oauth2::urls::join_path;
use crate::oauth2::ClientCredentials;

/// Environment variable prefix
const ENV_PREFIX: &str = "KABINET_";

/// Keys whose environment values are taken verbatim instead of being parsed
/// as TOML-like values, so `KABINET_CLIENT_SECRET=000123` stays `"000123"`
const VERBATIM_ENV_KEYS: &[&str] = &[
    "client_id",
    "client_secret",
    "home_url",
    "authorization_server_url",
    "resource_server_url",
    "service.host",
    "session.user_name",
    "logging.filter",
];

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Interface to bind
    pub host: String,

    /// Port to bind; falls back to the port of `home_url`, then 80
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
        }
    }
}

/// Paths on the authorization server, resource server and this service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Authorization endpoint path on the authorization server
    pub authorize_path: String,

    /// Token endpoint path on the authorization server
    pub token_path: String,

    /// Protected resource path on the resource server
    pub resource_path: String,

    /// Redirect callback path on this service
    pub callback_path: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            authorize_path: crate::oauth2::DEFAULT_AUTHORIZE_PATH.to_string(),
            token_path: "/api/oauth2/access_token".to_string(),
            resource_path: "/api/products".to_string(),
            callback_path: "/oauth2/callback".to_string(),
        }
    }
}

/// Body encoding the token endpoint expects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRequestEncoding {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Total timeout for each outbound call in milliseconds
    pub request_timeout_ms: u64,

    /// Connect timeout for each outbound call in milliseconds
    pub connect_timeout_ms: u64,

    /// Body encoding for the token exchange request
    pub token_request_encoding: TokenRequestEncoding,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
            connect_timeout_ms: 2000,
            token_request_encoding: TokenRequestEncoding::Json,
        }
    }
}

impl HttpSettings {
    /// Request timeout as `Duration`
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Connect timeout as `Duration`
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Lifetime of an issued `state` value in seconds
    pub state_ttl_secs: u64,

    /// Mask the access token on the success page
    pub mask_token: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            state_ttl_secs: 600, // 10 minutes
            mask_token: !cfg!(debug_assertions),
        }
    }
}

impl SecuritySettings {
    /// State lifetime as `Duration`
    #[must_use]
    pub const fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }
}

/// Stub session used by the standalone binary
///
/// Real deployments put their own session middleware in front of the router
/// and disable this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Attach the stub principal to every request
    pub enabled: bool,

    /// Principal id
    pub user_id: i64,

    /// Principal display name
    pub user_name: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            user_id: 1,
            user_name: "Demo User".to_string(),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty in debug builds, JSON in release builds
    #[default]
    Auto,
    /// Multi-line human readable output
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Whether this format emits JSON in the current build
    #[must_use]
    pub const fn is_json(self) -> bool {
        match self {
            Self::Auto => !cfg!(debug_assertions),
            Self::Pretty => false,
            Self::Json => true,
        }
    }
}

/// Logging settings
///
/// `RUST_LOG` still wins over `filter` when set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Output format
    pub format: LogFormat,
}

/// Complete kabinet-link configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LinkConfig {
    /// OAuth2 client id registered with the authorization server
    #[serde(default)]
    pub client_id: String,

    /// OAuth2 client secret
    #[serde(default)]
    pub client_secret: String,

    /// Public base URL of this service
    #[serde(default)]
    pub home_url: String,

    /// Base URL of the authorization server
    #[serde(default)]
    pub authorization_server_url: String,

    /// Base URL of the resource server (defaults to the authorization server)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_server_url: Option<String>,

    /// Listener settings
    #[serde(default)]
    pub service: ServiceSettings,

    /// Endpoint paths
    #[serde(default)]
    pub endpoints: EndpointSettings,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Security settings
    #[serde(default)]
    pub security: SecuritySettings,

    /// Stub session settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Absolute URLs derived from a validated [`LinkConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    /// Authorization server base URL
    pub authorization_base: Url,

    /// Token endpoint
    pub token_url: Url,

    /// Protected resource endpoint
    pub resource_url: Url,

    /// Redirect URI registered with the authorization server
    pub redirect_uri: Url,
}

impl LinkConfig {
    /// Load configuration for a specific service
    ///
    /// Searches for configuration in XDG-compliant locations with precedence:
    /// 1. Environment variables (`KABINET_*`, use `__` for nesting)
    /// 2. `./config.toml`
    /// 3. `~/.config/kabinet-link/{service_name}/config.toml`
    /// 4. `/etc/kabinet-link/{service_name}/config.toml`
    /// 5. Defaults
    ///
    /// The result is not validated; call [`LinkConfig::validate`].
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Self::defaults()?;

        let system_config = PathBuf::from("/etc/kabinet-link")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        let config = Self::merge_env(figment).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Defaults, then the file (if it exists), then `KABINET_*` variables.
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let figment = Self::defaults()?.merge(Toml::file(path));
        let config = Self::merge_env(figment).extract()?;

        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("kabinet-link")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    fn defaults() -> anyhow::Result<Figment> {
        Ok(Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?)))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__").lowercase(true)
    }

    /// Merge `KABINET_*` variables on top of `figment`
    ///
    /// Credentials and URLs are strings even when they look like numbers.
    fn merge_env(figment: Figment) -> Figment {
        let verbatim = Self::env().only(VERBATIM_ENV_KEYS);
        let figment = figment.merge(Self::env().ignore(VERBATIM_ENV_KEYS));

        verbatim.iter().fold(figment, |figment, (key, value)| {
            figment.merge(Serialized::default(key.as_str(), value))
        })
    }

    /// Client credentials as a value type
    #[must_use]
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials::new(self.client_id.clone(), self.client_secret.clone())
    }

    /// Port to bind: explicit setting, then the `home_url` port, then 80
    #[must_use]
    pub fn listen_port(&self) -> u16 {
        self.service
            .port
            .or_else(|| Url::parse(&self.home_url).ok().and_then(|u| u.port()))
            .unwrap_or(80)
    }

    /// Check required values and resolve every URL
    pub fn validate(&self) -> Result<ResolvedEndpoints, LinkError> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("home_url", &self.home_url),
            ("authorization_server_url", &self.authorization_server_url),
        ] {
            if value.trim().is_empty() {
                return Err(LinkError::InvalidConfiguration(format!(
                    "{name} is required"
                )));
            }
        }

        let authorization_base =
            parse_base_url("authorization_server_url", &self.authorization_server_url)?;
        let home = parse_base_url("home_url", &self.home_url)?;
        let resource_base = match &self.resource_server_url {
            Some(url) if !url.trim().is_empty() => parse_base_url("resource_server_url", url)?,
            _ => authorization_base.clone(),
        };

        Ok(ResolvedEndpoints {
            token_url: join_path(&authorization_base, &self.endpoints.token_path)?,
            resource_url: join_path(&resource_base, &self.endpoints.resource_path)?,
            redirect_uri: join_path(&home, &self.endpoints.callback_path)?,
            authorization_base,
        })
    }
}

/// Parse an absolute URL with scheme and host
pub(crate) fn parse_base_url(name: &str, value: &str) -> Result<Url, LinkError> {
    let url = Url::parse(value)
        .map_err(|e| LinkError::InvalidConfiguration(format!("{name} is not a valid URL: {e}")))?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(LinkError::InvalidConfiguration(format!(
            "{name} must be an absolute URL with a host"
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn complete_config() -> LinkConfig {
        LinkConfig {
            client_id: "client".to_string(),
            client_secret: "s3cr3t-value".to_string(),
            home_url: "http://localhost:3000".to_string(),
            authorization_server_url: "https://kabinet.example.com".to_string(),
            ..LinkConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.http.request_timeout_ms, 5000);
        assert_eq!(config.http.token_request_encoding, TokenRequestEncoding::Json);
        assert_eq!(config.security.state_ttl_secs, 600);
        assert_eq!(config.endpoints.callback_path, "/oauth2/callback");
        assert!(config.client_id.is_empty());
    }

    #[test]
    fn test_security_defaults() {
        let security = SecuritySettings::default();

        // Tokens are shown in debug builds, masked in release
        #[cfg(debug_assertions)]
        assert!(!security.mask_token);

        #[cfg(not(debug_assertions))]
        assert!(security.mask_token);
    }

    #[test]
    fn test_validate_resolves_endpoints() {
        let endpoints = complete_config().validate().unwrap();

        assert_eq!(
            endpoints.token_url.as_str(),
            "https://kabinet.example.com/api/oauth2/access_token"
        );
        assert_eq!(
            endpoints.resource_url.as_str(),
            "https://kabinet.example.com/api/products"
        );
        assert_eq!(
            endpoints.redirect_uri.as_str(),
            "http://localhost:3000/oauth2/callback"
        );
    }

    #[test]
    fn test_validate_uses_separate_resource_server() {
        let mut config = complete_config();
        config.resource_server_url = Some("https://api.example.com/v2".to_string());

        let endpoints = config.validate().unwrap();
        assert_eq!(
            endpoints.resource_url.as_str(),
            "https://api.example.com/v2/api/products"
        );
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        let mut config = complete_config();
        config.client_secret = String::new();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, LinkError::InvalidConfiguration(ref m) if m.contains("client_secret")));
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        let mut config = complete_config();
        config.authorization_server_url = "kabinet.example.com".to_string();

        assert!(matches!(
            config.validate(),
            Err(LinkError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_listen_port_fallbacks() {
        let mut config = complete_config();
        assert_eq!(config.listen_port(), 3000);

        config.home_url = "http://localhost".to_string();
        assert_eq!(config.listen_port(), 80);

        config.service.port = Some(8080);
        assert_eq!(config.listen_port(), 8080);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = complete_config().credentials();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("client"));
        assert!(!debug.contains("s3cr3t-value"));
    }

    #[test]
    fn test_load_from_toml_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "kabinet.toml",
                r#"
client_id = "from-file"
client_secret = "file-secret"
home_url = "http://localhost:4000"
authorization_server_url = "https://kabinet.example.com"

[http]
request_timeout_ms = 1500
token_request_encoding = "form"
"#,
            )?;
            jail.set_env("KABINET_CLIENT_SECRET", "env-secret");
            jail.set_env("KABINET_SECURITY__STATE_TTL_SECS", "60");

            let config = LinkConfig::load_from("kabinet.toml").expect("config loads");
            assert_eq!(config.client_id, "from-file");
            assert_eq!(config.client_secret, "env-secret");
            assert_eq!(config.http.request_timeout_ms, 1500);
            assert_eq!(config.http.token_request_encoding, TokenRequestEncoding::Form);
            assert_eq!(config.security.state_ttl_secs, 60);
            assert_eq!(config.endpoints.token_path, "/api/oauth2/access_token");
            Ok(())
        });
    }

    #[test]
    fn test_numeric_env_credentials_stay_strings() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "kabinet.toml",
                r#"
home_url = "http://localhost:3000"
authorization_server_url = "https://kabinet.example.com"
"#,
            )?;
            jail.set_env("KABINET_CLIENT_ID", "12345");
            jail.set_env("KABINET_CLIENT_SECRET", "000123");
            jail.set_env("KABINET_SESSION__USER_NAME", "42");
            jail.set_env("KABINET_SESSION__USER_ID", "7");

            let config = LinkConfig::load_from("kabinet.toml").expect("config loads");
            assert_eq!(config.client_id, "12345");
            assert_eq!(config.client_secret, "000123");
            assert_eq!(config.session.user_name, "42");
            assert_eq!(config.session.user_id, 7);
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_logging_section_from_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "kabinet.toml",
                r#"
[logging]
format = "pretty"
"#,
            )?;
            jail.set_env("KABINET_LOGGING__FILTER", "warn,kabinet_link=debug");

            let config = LinkConfig::load_from("kabinet.toml").expect("config loads");
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(
                config.logging.filter.as_deref(),
                Some("warn,kabinet_link=debug")
            );
            Ok(())
        });
    }

    #[test]
    fn test_log_format_selection() {
        assert!(LogFormat::Json.is_json());
        assert!(!LogFormat::Pretty.is_json());
        assert_eq!(LogFormat::Auto.is_json(), !cfg!(debug_assertions));
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        Jail::expect_with(|_jail| {
            let config = LinkConfig::load_from("missing.toml").expect("defaults load");
            assert_eq!(config.http.request_timeout_ms, 5000);
            assert!(config.validate().is_err());
            Ok(())
        });
    }

    #[test]
    fn test_recommended_path() {
        let path = LinkConfig::recommended_path("test-app");
        let path = path.to_str().unwrap();

        assert!(path.contains("test-app"));
        assert!(path.ends_with("config.toml"));
    }
}
