//! Client configuration.
//!
//! [`ClientOptions`] is the record the client factory consumes. It can be
//! built fluently, deserialized from JSON, or read from environment variables.

use crate::error::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default storage key for the persisted auth token.
pub const DEFAULT_TOKEN_STORAGE_KEY: &str = "jwt_token";
/// Default name of the auth header.
pub const DEFAULT_AUTHORIZATION_HEADER: &str = "Authorization";
/// Default auth scheme prefix.
pub const DEFAULT_AUTHORIZATION_SCHEME: &str = "Bearer";

/// Environment variable names understood by [`ClientOptions::from_vars`].
pub mod env {
    pub const TOKEN_STORAGE_KEY: &str = "LOCAL_STORAGE_JWT_TOKEN_KEY";
    pub const PRODUCTION_ENDPOINT: &str = "GRAPHQL_PRODUCTION_ENDPOINT";
    pub const TESTING_ENDPOINT: &str = "GRAPHQL_TESTING_ENDPOINT";
    pub const MOCKING_ENDPOINT: &str = "GRAPHQL_MOCKING_ENDPOINT";
    pub const AUTHORIZATION_HEADER: &str = "AUTHORIZATION_HEADER";
    pub const AUTHORIZATION_SCHEME: &str = "AUTHORIZATION_SCHEME";
    pub const MOCKING: &str = "GRAPHQL_MOCKING";
    pub const ALERT_ON_ERROR: &str = "GRAPHQL_ALERT_ON_ERROR";
    pub const DISABLE_CACHING: &str = "GRAPHQL_DISABLE_CACHING";
}

/// Deployment mode of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Production,
    #[default]
    Development,
}

impl DeploymentMode {
    /// Returns true for production.
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = std::convert::Infallible;

    /// Only `production` selects production; any other value is development.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("production") {
            Ok(Self::Production)
        } else {
            Ok(Self::Development)
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options recognized by the client factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientOptions {
    /// Storage key under which the auth token is persisted.
    pub token_storage_key: String,
    pub production_endpoint: String,
    pub testing_endpoint: String,
    pub mocking_endpoint: String,
    /// Name of the header carrying the token.
    pub authorization_header: String,
    /// Scheme prefix placed before the token.
    pub authorization_scheme: String,
    /// Route every request to the mocking endpoint.
    pub mocking: bool,
    /// Surface GraphQL errors through a blocking alert instead of the error log.
    pub alert_on_error: bool,
    /// Bypass the cache for queries and watched queries.
    pub disable_caching: bool,
    /// Log the token at debug level in development mode.
    pub log_token: bool,
    /// Transport timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            token_storage_key: DEFAULT_TOKEN_STORAGE_KEY.to_string(),
            production_endpoint: String::new(),
            testing_endpoint: String::new(),
            mocking_endpoint: String::new(),
            authorization_header: DEFAULT_AUTHORIZATION_HEADER.to_string(),
            authorization_scheme: DEFAULT_AUTHORIZATION_SCHEME.to_string(),
            mocking: false,
            alert_on_error: true,
            disable_caching: true,
            log_token: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientOptions {
    /// Creates options with the three candidate endpoints.
    pub fn new(
        production: impl Into<String>,
        testing: impl Into<String>,
        mocking: impl Into<String>,
    ) -> Self {
        Self {
            production_endpoint: production.into(),
            testing_endpoint: testing.into(),
            mocking_endpoint: mocking.into(),
            ..Default::default()
        }
    }

    pub fn token_storage_key(mut self, key: impl Into<String>) -> Self {
        self.token_storage_key = key.into();
        self
    }

    pub fn authorization_header(mut self, name: impl Into<String>) -> Self {
        self.authorization_header = name.into();
        self
    }

    pub fn authorization_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.authorization_scheme = scheme.into();
        self
    }

    pub fn mocking(mut self, mocking: bool) -> Self {
        self.mocking = mocking;
        self
    }

    pub fn alert_on_error(mut self, alert: bool) -> Self {
        self.alert_on_error = alert;
        self
    }

    pub fn disable_caching(mut self, disable: bool) -> Self {
        self.disable_caching = disable;
        self
    }

    pub fn log_token(mut self, log: bool) -> Self {
        self.log_token = log;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parses options from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> SdkResult<Self> {
        serde_json::from_str(json).map_err(|e| SdkError::config(format!("Invalid options: {}", e)))
    }

    /// Reads options from the process environment.
    pub fn from_env() -> SdkResult<Self> {
        Self::default().merge_vars(std::env::vars())
    }

    /// Applies recognized variables on top of the defaults.
    pub fn from_vars<I, K, V>(vars: I) -> SdkResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::default().merge_vars(vars)
    }

    /// Applies recognized variables on top of `self`. Unknown names are ignored.
    pub fn merge_vars<I, K, V>(mut self, vars: I) -> SdkResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                env::TOKEN_STORAGE_KEY => self.token_storage_key = value,
                env::PRODUCTION_ENDPOINT => self.production_endpoint = value,
                env::TESTING_ENDPOINT => self.testing_endpoint = value,
                env::MOCKING_ENDPOINT => self.mocking_endpoint = value,
                env::AUTHORIZATION_HEADER => self.authorization_header = value,
                env::AUTHORIZATION_SCHEME => self.authorization_scheme = value,
                env::MOCKING => self.mocking = parse_flag(env::MOCKING, &value)?,
                env::ALERT_ON_ERROR => {
                    self.alert_on_error = parse_flag(env::ALERT_ON_ERROR, &value)?
                }
                env::DISABLE_CACHING => {
                    self.disable_caching = parse_flag(env::DISABLE_CACHING, &value)?
                }
                _ => {}
            }
        }
        Ok(self)
    }
}

fn parse_flag(name: &str, value: &str) -> SdkResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SdkError::config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Picks the endpoint the client talks to.
///
/// Mocking wins regardless of mode; otherwise production mode selects the
/// production endpoint and every other mode the testing endpoint.
pub fn select_endpoint(options: &ClientOptions, mode: DeploymentMode) -> &str {
    if options.mocking {
        &options.mocking_endpoint
    } else if mode.is_production() {
        &options.production_endpoint
    } else {
        &options.testing_endpoint
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
