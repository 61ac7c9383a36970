//! Auth header injection.

use crate::error::SdkResult;
use crate::link::{BoxFuture, Link, Next, Operation, Response};
use crate::options::{ClientOptions, DeploymentMode};
use crate::storage::TokenStorage;
use std::sync::Arc;
use tracing::debug;

/// Attaches `<header>: <scheme> <token>` to every operation when a token is
/// stored under the configured key.
pub struct AuthLink {
    storage: Arc<dyn TokenStorage>,
    storage_key: String,
    header: String,
    scheme: String,
    log_token: bool,
}

impl AuthLink {
    pub fn new(storage: Arc<dyn TokenStorage>, storage_key: impl Into<String>) -> Self {
        Self {
            storage,
            storage_key: storage_key.into(),
            header: crate::options::DEFAULT_AUTHORIZATION_HEADER.to_string(),
            scheme: crate::options::DEFAULT_AUTHORIZATION_SCHEME.to_string(),
            log_token: false,
        }
    }

    /// Builds the link from client options. Token logging is only honored
    /// outside production.
    pub fn from_options(
        storage: Arc<dyn TokenStorage>,
        options: &ClientOptions,
        mode: DeploymentMode,
    ) -> Self {
        Self::new(storage, options.token_storage_key.clone())
            .header(options.authorization_header.clone())
            .scheme(options.authorization_scheme.clone())
            .log_token(options.log_token && !mode.is_production())
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn log_token(mut self, log: bool) -> Self {
        self.log_token = log;
        self
    }

    /// The header value for the currently stored token, if any.
    pub fn authorization(&self) -> Option<String> {
        let token = self.storage.get_item(&self.storage_key)?;
        if token.is_empty() {
            return None;
        }
        if self.log_token {
            debug!(
                key = %self.storage_key,
                "using jwt token {} for graphql client",
                mask_token(&token)
            );
        }
        Some(format!("{} {}", self.scheme, token))
    }
}

impl Link for AuthLink {
    fn request(
        &self,
        mut operation: Operation,
        forward: Next,
    ) -> BoxFuture<'static, SdkResult<Response>> {
        if let Some(value) = self.authorization() {
            operation.set_header(self.header.clone(), value);
        }
        forward(operation)
    }
}

/// Keeps the first four characters of a token.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() > 4 {
        format!("{}…", visible)
    } else {
        "…".to_string()
    }
}
