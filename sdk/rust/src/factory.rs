//! Client factory.

use crate::alert::{Alerter, ErrorLink, StderrAlerter};
use crate::auth::AuthLink;
use crate::cache::InMemoryCache;
use crate::client::GraphqlClient;
use crate::error::SdkResult;
use crate::http::HttpTransport;
use crate::link::{Link, LinkChain, Transport};
use crate::options::{select_endpoint, ClientOptions, DeploymentMode};
use crate::policy::DefaultOptions;
use crate::storage::{MemoryStorage, TokenStorage};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Host collaborators the factory wires into the client.
#[derive(Clone)]
pub struct ClientEnvironment {
    pub storage: Arc<dyn TokenStorage>,
    pub alerter: Arc<dyn Alerter>,
    /// Replaces the HTTP transport when set.
    pub transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientEnvironment {
    fn default() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            alerter: Arc::new(StderrAlerter),
            transport: None,
        }
    }
}

impl fmt::Debug for ClientEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientEnvironment")
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientEnvironment {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage,
            ..Default::default()
        }
    }

    pub fn alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = alerter;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

/// Builds a configured client.
///
/// The chain is auth injection, then error observation, then the transport.
/// Endpoint validation errors are returned as-is.
pub fn create_client(
    options: &ClientOptions,
    mode: DeploymentMode,
    environment: &ClientEnvironment,
) -> SdkResult<GraphqlClient> {
    let endpoint = select_endpoint(options, mode).to_string();

    let (transport, tls): (Arc<dyn Transport>, bool) = match &environment.transport {
        Some(transport) => (transport.clone(), false),
        None => {
            let http = HttpTransport::new(&endpoint)?.timeout(options.timeout);
            let tls = http.is_tls();
            (Arc::new(http), tls)
        }
    };

    let links: Vec<Arc<dyn Link>> = vec![
        Arc::new(AuthLink::from_options(
            environment.storage.clone(),
            options,
            mode,
        )),
        Arc::new(ErrorLink::from_flag(
            options.alert_on_error,
            environment.alerter.clone(),
        )),
    ];

    info!(
        endpoint = %endpoint,
        mode = %mode,
        mocking = options.mocking,
        tls,
        caching = !options.disable_caching,
        "graphql client created"
    );

    Ok(GraphqlClient::builder(LinkChain::new(links, transport))
        .cache(InMemoryCache::new())
        .default_options(DefaultOptions::for_caching(options.disable_caching))
        .endpoint(endpoint)
        .build())
}
