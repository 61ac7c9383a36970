//! One-time client initialization.
//!
//! A [`ClientProvider`] owns the options a client is built from and creates
//! the client exactly once. Consumers receive the resulting
//! `Arc<GraphqlClient>` explicitly instead of looking it up.
//!
//! ```ignore
//! let provider = Arc::new(ClientProvider::new(options, DeploymentMode::Development, env));
//! provider.mount();
//! let client = provider.ready().await?;
//! render_dashboard(&client).await?;
//! ```

use crate::client::GraphqlClient;
use crate::error::{SdkError, SdkResult};
use crate::factory::{create_client, ClientEnvironment};
use crate::options::{ClientOptions, DeploymentMode};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Lifecycle of the provided client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Ready,
}

/// Holds configuration and the lazily created client.
pub struct ClientProvider {
    options: RwLock<ClientOptions>,
    mode: DeploymentMode,
    environment: ClientEnvironment,
    client: watch::Sender<Option<Arc<GraphqlClient>>>,
}

impl ClientProvider {
    pub fn new(
        options: ClientOptions,
        mode: DeploymentMode,
        environment: ClientEnvironment,
    ) -> Self {
        let (client, _) = watch::channel(None);
        Self {
            options: RwLock::new(options),
            mode,
            environment,
            client,
        }
    }

    pub fn state(&self) -> ProviderState {
        if self.client.borrow().is_some() {
            ProviderState::Ready
        } else {
            ProviderState::Uninitialized
        }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Current options. After initialization these may differ from the
    /// options the client was built with.
    pub fn options(&self) -> ClientOptions {
        self.options
            .read()
            .map(|o| o.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Replaces the options. An existing client is kept as is.
    pub fn set_options(&self, options: ClientOptions) {
        match self.options.write() {
            Ok(mut current) => *current = options,
            Err(poisoned) => *poisoned.into_inner() = options,
        }
        if self.state() == ProviderState::Ready {
            debug!("options updated after initialization; client is not rebuilt");
        }
    }

    /// The client, or `None` before initialization.
    pub fn client(&self) -> Option<Arc<GraphqlClient>> {
        self.client.borrow().clone()
    }

    /// The client, or a `NotInitialized` error before initialization.
    pub fn require_client(&self) -> SdkResult<Arc<GraphqlClient>> {
        self.client().ok_or_else(SdkError::not_initialized)
    }

    /// Builds the client on the first call and returns it on every call.
    ///
    /// A failed build leaves the provider uninitialized so a later call can
    /// try again.
    pub fn initialize(&self) -> SdkResult<Arc<GraphqlClient>> {
        let mut failure = None;
        self.client.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            match create_client(&self.options(), self.mode, &self.environment) {
                Ok(client) => {
                    *slot = Some(Arc::new(client));
                    true
                }
                Err(e) => {
                    failure = Some(e);
                    false
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        self.require_client()
    }

    /// Schedules initialization on the runtime and returns immediately.
    pub fn mount(self: &Arc<Self>) -> JoinHandle<SdkResult<Arc<GraphqlClient>>> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            let result = provider.initialize();
            if let Err(e) = &result {
                error!("graphql client initialization failed: {}", e);
            }
            result
        })
    }

    /// Waits until the client is ready.
    pub async fn ready(&self) -> SdkResult<Arc<GraphqlClient>> {
        let mut receiver = self.client.subscribe();
        let client = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SdkError::internal("Provider dropped before initialization"))?
            .clone();
        client.ok_or_else(SdkError::not_initialized)
    }

    /// Receives the client once it becomes available.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<GraphqlClient>>> {
        self.client.subscribe()
    }
}
