//! gqlink SDK
//!
//! Builds GraphQL clients from a small set of options: endpoint selection by
//! deployment mode, auth header injection from persistent storage, GraphQL
//! error alerting, and cache policy.
//!
//! # Creating a client
//!
//! ```ignore
//! use gqlink_sdk::{create_client, ClientEnvironment, ClientOptions, DeploymentMode, FileStorage};
//! use std::sync::Arc;
//!
//! let options = ClientOptions::new(
//!     "http://api.example.com/graphql",
//!     "http://staging.example.com/graphql",
//!     "http://localhost:9002/graphql",
//! )
//! .token_storage_key("jwt");
//!
//! let env = ClientEnvironment::new(Arc::new(FileStorage::new("storage.json")));
//! let client = create_client(&options, DeploymentMode::Production, &env)?;
//!
//! let result = client.query::<serde_json::Value>("{ me { id } }").execute().await?;
//! ```
//!
//! # One-time initialization
//!
//! ```ignore
//! use gqlink_sdk::ClientProvider;
//!
//! let provider = Arc::new(ClientProvider::new(options, DeploymentMode::Development, env));
//! provider.mount();
//! let client = provider.ready().await?;
//! ```

pub mod alert;
pub mod auth;
pub mod cache;
pub mod client;
pub mod error;
pub mod factory;
pub(crate) mod http;
pub mod link;
pub mod options;
pub mod policy;
pub mod provider;
pub mod storage;

pub use alert::{
    carried_graphql_errors, format_graphql_errors, Alerter, ErrorLink, ErrorReporting,
    StderrAlerter,
};
pub use auth::AuthLink;
pub use cache::{CacheKey, InMemoryCache};
pub use client::{
    ClientBuilder, GraphqlClient, ObservableQuery, QueryBuilder, QueryResult, ResultSource,
    WatchState,
};
pub use error::{ErrorCode, ResultExt, SdkError, SdkResult};
pub use factory::{create_client, ClientEnvironment};
pub use http::HttpTransport;
pub use link::{
    link_fn, BoxFuture, GraphQLError, Link, LinkChain, Next, Operation, OperationKind, Response,
    Transport,
};
pub use options::{select_endpoint, ClientOptions, DeploymentMode};
pub use policy::{DefaultOptions, ErrorPolicy, FetchPolicy, OperationPolicy};
pub use provider::{ClientProvider, ProviderState};
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
