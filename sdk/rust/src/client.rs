//! The GraphQL client.
//!
//! A [`GraphqlClient`] runs operations through its [`LinkChain`], consults the
//! [`InMemoryCache`] according to the fetch policy, and shapes the outcome
//! according to the error policy.
//!
//! ```ignore
//! let result = client
//!     .query::<UserData>("query User($id: ID!) { user(id: $id) { id name } }")
//!     .variables(serde_json::json!({ "id": "1" }))
//!     .execute()
//!     .await?;
//!
//! let mut watcher = client.watch_query::<UserData>("{ me { id } }");
//! let mut updates = watcher.subscribe();
//! watcher.refetch().await?;
//! ```

use crate::cache::{CacheKey, InMemoryCache};
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::link::{GraphQLError, LinkChain, Operation, OperationKind, Response};
use crate::policy::{DefaultOptions, ErrorPolicy, FetchPolicy, OperationPolicy};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Network,
}

/// The outcome of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    /// Errors surfaced under [`ErrorPolicy::All`]; empty otherwise.
    pub errors: Vec<GraphQLError>,
    pub source: ResultSource,
}

impl<T> QueryResult<T> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the data, or `NoData` if the server sent none.
    pub fn into_data(self) -> SdkResult<T> {
        self.data
            .ok_or_else(|| SdkError::new(ErrorCode::NoData, "No data in response"))
    }
}

impl QueryResult<serde_json::Value> {
    fn into_typed<T: DeserializeOwned>(self) -> SdkResult<QueryResult<T>> {
        let data = match self.data {
            Some(value) => Some(serde_json::from_value(value).map_err(|e| {
                SdkError::deserialize(format!("Failed to deserialize response: {}", e))
            })?),
            None => None,
        };
        Ok(QueryResult {
            data,
            errors: self.errors,
            source: self.source,
        })
    }
}

/// Converts GraphQL errors into a single failure for [`ErrorPolicy::None`].
pub fn graphql_failure(errors: &[GraphQLError]) -> SdkError {
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    SdkError::new(ErrorCode::ExecutionError, message).with_extension("graphqlErrors", errors)
}

fn apply_error_policy(
    response: Response,
    policy: ErrorPolicy,
) -> SdkResult<QueryResult<serde_json::Value>> {
    let errors = match policy {
        ErrorPolicy::None if response.has_errors() => return Err(graphql_failure(&response.errors)),
        ErrorPolicy::None | ErrorPolicy::Ignore => Vec::new(),
        ErrorPolicy::All => response.errors,
    };
    Ok(QueryResult {
        data: response.data,
        errors,
        source: ResultSource::Network,
    })
}

struct ClientInner {
    chain: LinkChain,
    cache: InMemoryCache,
    default_options: DefaultOptions,
    endpoint: String,
}

/// A configured GraphQL client. Clones share the chain and the cache.
#[derive(Clone)]
pub struct GraphqlClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.inner.endpoint)
            .field("links", &self.inner.chain.len())
            .field("cached", &self.inner.cache.len())
            .field("default_options", &self.inner.default_options)
            .finish()
    }
}

/// Builder for [`GraphqlClient`].
pub struct ClientBuilder {
    chain: LinkChain,
    cache: InMemoryCache,
    default_options: DefaultOptions,
    endpoint: String,
}

impl ClientBuilder {
    pub fn cache(mut self, cache: InMemoryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn default_options(mut self, options: DefaultOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Records the endpoint the chain's transport talks to.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn build(self) -> GraphqlClient {
        GraphqlClient {
            inner: Arc::new(ClientInner {
                chain: self.chain,
                cache: self.cache,
                default_options: self.default_options,
                endpoint: self.endpoint,
            }),
        }
    }
}

impl GraphqlClient {
    pub fn builder(chain: LinkChain) -> ClientBuilder {
        ClientBuilder {
            chain,
            cache: InMemoryCache::new(),
            default_options: DefaultOptions::default(),
            endpoint: String::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.inner.cache
    }

    pub fn default_options(&self) -> &DefaultOptions {
        &self.inner.default_options
    }

    /// Clears every cached result.
    pub fn reset_store(&self) {
        self.inner.cache.reset();
    }

    /// Creates a one-shot query using the client's `query` defaults.
    pub fn query<T: DeserializeOwned>(&self, query: impl Into<String>) -> QueryBuilder<T> {
        QueryBuilder::new(
            self.clone(),
            Operation::query(query),
            self.inner.default_options.query,
        )
    }

    /// Creates a mutation using the client's `mutate` defaults.
    pub fn mutate<T: DeserializeOwned>(&self, mutation: impl Into<String>) -> QueryBuilder<T> {
        QueryBuilder::new(
            self.clone(),
            Operation::mutation(mutation),
            self.inner.default_options.mutate,
        )
    }

    /// Creates a watched query using the client's `watch_query` defaults.
    pub fn watch_query<T>(&self, query: impl Into<String>) -> ObservableQuery<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        ObservableQuery::new(
            self.clone(),
            Operation::query(query),
            self.inner.default_options.watch_query,
        )
    }

    /// Runs an operation under `policy`.
    pub async fn run(
        &self,
        operation: Operation,
        policy: OperationPolicy,
    ) -> SdkResult<QueryResult<serde_json::Value>> {
        let key = CacheKey::from_operation(&operation);
        let is_query = operation.kind == OperationKind::Query;

        if is_query && policy.fetch_policy.reads_cache() {
            if let Some(data) = self.inner.cache.read(&key) {
                debug!(key = key.as_str(), "cache hit");
                return Ok(QueryResult {
                    data: Some(data),
                    errors: Vec::new(),
                    source: ResultSource::Cache,
                });
            }
            if policy.fetch_policy == FetchPolicy::CacheOnly {
                return Err(SdkError::new(
                    ErrorCode::CacheMiss,
                    "No cached result for cache-only query",
                ));
            }
        }

        let response = self.inner.chain.execute(operation).await?;

        if is_query && policy.fetch_policy.writes_cache() && !response.has_errors() {
            if let Some(data) = &response.data {
                self.inner.cache.write(key, data.clone());
            }
        }

        apply_error_policy(response, policy.error_policy)
    }
}

/// A one-shot query or mutation builder.
pub struct QueryBuilder<T> {
    client: GraphqlClient,
    operation: Operation,
    policy: OperationPolicy,
    _phantom: PhantomData<T>,
}

impl<T: DeserializeOwned> QueryBuilder<T> {
    fn new(client: GraphqlClient, operation: Operation, policy: OperationPolicy) -> Self {
        Self {
            client,
            operation,
            policy,
            _phantom: PhantomData,
        }
    }

    /// Sets the variables.
    pub fn variables<V: Serialize>(mut self, variables: V) -> Self {
        self.operation.variables = serde_json::to_value(variables).ok();
        self
    }

    /// Sets the operation name.
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation.operation_name = Some(name.into());
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy.fetch_policy = policy;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy.error_policy = policy;
        self
    }

    /// Adds a header to this request. Links may overwrite it.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.operation.set_header(name, value);
        self
    }

    pub fn policy(&self) -> OperationPolicy {
        self.policy
    }

    /// Executes the operation.
    pub async fn execute(self) -> SdkResult<QueryResult<T>> {
        self.client
            .run(self.operation, self.policy)
            .await?
            .into_typed()
    }
}

/// Latest outcome of a watched query; `None` before the first fetch.
pub type WatchState<T> = Option<SdkResult<QueryResult<T>>>;

/// A query whose results are published to subscribers on every fetch.
pub struct ObservableQuery<T> {
    client: GraphqlClient,
    operation: Operation,
    policy: OperationPolicy,
    state: watch::Sender<WatchState<T>>,
}

impl<T> ObservableQuery<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn new(client: GraphqlClient, operation: Operation, policy: OperationPolicy) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            client,
            operation,
            policy,
            state,
        }
    }

    pub fn variables<V: Serialize>(mut self, variables: V) -> Self {
        self.operation.variables = serde_json::to_value(variables).ok();
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation.operation_name = Some(name.into());
        self
    }

    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy.fetch_policy = policy;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy.error_policy = policy;
        self
    }

    pub fn policy(&self) -> OperationPolicy {
        self.policy
    }

    /// Fetches again and publishes the outcome, success or failure.
    pub async fn refetch(&self) -> SdkResult<QueryResult<T>> {
        let result = match self.client.run(self.operation.clone(), self.policy).await {
            Ok(raw) => raw.into_typed(),
            Err(e) => Err(e),
        };
        self.state.send_replace(Some(result.clone()));
        result
    }

    /// The most recently published outcome.
    pub fn latest(&self) -> WatchState<T> {
        self.state.borrow().clone()
    }

    /// Receives every outcome published after subscribing.
    pub fn subscribe(&self) -> watch::Receiver<WatchState<T>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{BoxFuture, Transport};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns queued responses in order and counts calls.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<Vec<SdkResult<Response>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<SdkResult<Response>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, _operation: Operation) -> BoxFuture<'static, SdkResult<Response>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SdkError::network("no scripted response")));
            Box::pin(async move { next })
        }
    }

    fn client_with(transport: Arc<ScriptedTransport>, defaults: DefaultOptions) -> GraphqlClient {
        GraphqlClient::builder(LinkChain::new(Vec::new(), transport))
            .default_options(defaults)
            .endpoint("http://localhost:4000/graphql")
            .build()
    }

    fn partial_response() -> Response {
        Response {
            data: Some(json!({"user": {"id": "1"}})),
            errors: vec![GraphQLError::new("friends unavailable")],
            extensions: None,
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct User {
        id: String,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct UserData {
        user: User,
    }

    #[tokio::test]
    async fn test_cache_first_serves_second_call_from_cache() {
        let transport =
            ScriptedTransport::new(vec![Ok(Response::data(json!({"user": {"id": "1"}})))]);
        let client = client_with(transport.clone(), DefaultOptions::for_caching(false));

        let first = client.query::<UserData>("{ user { id } }").execute().await.unwrap();
        let second = client.query::<UserData>("{  user { id }  }").execute().await.unwrap();

        assert_eq!(first.source, ResultSource::Network);
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.into_data().unwrap().user.id, "1");
        assert_eq!(transport.calls(), 1);

        client.reset_store();
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_no_cache_always_hits_network() {
        let transport = ScriptedTransport::new(vec![
            Ok(Response::data(json!({"n": 1}))),
            Ok(Response::data(json!({"n": 2}))),
        ]);
        let client = client_with(transport.clone(), DefaultOptions::no_cache());

        let first = client.query::<serde_json::Value>("{ n }").execute().await.unwrap();
        let second = client.query::<serde_json::Value>("{ n }").execute().await.unwrap();

        assert_eq!(first.data, Some(json!({"n": 1})));
        assert_eq!(second.data, Some(json!({"n": 2})));
        assert_eq!(transport.calls(), 2);
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cache_only_miss() {
        let transport = ScriptedTransport::new(Vec::new());
        let client = client_with(transport.clone(), DefaultOptions::default());

        let err = client
            .query::<serde_json::Value>("{ n }")
            .fetch_policy(FetchPolicy::CacheOnly)
            .execute()
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::CacheMiss);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_error_policy_none_fails() {
        let transport = ScriptedTransport::new(vec![Ok(partial_response())]);
        let client = client_with(transport, DefaultOptions::default());

        let err = client.query::<UserData>("{ user { id } }").execute().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ExecutionError);
        assert_eq!(err.message, "friends unavailable");
        assert!(err.extension("graphqlErrors").is_some());
    }

    #[tokio::test]
    async fn test_error_policy_all_surfaces_errors() {
        let transport = ScriptedTransport::new(vec![Ok(partial_response())]);
        let client = client_with(transport, DefaultOptions::no_cache());

        let result = client.query::<UserData>("{ user { id } }").execute().await.unwrap();
        assert_eq!(result.errors, vec![GraphQLError::new("friends unavailable")]);
        assert_eq!(result.data.unwrap().user.id, "1");
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let transport = ScriptedTransport::new(vec![Ok(partial_response())]);
        let client = client_with(transport, DefaultOptions::default());

        let _ = client
            .query::<UserData>("{ user { id } }")
            .error_policy(ErrorPolicy::All)
            .execute()
            .await
            .unwrap();
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_watch_query_ignores_errors_and_publishes() {
        let transport = ScriptedTransport::new(vec![Ok(partial_response())]);
        let client = client_with(transport, DefaultOptions::no_cache());

        let watcher = client.watch_query::<UserData>("{ user { id } }");
        assert_eq!(watcher.policy().fetch_policy, FetchPolicy::NoCache);
        assert!(watcher.latest().is_none());

        let mut updates = watcher.subscribe();
        let result = watcher.refetch().await.unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(result.data.as_ref().unwrap().user.id, "1");

        assert!(updates.has_changed().unwrap());
        let published = updates.borrow_and_update().clone().unwrap().unwrap();
        assert_eq!(published, result);
    }

    #[tokio::test]
    async fn test_watch_query_publishes_failures() {
        let transport = ScriptedTransport::new(vec![Err(SdkError::timeout())]);
        let client = client_with(transport, DefaultOptions::no_cache());

        let watcher = client.watch_query::<UserData>("{ user { id } }");
        assert!(watcher.refetch().await.is_err());
        assert_eq!(watcher.latest().unwrap().unwrap_err().code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn test_mutations_bypass_cache() {
        let transport = ScriptedTransport::new(vec![
            Ok(Response::data(json!({"ok": true}))),
            Ok(Response::data(json!({"ok": true}))),
        ]);
        let client = client_with(transport.clone(), DefaultOptions::for_caching(false));

        for _ in 0..2 {
            client
                .mutate::<serde_json::Value>("mutation { ok }")
                .fetch_policy(FetchPolicy::CacheFirst)
                .execute()
                .await
                .unwrap();
        }
        assert_eq!(transport.calls(), 2);
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn test_deserialize_failure() {
        let transport = ScriptedTransport::new(vec![Ok(Response::data(json!({"user": 3})))]);
        let client = client_with(transport, DefaultOptions::no_cache());

        let err = client.query::<UserData>("{ user { id } }").execute().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
    }

    #[test]
    fn test_builder_overrides() {
        let transport = ScriptedTransport::new(Vec::new());
        let client = client_with(transport, DefaultOptions::no_cache());
        let builder = client
            .query::<serde_json::Value>("{ n }")
            .fetch_policy(FetchPolicy::NetworkOnly)
            .error_policy(ErrorPolicy::None);

        assert_eq!(
            builder.policy(),
            OperationPolicy::new(FetchPolicy::NetworkOnly, ErrorPolicy::None)
        );
        assert_eq!(client.endpoint(), "http://localhost:4000/graphql");
    }
}
