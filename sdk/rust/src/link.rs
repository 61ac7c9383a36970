//! The request chain.
//!
//! An [`Operation`] flows through every [`Link`] in order and reaches the
//! [`Transport`]; the [`Response`] flows back through the links in reverse.
//!
//! ```ignore
//! let chain = LinkChain::new(
//!     vec![Arc::new(auth_link), Arc::new(error_link)],
//!     Arc::new(HttpTransport::new("http://localhost:4000/graphql")?),
//! );
//! let response = chain.execute(Operation::query("{ hello }")).await?;
//! ```

use crate::error::SdkResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The remainder of the chain after the current link.
pub type Next = Arc<dyn Fn(Operation) -> BoxFuture<'static, SdkResult<Response>> + Send + Sync>;

/// Kind of GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
}

/// A GraphQL operation on its way to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip)]
    pub kind: OperationKind,
    /// Headers set by links, sent with the transport request.
    #[serde(skip)]
    pub headers: IndexMap<String, String>,
}

impl Operation {
    pub fn new(kind: OperationKind, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
            operation_name: None,
            kind,
            headers: IndexMap::new(),
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self::new(OperationKind::Query, query)
    }

    pub fn mutation(query: impl Into<String>) -> Self {
        Self::new(OperationKind::Mutation, query)
    }

    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Sets a header, replacing any existing value of the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A GraphQL response as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl Response {
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A server-reported GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            extensions: None,
        }
    }
}

/// A stage of the request chain.
pub trait Link: Send + Sync {
    /// Handles `operation`, usually by calling `forward` with it.
    fn request(
        &self,
        operation: Operation,
        forward: Next,
    ) -> BoxFuture<'static, SdkResult<Response>>;
}

/// The terminating stage of the request chain.
pub trait Transport: Send + Sync {
    fn send(&self, operation: Operation) -> BoxFuture<'static, SdkResult<Response>>;
}

/// A link built from a closure.
pub struct FnLink<F>(F);

/// Wraps a closure as a [`Link`].
pub fn link_fn<F>(f: F) -> FnLink<F>
where
    F: Fn(Operation, Next) -> BoxFuture<'static, SdkResult<Response>> + Send + Sync,
{
    FnLink(f)
}

impl<F> Link for FnLink<F>
where
    F: Fn(Operation, Next) -> BoxFuture<'static, SdkResult<Response>> + Send + Sync,
{
    fn request(
        &self,
        operation: Operation,
        forward: Next,
    ) -> BoxFuture<'static, SdkResult<Response>> {
        (self.0)(operation, forward)
    }
}

/// An ordered chain of links ending in a transport.
#[derive(Clone)]
pub struct LinkChain {
    links: Vec<Arc<dyn Link>>,
    transport: Arc<dyn Transport>,
}

impl LinkChain {
    pub fn new(links: Vec<Arc<dyn Link>>, transport: Arc<dyn Transport>) -> Self {
        Self { links, transport }
    }

    /// Number of links before the transport.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Runs `operation` through the chain.
    pub async fn execute(&self, operation: Operation) -> SdkResult<Response> {
        let transport = self.transport.clone();
        let mut next: Next = Arc::new(move |op| transport.send(op));

        // Build from the end so the first link runs first.
        for link in self.links.iter().rev() {
            let link = link.clone();
            let current_next = next;
            next = Arc::new(move |op| link.request(op, current_next.clone()));
        }

        next(operation).await
    }
}
