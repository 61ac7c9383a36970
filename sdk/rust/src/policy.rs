//! Fetch and error policies.

use serde::{Deserialize, Serialize};

/// Whether a result may come from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Serve from the cache when present, otherwise fetch and store.
    #[default]
    CacheFirst,
    /// Serve from the cache only; a miss is an error.
    CacheOnly,
    /// Always fetch, then store.
    NetworkOnly,
    /// Always fetch, never read or store.
    NoCache,
}

impl FetchPolicy {
    pub const fn reads_cache(&self) -> bool {
        matches!(self, Self::CacheFirst | Self::CacheOnly)
    }

    pub const fn writes_cache(&self) -> bool {
        matches!(self, Self::CacheFirst | Self::NetworkOnly)
    }
}

/// How GraphQL errors returned alongside data are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Any error fails the operation.
    #[default]
    None,
    /// Errors are dropped; data is returned.
    Ignore,
    /// Data and errors are both returned.
    All,
}

/// Policies for one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPolicy {
    pub fetch_policy: FetchPolicy,
    pub error_policy: ErrorPolicy,
}

impl OperationPolicy {
    pub const fn new(fetch_policy: FetchPolicy, error_policy: ErrorPolicy) -> Self {
        Self {
            fetch_policy,
            error_policy,
        }
    }
}

/// Client-wide default policies per operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultOptions {
    pub watch_query: OperationPolicy,
    pub query: OperationPolicy,
    pub mutate: OperationPolicy,
}

impl Default for DefaultOptions {
    fn default() -> Self {
        Self {
            watch_query: OperationPolicy::default(),
            query: OperationPolicy::default(),
            mutate: OperationPolicy::new(FetchPolicy::NoCache, ErrorPolicy::None),
        }
    }
}

impl DefaultOptions {
    /// Bypasses the cache: watched queries ignore errors, one-shot queries
    /// surface all of them.
    pub fn no_cache() -> Self {
        Self {
            watch_query: OperationPolicy::new(FetchPolicy::NoCache, ErrorPolicy::Ignore),
            query: OperationPolicy::new(FetchPolicy::NoCache, ErrorPolicy::All),
            ..Self::default()
        }
    }

    pub fn for_caching(disable_caching: bool) -> Self {
        if disable_caching {
            Self::no_cache()
        } else {
            Self::default()
        }
    }
}
