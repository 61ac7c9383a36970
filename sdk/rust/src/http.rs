//! HTTP transport.
//!
//! Sends each operation as a JSON `POST` over HTTP/1.1 on a fresh connection.
//! `https` endpoints are served over rustls with the webpki root store.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Method, Uri};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::client::graphql_failure;
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::link::{BoxFuture, Operation, Response, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Parsed endpoint address. `host` never carries IPv6 brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    pub(crate) fn parse(url: &str) -> SdkResult<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SdkError::new(ErrorCode::InvalidUrl, "Endpoint URL is empty"));
        }

        let uri: Uri = url.parse().map_err(|e| {
            SdkError::new(ErrorCode::InvalidUrl, format!("Invalid URL '{}': {}", url, e))
        })?;

        let scheme = match uri.scheme_str() {
            Some("http") => Scheme::Http,
            Some("https") => Scheme::Https,
            Some(other) => {
                return Err(SdkError::new(
                    ErrorCode::InvalidUrl,
                    format!("Unsupported scheme '{}' in '{}'", other, url),
                ))
            }
            None => {
                return Err(SdkError::new(
                    ErrorCode::InvalidUrl,
                    format!("Missing scheme in '{}'", url),
                ))
            }
        };

        let host = uri
            .host()
            .ok_or_else(|| {
                SdkError::new(ErrorCode::InvalidUrl, format!("Missing host in '{}'", url))
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            scheme,
            host,
            port: uri.port_u16().unwrap_or(scheme.default_port()),
            path,
        })
    }

    /// Value of the `Host` header; IPv6 literals are bracketed.
    fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    fn server_name(&self) -> SdkResult<ServerName<'static>> {
        ServerName::try_from(self.host.clone()).map_err(|e| {
            SdkError::new(
                ErrorCode::InvalidUrl,
                format!("Invalid TLS server name '{}': {}", self.host, e),
            )
        })
    }
}

fn tls_config() -> SdkResult<Arc<ClientConfig>> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SdkError::internal(format!("TLS setup failed: {}", e)))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Terminating transport that talks HTTP or HTTPS to a GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Endpoint,
    tls: Option<Arc<ClientConfig>>,
    timeout: Duration,
}

impl HttpTransport {
    /// Validates the URL and creates the transport.
    pub fn new(url: impl AsRef<str>) -> SdkResult<Self> {
        let endpoint = Endpoint::parse(url.as_ref())?;
        let tls = match endpoint.scheme {
            Scheme::Http => None,
            Scheme::Https => {
                endpoint.server_name()?;
                Some(tls_config()?)
            }
        };
        Ok(Self {
            endpoint,
            tls,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    async fn post(
        endpoint: Endpoint,
        tls: Option<Arc<ClientConfig>>,
        operation: Operation,
    ) -> SdkResult<Response> {
        let body = serde_json::to_vec(&serde_json::json!({
            "query": operation.query,
            "variables": operation.variables,
            "operationName": operation.operation_name,
        }))
        .map_err(|e| SdkError::serialize(e.to_string()))?;

        let mut request = hyper::Request::builder()
            .method(Method::POST)
            .uri(endpoint.path.as_str())
            .header(HOST, endpoint.authority())
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| SdkError::network(format!("Invalid request: {}", e)))?;

        for (name, value) in &operation.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                SdkError::network(format!("Invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                SdkError::network(format!("Invalid header value for '{}': {}", name, e))
            })?;
            request.headers_mut().insert(name, value);
        }

        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| {
                SdkError::new(
                    ErrorCode::ConnectionRefused,
                    format!("Connection to {} failed: {}", endpoint.authority(), e),
                )
            })?;

        let response = match tls {
            None => exchange(stream, request).await?,
            Some(config) => {
                let stream = TlsConnector::from(config)
                    .connect(endpoint.server_name()?, stream)
                    .await
                    .map_err(|e| {
                        SdkError::network(format!(
                            "TLS handshake with {} failed: {}",
                            endpoint.authority(),
                            e
                        ))
                    })?;
                exchange(stream, request).await?
            }
        };

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| SdkError::network(format!("Read failed: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            let mut err = SdkError::new(ErrorCode::HttpError, format!("HTTP error: {}", status))
                .with_extension("status", status.as_u16())
                .with_extension("body", snippet(&body));
            // Rejected requests may still carry GraphQL errors.
            if let Ok(reply) = serde_json::from_slice::<Response>(&body) {
                if reply.has_errors() {
                    err = err
                        .with_extension("graphqlErrors", &reply.errors)
                        .with_source(graphql_failure(&reply.errors));
                }
            }
            return Err(err);
        }

        let reply = serde_json::from_slice::<Response>(&body).map_err(|e| {
            SdkError::parse(format!(
                "Failed to parse response: {}. Body: {}",
                e,
                snippet(&body)
            ))
        })?;
        if reply.data.is_none() && !reply.has_errors() {
            return Err(SdkError::new(
                ErrorCode::InvalidResponse,
                format!("Response has neither data nor errors: {}", snippet(&body)),
            ));
        }
        Ok(reply)
    }
}

/// Runs one request over an established connection.
async fn exchange<S>(
    stream: S,
    request: hyper::Request<Full<Bytes>>,
) -> SdkResult<hyper::Response<Incoming>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| SdkError::network(format!("Handshake failed: {}", e)))?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!("Connection closed with error: {:?}", err);
        }
    });

    sender
        .send_request(request)
        .await
        .map_err(|e| SdkError::network(format!("Request failed: {}", e)))
}

impl Transport for HttpTransport {
    fn send(&self, operation: Operation) -> BoxFuture<'static, SdkResult<Response>> {
        let endpoint = self.endpoint.clone();
        let tls = self.tls.clone();
        let timeout = self.timeout;
        Box::pin(async move {
            debug!(
                path = %endpoint.path,
                operation = operation.operation_name.as_deref().unwrap_or("<anonymous>"),
                "sending graphql request"
            );
            tokio::time::timeout(timeout, Self::post(endpoint, tls, operation))
                .await
                .map_err(|_| SdkError::timeout())?
        })
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(200).collect()
}
