//! GraphQL error observation.
//!
//! [`ErrorLink`] watches responses on their way back to the caller and
//! reports server-reported errors, either through a blocking [`Alerter`] or
//! the error log. It never changes what the caller receives.

use crate::error::{SdkError, SdkResult};
use crate::link::{BoxFuture, GraphQLError, Link, Next, Operation, Response};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, warn};

/// A blocking, user-facing alert.
pub trait Alerter: Send + Sync {
    fn alert(&self, message: &str);
}

/// Writes alerts to standard error and flushes before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAlerter;

impl Alerter for StderrAlerter {
    fn alert(&self, message: &str) {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(handle, "{}", message);
        let _ = handle.flush();
    }
}

/// Where GraphQL errors are reported.
#[derive(Clone)]
pub enum ErrorReporting {
    Alert(Arc<dyn Alerter>),
    Log,
}

/// Reports GraphQL errors carried by responses.
pub struct ErrorLink {
    reporting: ErrorReporting,
}

impl ErrorLink {
    pub fn new(reporting: ErrorReporting) -> Self {
        Self { reporting }
    }

    /// Alerts when `alert_on_error` is set, otherwise logs.
    pub fn from_flag(alert_on_error: bool, alerter: Arc<dyn Alerter>) -> Self {
        if alert_on_error {
            Self::new(ErrorReporting::Alert(alerter))
        } else {
            Self::new(ErrorReporting::Log)
        }
    }

    fn report(reporting: &ErrorReporting, errors: &[GraphQLError]) {
        let message = format_graphql_errors(errors);
        match reporting {
            ErrorReporting::Alert(alerter) => alerter.alert(&message),
            ErrorReporting::Log => error!("{}", message),
        }
    }
}

impl Link for ErrorLink {
    fn request(
        &self,
        operation: Operation,
        forward: Next,
    ) -> BoxFuture<'static, SdkResult<Response>> {
        let reporting = self.reporting.clone();
        let operation_name = operation.operation_name.clone();
        Box::pin(async move {
            let result = forward(operation).await;
            match &result {
                Ok(response) if response.has_errors() => Self::report(&reporting, &response.errors),
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        operation = operation_name.as_deref().unwrap_or("<anonymous>"),
                        "graphql network error: {}",
                        e
                    );
                    let errors = carried_graphql_errors(e);
                    if !errors.is_empty() {
                        Self::report(&reporting, &errors);
                    }
                }
            }
            result
        })
    }
}

/// GraphQL errors attached to a failed response, such as a 401 whose body
/// still lists `errors`.
pub fn carried_graphql_errors(error: &SdkError) -> Vec<GraphQLError> {
    error
        .extension("graphqlErrors")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

/// Renders error messages as `graphql error:` followed by a JSON array
/// indented by four spaces.
pub fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    let body = match messages.serialize(&mut serializer) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => messages.join("\n"),
    };

    format!("graphql error:\n{}", body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::link::{LinkChain, Transport};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAlerter {
        messages: Mutex<Vec<String>>,
    }

    impl Alerter for RecordingAlerter {
        fn alert(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    struct FixedTransport(SdkResult<Response>);

    impl Transport for FixedTransport {
        fn send(&self, _operation: Operation) -> BoxFuture<'static, SdkResult<Response>> {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    fn failing_response() -> Response {
        Response {
            data: Some(serde_json::json!({"user": null})),
            errors: vec![GraphQLError::new("not allowed"), GraphQLError::new("user missing")],
            extensions: None,
        }
    }

    #[test]
    fn test_format_graphql_errors() {
        let message = format_graphql_errors(&failing_response().errors);
        assert_eq!(
            message,
            "graphql error:\n[\n    \"not allowed\",\n    \"user missing\"\n]"
        );
    }

    #[tokio::test]
    async fn test_alerts_and_passes_response_through() {
        let alerter = Arc::new(RecordingAlerter::default());
        let chain = LinkChain::new(
            vec![Arc::new(ErrorLink::from_flag(true, alerter.clone()))],
            Arc::new(FixedTransport(Ok(failing_response()))),
        );

        let response = chain.execute(Operation::query("{ user { id } }")).await.unwrap();

        assert_eq!(response, failing_response());
        let messages = alerter.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("not allowed"));
        assert!(messages[0].contains("user missing"));
    }

    #[tokio::test]
    async fn test_logs_instead_of_alerting() {
        let alerter = Arc::new(RecordingAlerter::default());
        let chain = LinkChain::new(
            vec![Arc::new(ErrorLink::from_flag(false, alerter.clone()))],
            Arc::new(FixedTransport(Ok(failing_response()))),
        );

        let response = chain.execute(Operation::query("{ user { id } }")).await.unwrap();

        assert!(response.has_errors());
        assert!(alerter.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean_response_not_reported() {
        let alerter = Arc::new(RecordingAlerter::default());
        let chain = LinkChain::new(
            vec![Arc::new(ErrorLink::from_flag(true, alerter.clone()))],
            Arc::new(FixedTransport(Ok(Response::data(serde_json::json!({"ok": true}))))),
        );

        chain.execute(Operation::query("{ ok }")).await.unwrap();
        assert!(alerter.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_propagates_without_alert() {
        let alerter = Arc::new(RecordingAlerter::default());
        let chain = LinkChain::new(
            vec![Arc::new(ErrorLink::from_flag(true, alerter.clone()))],
            Arc::new(FixedTransport(Err(SdkError::network("connection reset")))),
        );

        let err = chain.execute(Operation::query("{ ok }")).await.unwrap_err();
        assert_eq!(err.message, "connection reset");
        assert!(alerter.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_errors_on_failed_response_are_alerted() {
        let alerter = Arc::new(RecordingAlerter::default());
        let rejected = SdkError::new(ErrorCode::HttpError, "HTTP error: 401 Unauthorized")
            .with_extension("graphqlErrors", vec![GraphQLError::new("jwt expired")]);
        let chain = LinkChain::new(
            vec![Arc::new(ErrorLink::from_flag(true, alerter.clone()))],
            Arc::new(FixedTransport(Err(rejected))),
        );

        let err = chain.execute(Operation::query("{ me }")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::HttpError);
        assert_eq!(
            *alerter.messages.lock().unwrap(),
            vec!["graphql error:\n[\n    \"jwt expired\"\n]".to_string()]
        );
    }

    #[test]
    fn test_carried_graphql_errors() {
        assert!(carried_graphql_errors(&SdkError::network("reset")).is_empty());

        let err = SdkError::new(ErrorCode::HttpError, "HTTP error: 400 Bad Request")
            .with_extension("graphqlErrors", vec![GraphQLError::new("bad variable")]);
        assert_eq!(carried_graphql_errors(&err), vec![GraphQLError::new("bad variable")]);
    }
}
