use serde_json::Value;

use crate::envelope::{error_output, Envelope};
use crate::http::client::{HttpClient, HttpRequest};

/// Extracts a human-readable message from a non-2xx JSON body.
pub type ErrorParser = fn(u16, &Value) -> Option<String>;

/// How failures of one upstream service are reported.
#[derive(Clone)]
pub struct ErrorHandling {
    pub service: String,
    pub error_parser: Option<ErrorParser>,
    pub error_key: Option<String>,
    pub request_error_message: String,
    pub include_exception_in_message: bool,
}

impl ErrorHandling {
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            request_error_message: format!("Failed to reach {service} API"),
            service,
            error_parser: None,
            error_key: None,
            include_exception_in_message: true,
        }
    }

    pub fn parser(mut self, parser: ErrorParser) -> Self {
        self.error_parser = Some(parser);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.error_key = Some(key.into());
        self
    }

    pub fn request_error(mut self, message: impl Into<String>) -> Self {
        self.request_error_message = message.into();
        self
    }

    /// Keep transport error text out of the envelope.
    pub fn hide_exception(mut self) -> Self {
        self.include_exception_in_message = false;
        self
    }

    fn message_for(&self, status: u16, data: &Value) -> String {
        self.error_parser
            .and_then(|parse| parse(status, data))
            .or_else(|| {
                self.error_key
                    .as_deref()
                    .and_then(|key| data.get(key))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("{} API error", self.service))
    }
}

impl std::fmt::Debug for ErrorHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandling")
            .field("service", &self.service)
            .field("error_parser", &self.error_parser.is_some())
            .field("error_key", &self.error_key)
            .field("request_error_message", &self.request_error_message)
            .field("include_exception_in_message", &self.include_exception_in_message)
            .finish()
    }
}

/// Send exactly one request and shape every outcome into an [`Envelope`].
///
/// Never retries and never returns an error: transport failures, non-2xx
/// statuses and non-JSON bodies all become error envelopes.
pub async fn execute_json_request(
    client: &dyn HttpClient,
    request: HttpRequest,
    handling: &ErrorHandling,
) -> Envelope {
    let method = request.method;
    let url = request.url.clone();
    tracing::debug!(service = %handling.service, %method, %url, "sending request");

    let response = match client.send(request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                service = %handling.service,
                %method,
                %url,
                status = ?err.status,
                error = %err,
                "request failed before a response was received"
            );
            let details = handling
                .include_exception_in_message
                .then(|| Value::String(err.message.clone()));
            return error_output(
                handling.request_error_message.clone(),
                err.status,
                details,
                None,
            );
        }
    };

    let status = response.status;
    if response.is_ok() && response.text().trim().is_empty() {
        tracing::debug!(service = %handling.service, status, "empty success body");
        return Envelope::ok(Value::Null, Some(status));
    }

    let data = match response.json() {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(service = %handling.service, status, error = %e, "response is not JSON");
            return error_output(
                format!("Invalid JSON response from {} API", handling.service),
                Some(status),
                Some(Value::String(response.body)),
                None,
            );
        }
    };

    if !response.is_ok() {
        let message = handling.message_for(status, &data);
        tracing::info!(service = %handling.service, status, message = %message, "upstream API error");
        return error_output(message, Some(status), None, Some(data));
    }

    tracing::debug!(service = %handling.service, status, "request succeeded");
    Envelope::ok(data, Some(status))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::errors::TransportError;
    use crate::http::client::{HttpMethod, RequestBody};
    use crate::http::stub::StubClient;
    use serde_json::json;

    fn request() -> HttpRequest {
        let mut req = HttpRequest::new(
            HttpMethod::Post,
            "https://api.example.test/things",
            Duration::from_secs(5),
        )
        .header("Authorization", "Bearer t");
        req.body = RequestBody::Json(json!({"name": "x"}));
        req
    }

    fn first_error(_status: u16, data: &Value) -> Option<String> {
        data.get("errors")?
            .as_array()?
            .first()?
            .as_str()
            .map(str::to_string)
    }

    #[tokio::test]
    async fn transport_failure_is_reported_once() {
        let client = StubClient::new().fail(TransportError::new("connection refused"));
        let handling = ErrorHandling::new("Example").request_error("Could not reach Example");

        let env = execute_json_request(&client, request(), &handling).await;

        assert_eq!(client.calls(), 1);
        assert_eq!(env.error_message(), Some("Could not reach Example"));
        assert_eq!(env.output["details"], json!("connection refused"));
        assert_eq!(env.status, None);
    }

    #[tokio::test]
    async fn transport_failure_keeps_partial_status_and_can_hide_details() {
        let client = StubClient::new().fail(TransportError {
            message: "body read timed out".into(),
            status: Some(200),
        });
        let handling = ErrorHandling::new("Example").hide_exception();

        let env = execute_json_request(&client, request(), &handling).await;

        assert_eq!(env.status, Some(200));
        assert_eq!(env.error_message(), Some("Failed to reach Example API"));
        assert!(env.output.get("details").is_none());
    }

    #[tokio::test]
    async fn error_key_extracts_message() {
        let client = StubClient::new().respond(404, r#"{"message": "not found"}"#);
        let handling = ErrorHandling::new("Example").key("message");

        let env = execute_json_request(&client, request(), &handling).await;

        assert_eq!(env.error_message(), Some("not found"));
        assert_eq!(env.status, Some(404));
        assert_eq!(env.output["status_code"], json!(404));
        assert_eq!(env.output["response"], json!({"message": "not found"}));
    }

    #[tokio::test]
    async fn parser_wins_over_key() {
        let client =
            StubClient::new().respond(422, r#"{"message": "generic", "errors": ["title is blank"]}"#);
        let handling = ErrorHandling::new("Example")
            .parser(first_error)
            .key("message");

        let env = execute_json_request(&client, request(), &handling).await;

        assert_eq!(env.error_message(), Some("title is blank"));
    }

    #[tokio::test]
    async fn falls_back_to_service_message() {
        let client = StubClient::new().respond(500, r#"{"oops": true}"#);
        let handling = ErrorHandling::new("Example")
            .parser(first_error)
            .key("message");

        let env = execute_json_request(&client, request(), &handling).await;

        assert_eq!(env.error_message(), Some("Example API error"));
        assert_eq!(env.status, Some(500));
    }

    #[tokio::test]
    async fn success_wraps_body_in_output() {
        let client = StubClient::new().respond(201, r#"{"id": 7}"#);
        let env = execute_json_request(&client, request(), &ErrorHandling::new("Example")).await;

        assert_eq!(env.output, json!({"id": 7}));
        assert_eq!(env.status, Some(201));
        assert!(!env.is_error());

        let sent = client.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, RequestBody::Json(json!({"name": "x"})));
    }

    #[tokio::test]
    async fn invalid_json_reports_raw_text() {
        let client = StubClient::new().respond(200, "<html>ok?</html>");
        let env = execute_json_request(&client, request(), &ErrorHandling::new("Example")).await;

        assert_eq!(env.error_message(), Some("Invalid JSON response from Example API"));
        assert_eq!(env.status, Some(200));
        assert_eq!(env.output["details"], json!("<html>ok?</html>"));
    }

    #[tokio::test]
    async fn invalid_json_on_error_status() {
        let client = StubClient::new().respond(502, "Bad Gateway");
        let env = execute_json_request(&client, request(), &ErrorHandling::new("Example")).await;

        assert_eq!(env.error_message(), Some("Invalid JSON response from Example API"));
        assert_eq!(env.status, Some(502));
    }

    #[tokio::test]
    async fn empty_success_body_is_null_output() {
        let client = StubClient::new().respond(204, "");
        let env = execute_json_request(&client, request(), &ErrorHandling::new("Example")).await;

        assert_eq!(env.output, Value::Null);
        assert_eq!(env.status, Some(204));
    }
}
