use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The mapping handed back to the gateway for every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub output: Value,
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Envelope {
    /// A successful result carrying `output` and the upstream status.
    pub fn ok(output: Value, status: Option<u16>) -> Self {
        Self {
            output,
            status,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The `error` message if this envelope describes a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.output.get("error").and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.error_message().is_some()
    }
}

/// Uniform failure envelope: `{"output": {"error", "status_code"?, "details"?, "response"?}, "status"}`.
pub fn error_output(
    message: impl Into<String>,
    status: Option<u16>,
    details: Option<Value>,
    response: Option<Value>,
) -> Envelope {
    let mut body = Map::new();
    body.insert("error".into(), Value::String(message.into()));
    if let Some(code) = status {
        body.insert("status_code".into(), json!(code));
    }
    if let Some(details) = details {
        body.insert("details".into(), details);
    }
    if let Some(response) = response {
        body.insert("response".into(), response);
    }
    Envelope {
        output: Value::Object(body),
        status,
        content_type: None,
    }
}

/// 400-class failure for bad or missing input, reported before any network call.
pub fn validation_error(message: impl Into<String>, field: Option<&str>) -> Envelope {
    let mut body = Map::new();
    body.insert("error".into(), Value::String(message.into()));
    if let Some(field) = field {
        body.insert("field".into(), Value::String(field.to_string()));
    }
    Envelope {
        output: Value::Object(body),
        status: Some(400),
        content_type: None,
    }
}

/// 401-class failure for missing or unusable credentials.
pub fn auth_error(message: impl Into<String>) -> Envelope {
    error_output(message, Some(401), None, None)
}
