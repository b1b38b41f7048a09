use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::auth::Credentials;
use crate::connectors::Connector;
use crate::dispatch::args::Args;
use crate::dispatch::dispatcher::validate_and_build_payload;
use crate::dispatch::operation::Payload;
use crate::envelope::{auth_error, validation_error, Envelope};
use crate::http::client::{HttpClient, HttpMethod, HttpRequest, RequestBody};
use crate::http::executor::execute_json_request;

/// One gateway call: named arguments plus an opaque context passed through untouched.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub args: Args,
    pub context: Value,
}

impl Invocation {
    pub fn new(args: Args) -> Self {
        Self {
            args,
            context: Value::Null,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.args.flag("dry_run")
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub timeout: Duration,
    pub base_url_override: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            base_url_override: None,
        }
    }
}

/// A validated request that has not been authorized or sent yet.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub operation: String,
    pub method: HttpMethod,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub payload: Option<Payload>,
    pub credentials: Credentials,
}

impl PreparedCall {
    pub fn preview(&self) -> Value {
        let mut preview = Map::new();
        preview.insert("operation".into(), json!(self.operation));
        preview.insert("url".into(), json!(self.url));
        preview.insert("method".into(), json!(self.method.as_str()));
        preview.insert("auth".into(), json!(self.credentials.scheme()));
        if let Some(payload) = &self.payload {
            preview.insert("payload".into(), Value::Object(payload.clone()));
        }
        if !self.params.is_empty() {
            let params: Map<String, Value> = self
                .params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            preview.insert("params".into(), Value::Object(params));
        }
        json!({ "preview": preview })
    }
}

/// Everything up to, but excluding, authorization and the network call.
pub fn prepare(
    connector: &dyn Connector,
    args: &Args,
    base_url_override: Option<&str>,
) -> Result<PreparedCall, Envelope> {
    let Some(operation) = args.text("operation") else {
        return Err(validation_error("Missing required operation", Some("operation")));
    };

    let table = connector.operations();
    let Some(def) = table.get(&operation) else {
        return Err(validation_error(
            format!("Unsupported operation: {operation}"),
            Some("operation"),
        ));
    };

    for &field in connector.connection_fields() {
        if !args.is_present(field) {
            return Err(validation_error(format!("Missing required {field}"), Some(field)));
        }
    }

    for &field in connector.credential_fields() {
        if !args.is_present(field) {
            return Err(auth_error(format!("Missing credentials: {field}")));
        }
    }

    let payload = validate_and_build_payload(&operation, table, args).map_err(Envelope::from)?;

    let base = match base_url_override {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => connector.base_url(args),
    };
    let url = format!("{base}{}", (def.path)(args));
    let params = def.params.map(|build| build(args)).unwrap_or_default();

    Ok(PreparedCall {
        operation,
        method: def.method,
        url,
        params,
        payload,
        credentials: connector.credentials(args),
    })
}

/// Run one invocation against `connector`.
///
/// With `dry_run` set the preview is returned before any authorization or
/// request happens, so the client is never touched.
pub async fn run(
    connector: &dyn Connector,
    client: &dyn HttpClient,
    invocation: &Invocation,
    options: &RunOptions,
) -> Envelope {
    let call = match prepare(
        connector,
        &invocation.args,
        options.base_url_override.as_deref(),
    ) {
        Ok(call) => call,
        Err(envelope) => {
            tracing::info!(
                connector = connector.name(),
                error = envelope.error_message().unwrap_or_default(),
                "invocation rejected"
            );
            return envelope;
        }
    };

    if invocation.dry_run() {
        tracing::info!(
            connector = connector.name(),
            operation = %call.operation,
            method = %call.method,
            "dry run; no request sent"
        );
        return Envelope::ok(call.preview(), None);
    }

    let headers = match call.credentials.authorize(client, options.timeout).await {
        Ok(headers) => headers,
        Err(e) => {
            tracing::warn!(connector = connector.name(), error = %e, "authorization failed");
            return auth_error(e.to_string());
        }
    };

    let mut request = HttpRequest::new(call.method, call.url, options.timeout);
    request.headers = headers;
    request
        .headers
        .push(("Accept".to_string(), "application/json".to_string()));
    request.params = call.params;
    request.body = call
        .payload
        .map(|p| RequestBody::Json(Value::Object(p)))
        .unwrap_or_default();

    tracing::info!(
        connector = connector.name(),
        operation = %call.operation,
        method = %call.method,
        "executing operation"
    );
    execute_json_request(client, request, &connector.error_handling()).await
}
