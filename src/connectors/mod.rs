pub mod bigquery;
pub mod gitlab;
pub mod google_docs;
pub mod gorgias;
pub mod hubspot;
pub mod registry;
pub mod runner;
pub mod servicenow;
pub mod zendesk;

use serde_json::Value;

use crate::auth::Credentials;
use crate::dispatch::args::Args;
use crate::dispatch::operation::OperationTable;
use crate::http::executor::ErrorHandling;

/// A SaaS API described as data: its operations, how to address it and how
/// to authenticate. New connectors implement this trait and register in
/// [`registry::ConnectorRegistry::with_builtin`].
pub trait Connector: Send + Sync {
    /// Registry key (`zendesk`, `google_docs`, ...).
    fn name(&self) -> &str;

    /// Display name used in error messages ("Zendesk API error").
    fn service(&self) -> &str;

    fn operations(&self) -> &OperationTable;

    /// Non-secret arguments needed to address the service; missing ones are 400s.
    fn connection_fields(&self) -> &[&'static str] {
        &[]
    }

    /// Secret arguments; missing ones are 401s.
    fn credential_fields(&self) -> &[&'static str];

    /// Base URL without trailing slash; operation paths are appended to it.
    fn base_url(&self, args: &Args) -> String;

    fn credentials(&self, args: &Args) -> Credentials;

    fn error_handling(&self) -> ErrorHandling;
}

/// Percent-encode one argument for use as a single path segment.
pub(crate) fn seg(args: &Args, key: &str) -> String {
    args.text(key)
        .map(|raw| {
            url::form_urlencoded::byte_serialize(raw.as_bytes())
                .collect::<String>()
                .replace('+', "%20")
        })
        .unwrap_or_default()
}

/// String argument, or `default` when absent or blank.
pub(crate) fn text_or(args: &Args, key: &str, default: &str) -> String {
    args.text(key).unwrap_or_else(|| default.to_string())
}

/// Nested `{"error": {"message": ...}}` bodies used by Google and ServiceNow.
pub(crate) fn nested_error_message(_status: u16, data: &Value) -> Option<String> {
    let error = data.get("error")?;
    match error {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .or_else(|| obj.get("msg"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
