use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub use crate::dispatch::args::is_query_value;
use crate::dispatch::args::Args;
use crate::http::client::HttpMethod;

/// Request body produced by a payload builder.
pub type Payload = Map<String, Value>;

pub type PayloadBuilder = fn(&Args) -> Payload;
/// Endpoint path relative to the connector base URL.
pub type PathBuilder = fn(&Args) -> String;
pub type ParamsBuilder = fn(&Args) -> Vec<(String, String)>;
pub type FieldPredicate = fn(&Value) -> bool;

#[derive(Clone, Copy)]
pub struct RequiredField {
    pub name: &'static str,
    /// Extra check applied once the value is known to be present.
    pub predicate: Option<FieldPredicate>,
}

impl RequiredField {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            predicate: None,
        }
    }

    pub const fn with_predicate(name: &'static str, predicate: FieldPredicate) -> Self {
        Self {
            name,
            predicate: Some(predicate),
        }
    }
}

impl std::fmt::Debug for RequiredField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequiredField")
            .field("name", &self.name)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// One supported action of a connector.
#[derive(Clone)]
pub struct OperationDefinition {
    pub method: HttpMethod,
    pub required: Vec<RequiredField>,
    pub builder: Option<PayloadBuilder>,
    pub path: PathBuilder,
    pub params: Option<ParamsBuilder>,
    /// Optional arguments checked only when supplied.
    pub optional: Vec<RequiredField>,
}

impl OperationDefinition {
    pub fn new(method: HttpMethod, path: PathBuilder) -> Self {
        Self {
            method,
            required: Vec::new(),
            builder: None,
            path,
            params: None,
            optional: Vec::new(),
        }
    }

    pub fn get(path: PathBuilder) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: PathBuilder) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: PathBuilder) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: PathBuilder) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn require(mut self, names: &[&'static str]) -> Self {
        self.required.extend(names.iter().copied().map(RequiredField::new));
        self
    }

    pub fn require_with(mut self, name: &'static str, predicate: FieldPredicate) -> Self {
        self.required
            .push(RequiredField::with_predicate(name, predicate));
        self
    }

    /// Reject `name` with `Invalid <name>` when supplied but not accepted.
    pub fn accept_with(mut self, name: &'static str, predicate: FieldPredicate) -> Self {
        self.optional
            .push(RequiredField::with_predicate(name, predicate));
        self
    }

    /// Query parameters from `keys`, each of which must have a query form.
    pub fn query_keys(mut self, keys: &[&'static str], params: ParamsBuilder) -> Self {
        for &key in keys {
            self = self.accept_with(key, is_query_value);
        }
        self.query(params)
    }

    pub fn body(mut self, builder: PayloadBuilder) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn query(mut self, params: ParamsBuilder) -> Self {
        self.params = Some(params);
        self
    }
}

impl std::fmt::Debug for OperationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDefinition")
            .field("method", &self.method)
            .field("required", &self.required)
            .field("builder", &self.builder.is_some())
            .field("params", &self.params.is_some())
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// Operation name to definition, iterated in name order.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    ops: BTreeMap<&'static str, OperationDefinition>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, def: OperationDefinition) -> Self {
        self.ops.insert(name, def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&OperationDefinition> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.ops.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Copy each named argument into `payload` when present, keeping its key.
pub fn copy_present(payload: &mut Payload, args: &Args, keys: &[&str]) {
    for key in keys {
        copy_present_as(payload, args, key, key);
    }
}

/// Copy argument `from` into `payload[to]` when present.
pub fn copy_present_as(payload: &mut Payload, args: &Args, from: &str, to: &str) {
    if let Some(value) = args.present(from) {
        payload.insert(to.to_string(), value.clone());
    }
}

/// Collect present arguments as query parameters; scalar lists are comma-joined.
pub fn present_params(args: &Args, keys: &[&str]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|key| args.param(key).map(|v| (key.to_string(), v)))
        .collect()
}

pub fn is_object(value: &Value) -> bool {
    value.is_object()
}

pub fn is_non_empty_array(value: &Value) -> bool {
    value.as_array().is_some_and(|a| !a.is_empty())
}

pub fn is_email(value: &Value) -> bool {
    value
        .as_str()
        .and_then(|s| s.split_once('@'))
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'))
}
