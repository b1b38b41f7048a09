use thiserror::Error;

use crate::dispatch::args::Args;
use crate::dispatch::operation::{OperationTable, Payload, RequiredField};
use crate::envelope::{validation_error, Envelope};

/// A required argument was missing, blank, or rejected by its predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub message: String,
    pub field: String,
}

impl ValidationFailure {
    pub fn missing(field: &str) -> Self {
        Self {
            message: format!("Missing required {field}"),
            field: field.to_string(),
        }
    }

    pub fn invalid(field: &str) -> Self {
        Self {
            message: format!("Invalid {field}"),
            field: field.to_string(),
        }
    }
}

impl From<ValidationFailure> for Envelope {
    fn from(failure: ValidationFailure) -> Self {
        validation_error(failure.message, Some(&failure.field))
    }
}

/// Validate `supplied` against the definition of `operation` and build its body.
///
/// Returns `Ok(None)` when the operation sends no body. Callers are expected to
/// check table membership first; an unknown name still fails cleanly.
pub fn validate_and_build_payload(
    operation: &str,
    operations: &OperationTable,
    supplied: &Args,
) -> Result<Option<Payload>, ValidationFailure> {
    let Some(def) = operations.get(operation) else {
        return Err(ValidationFailure {
            message: format!("Unsupported operation: {operation}"),
            field: "operation".to_string(),
        });
    };

    check_required(&def.required, supplied)?;
    check_optional(&def.optional, supplied)?;

    Ok(def.builder.map(|build| build(supplied)))
}

/// First failing field in declared order wins.
pub fn check_required(fields: &[RequiredField], supplied: &Args) -> Result<(), ValidationFailure> {
    for field in fields {
        let Some(value) = supplied.present(field.name) else {
            return Err(ValidationFailure::missing(field.name));
        };
        if let Some(accepts) = field.predicate {
            if !accepts(value) {
                return Err(ValidationFailure::invalid(field.name));
            }
        }
    }
    Ok(())
}

/// Supplied optional arguments must satisfy their predicate; absent ones pass.
pub fn check_optional(fields: &[RequiredField], supplied: &Args) -> Result<(), ValidationFailure> {
    for field in fields {
        let (Some(value), Some(accepts)) = (supplied.present(field.name), field.predicate) else {
            continue;
        };
        if !accepts(value) {
            return Err(ValidationFailure::invalid(field.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::operation::{
        copy_present, is_non_empty_array, present_params, OperationDefinition,
    };
    use assert_matches::assert_matches;
    use serde_json::{json, Value};

    fn path(_: &Args) -> String {
        "/things".to_string()
    }

    fn build_thing(args: &Args) -> Payload {
        let mut payload = Payload::new();
        copy_present(&mut payload, args, &["a", "b", "note"]);
        payload
    }

    fn label_params(args: &Args) -> Vec<(String, String)> {
        present_params(args, &["labels"])
    }

    fn table() -> OperationTable {
        OperationTable::new()
            .with(
                "create",
                OperationDefinition::post(path)
                    .require(&["a", "b"])
                    .body(build_thing),
            )
            .with("list", OperationDefinition::get(path).require(&["a"]))
            .with(
                "bulk",
                OperationDefinition::post(path)
                    .require_with("rows", is_non_empty_array)
                    .body(build_thing),
            )
            .with(
                "search",
                OperationDefinition::get(path).query_keys(&["labels"], label_params),
            )
    }

    #[test]
    fn optional_query_values_are_checked_only_when_supplied() {
        assert_matches!(
            validate_and_build_payload("search", &table(), &Args::new()),
            Ok(None)
        );
        let args = Args::new().with("labels", json!(["bug", "ui"]));
        assert_matches!(validate_and_build_payload("search", &table(), &args), Ok(None));

        let args = Args::new().with("labels", json!({"name": "bug"}));
        let err = validate_and_build_payload("search", &table(), &args).unwrap_err();
        assert_eq!(err.message, "Invalid labels");
        assert_eq!(err.field, "labels");
    }

    #[test]
    fn missing_second_field_is_named_despite_extra_keys() {
        let args = Args::new().with("a", 1).with("unrelated", "x").with("z", true);
        let err = validate_and_build_payload("create", &table(), &args).unwrap_err();
        assert_eq!(err.field, "b");
        assert_eq!(err.message, "Missing required b");
    }

    #[test]
    fn first_missing_field_in_declared_order() {
        let err = validate_and_build_payload("create", &table(), &Args::new()).unwrap_err();
        assert_eq!(err.field, "a");
    }

    #[test]
    fn empty_string_and_null_count_as_missing() {
        let args = Args::new().with("a", "").with("b", "x");
        assert_eq!(
            validate_and_build_payload("create", &table(), &args)
                .unwrap_err()
                .field,
            "a"
        );
        let args = Args::new().with("a", "x").with("b", Value::Null);
        assert_eq!(
            validate_and_build_payload("create", &table(), &args)
                .unwrap_err()
                .field,
            "b"
        );
    }

    #[test]
    fn no_builder_yields_none() {
        let args = Args::new().with("a", "x");
        assert_matches!(validate_and_build_payload("list", &table(), &args), Ok(None));
    }

    #[test]
    fn builder_ignores_unrecognized_keys() {
        let args = Args::new()
            .with("a", "x")
            .with("b", 2)
            .with("surprise", "ignored")
            .with("note", "");
        let payload = validate_and_build_payload("create", &table(), &args)
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(payload), json!({"a": "x", "b": 2}));
    }

    #[test]
    fn predicate_rejection_reports_invalid() {
        let args = Args::new().with("rows", json!([]));
        let err = validate_and_build_payload("bulk", &table(), &args).unwrap_err();
        assert_eq!(err, ValidationFailure::invalid("rows"));
        assert_eq!(err.message, "Invalid rows");
    }

    #[test]
    fn unknown_operation_fails_without_panicking() {
        let err = validate_and_build_payload("delete", &table(), &Args::new()).unwrap_err();
        assert_eq!(err.field, "operation");
        assert_eq!(err.message, "Unsupported operation: delete");
    }

    #[test]
    fn failure_converts_to_validation_envelope() {
        let env: Envelope = ValidationFailure::missing("subject").into();
        assert_eq!(env.status, Some(400));
        assert_eq!(
            env.output,
            json!({"error": "Missing required subject", "field": "subject"})
        );
    }
}
