//! GitLab REST API v4. `base_url` selects a self-managed instance.

use serde_json::Value;

use crate::auth::Credentials;
use crate::connectors::{seg, Connector};
use crate::dispatch::args::Args;
use crate::dispatch::operation::{
    copy_present, present_params, OperationDefinition, OperationTable, Payload,
};
use crate::http::executor::ErrorHandling;

const DEFAULT_BASE_URL: &str = "https://gitlab.com";

const ISSUE_FILTERS: &[&str] = &[
    "state",
    "labels",
    "milestone",
    "search",
    "assignee_id",
    "per_page",
    "page",
];

pub struct GitLabConnector {
    ops: OperationTable,
}

impl GitLabConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "get_project",
                OperationDefinition::get(project_path).require(&["project_id"]),
            )
            .with(
                "list_issues",
                OperationDefinition::get(issues_path)
                    .require(&["project_id"])
                    .query_keys(ISSUE_FILTERS, issue_params),
            )
            .with(
                "get_issue",
                OperationDefinition::get(issue_path).require(&["project_id", "issue_iid"]),
            )
            .with(
                "create_issue",
                OperationDefinition::post(issues_path)
                    .require(&["project_id", "title"])
                    .body(build_create_issue),
            )
            .with(
                "update_issue",
                OperationDefinition::put(issue_path)
                    .require(&["project_id", "issue_iid"])
                    .body(build_update_issue),
            )
            .with(
                "add_issue_note",
                OperationDefinition::post(notes_path)
                    .require(&["project_id", "issue_iid", "body"])
                    .body(build_note),
            )
            .with(
                "create_merge_request",
                OperationDefinition::post(merge_requests_path)
                    .require(&["project_id", "source_branch", "target_branch", "title"])
                    .body(build_merge_request),
            );
        Self { ops }
    }
}

impl Default for GitLabConnector {
    fn default() -> Self {
        Self::new()
    }
}

// Project ids may be numeric or a `group/project` path; `seg` encodes the slash.
fn project_path(args: &Args) -> String {
    format!("/projects/{}", seg(args, "project_id"))
}

fn issues_path(args: &Args) -> String {
    format!("{}/issues", project_path(args))
}

fn issue_path(args: &Args) -> String {
    format!("{}/{}", issues_path(args), seg(args, "issue_iid"))
}

fn notes_path(args: &Args) -> String {
    format!("{}/notes", issue_path(args))
}

fn merge_requests_path(args: &Args) -> String {
    format!("{}/merge_requests", project_path(args))
}

fn issue_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, ISSUE_FILTERS)
}

fn build_create_issue(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(
        &mut payload,
        args,
        &[
            "title",
            "description",
            "labels",
            "assignee_ids",
            "milestone_id",
            "due_date",
            "confidential",
        ],
    );
    payload
}

fn build_update_issue(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(
        &mut payload,
        args,
        &[
            "title",
            "description",
            "labels",
            "add_labels",
            "remove_labels",
            "assignee_ids",
            "milestone_id",
            "state_event",
            "due_date",
        ],
    );
    payload
}

fn build_note(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(&mut payload, args, &["body", "internal"]);
    payload
}

fn build_merge_request(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(
        &mut payload,
        args,
        &[
            "source_branch",
            "target_branch",
            "title",
            "description",
            "labels",
            "assignee_id",
            "remove_source_branch",
            "squash",
        ],
    );
    payload
}

/// `message` is a string, or an object of field -> errors for validation failures.
fn gitlab_error(_status: u16, data: &Value) -> Option<String> {
    match data.get("message") {
        Some(Value::String(s)) => return Some(s.clone()),
        Some(Value::Object(fields)) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(field, errs)| match errs {
                    Value::Array(list) => {
                        let joined: Vec<&str> = list.iter().filter_map(Value::as_str).collect();
                        format!("{field} {}", joined.join(", "))
                    }
                    other => format!("{field} {other}"),
                })
                .collect();
            if !parts.is_empty() {
                return Some(parts.join("; "));
            }
        }
        Some(Value::Array(list)) => {
            let joined: Vec<&str> = list.iter().filter_map(Value::as_str).collect();
            if !joined.is_empty() {
                return Some(joined.join("; "));
            }
        }
        _ => {}
    }
    data.get("error_description")
        .or_else(|| data.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl Connector for GitLabConnector {
    fn name(&self) -> &str {
        "gitlab"
    }

    fn service(&self) -> &str {
        "GitLab"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["private_token"]
    }

    fn base_url(&self, args: &Args) -> String {
        let host = args
            .str("base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{host}/api/v4")
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::Bearer {
            token: args.text("private_token").unwrap_or_default(),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service()).parser(gitlab_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::runner::prepare;
    use serde_json::json;

    fn args(operation: &str) -> Args {
        Args::new()
            .with("operation", operation)
            .with("private_token", "glpat-xyz")
            .with("project_id", "platform/api")
    }

    #[test]
    fn project_path_is_encoded() {
        let call = prepare(&GitLabConnector::new(), &args("get_issue").with("issue_iid", 42), None)
            .unwrap();
        assert_eq!(
            call.url,
            "https://gitlab.com/api/v4/projects/platform%2Fapi/issues/42"
        );
        assert!(call.payload.is_none());
    }

    #[test]
    fn label_list_becomes_comma_separated_filter() {
        let call = prepare(
            &GitLabConnector::new(),
            &args("list_issues")
                .with("labels", json!(["bug", "ui"]))
                .with("state", "opened"),
            None,
        )
        .unwrap();
        assert_eq!(
            call.params,
            vec![
                ("state".to_string(), "opened".to_string()),
                ("labels".to_string(), "bug,ui".to_string()),
            ]
        );
    }

    #[test]
    fn object_filter_is_rejected() {
        let err = prepare(
            &GitLabConnector::new(),
            &args("list_issues").with("assignee_id", json!({"id": 5})),
            None,
        )
        .unwrap_err();
        assert_eq!(err.status, Some(400));
        assert_eq!(err.error_message(), Some("Invalid assignee_id"));
        assert_eq!(err.output["field"], json!("assignee_id"));
    }

    #[test]
    fn self_managed_base_url() {
        let call = prepare(
            &GitLabConnector::new(),
            &args("get_project").with("base_url", "https://git.corp.example/"),
            None,
        )
        .unwrap();
        assert_eq!(call.url, "https://git.corp.example/api/v4/projects/platform%2Fapi");
    }

    #[test]
    fn merge_request_requires_branches_in_order() {
        let err = prepare(
            &GitLabConnector::new(),
            &args("create_merge_request").with("title", "Bump deps"),
            None,
        )
        .unwrap_err();
        assert_eq!(err.output["field"], json!("source_branch"));
    }

    #[test]
    fn note_payload() {
        let call = prepare(
            &GitLabConnector::new(),
            &args("add_issue_note")
                .with("issue_iid", 3)
                .with("body", "LGTM")
                .with("internal", false),
            None,
        )
        .unwrap();
        assert_eq!(
            Value::Object(call.payload.unwrap()),
            json!({"body": "LGTM", "internal": false})
        );
        assert!(call.url.ends_with("/issues/3/notes"));
    }

    #[test]
    fn list_issues_params() {
        let call = prepare(
            &GitLabConnector::new(),
            &args("list_issues").with("state", "opened").with("per_page", 50),
            None,
        )
        .unwrap();
        assert_eq!(
            call.params,
            vec![
                ("state".to_string(), "opened".to_string()),
                ("per_page".to_string(), "50".to_string()),
            ]
        );
    }

    #[test]
    fn error_parser_flattens_validation_messages() {
        assert_eq!(
            gitlab_error(400, &json!({"message": {"title": ["can't be blank"]}})),
            Some("title can't be blank".to_string())
        );
        assert_eq!(
            gitlab_error(404, &json!({"message": "404 Project Not Found"})),
            Some("404 Project Not Found".to_string())
        );
        assert_eq!(
            gitlab_error(401, &json!({"error": "invalid_token", "error_description": "Token was revoked."})),
            Some("Token was revoked.".to_string())
        );
    }
}
