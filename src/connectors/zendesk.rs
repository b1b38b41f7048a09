//! Zendesk Support API v2 (`https://{subdomain}.zendesk.com/api/v2`).
//!
//! Authenticates with an API token over Basic auth (`{email}/token:{api_token}`).

use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::connectors::{seg, Connector};
use crate::dispatch::args::Args;
use crate::dispatch::operation::{
    copy_present, copy_present_as, present_params, OperationDefinition, OperationTable, Payload,
};
use crate::http::executor::ErrorHandling;

pub struct ZendeskConnector {
    ops: OperationTable,
}

impl ZendeskConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "get_ticket",
                OperationDefinition::get(ticket_path).require(&["ticket_id"]),
            )
            .with(
                "list_tickets",
                OperationDefinition::get(tickets_path).query(list_params),
            )
            .with(
                "create_ticket",
                OperationDefinition::post(tickets_path)
                    .require(&["subject", "comment_body"])
                    .body(build_create_ticket),
            )
            .with(
                "update_ticket",
                OperationDefinition::put(ticket_path)
                    .require(&["ticket_id"])
                    .body(build_update_ticket),
            )
            .with(
                "add_comment",
                OperationDefinition::put(ticket_path)
                    .require(&["ticket_id", "comment_body"])
                    .body(build_add_comment),
            )
            .with(
                "search",
                OperationDefinition::get(search_path)
                    .require(&["query"])
                    .query(search_params),
            );
        Self { ops }
    }
}

impl Default for ZendeskConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn tickets_path(_: &Args) -> String {
    "/tickets.json".to_string()
}

fn ticket_path(args: &Args) -> String {
    format!("/tickets/{}.json", seg(args, "ticket_id"))
}

fn search_path(_: &Args) -> String {
    "/search.json".to_string()
}

fn list_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, &["page", "per_page", "sort_by", "sort_order"])
}

fn search_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, &["query", "page", "per_page", "sort_by", "sort_order"])
}

/// `{"body": ..., "public": ...}`; `public` only when supplied.
fn comment(args: &Args) -> Value {
    let mut comment = Payload::new();
    copy_present_as(&mut comment, args, "comment_body", "body");
    copy_present_as(&mut comment, args, "public", "public");
    Value::Object(comment)
}

fn build_create_ticket(args: &Args) -> Payload {
    let mut ticket = Payload::new();
    copy_present(&mut ticket, args, &["subject"]);
    ticket.insert("comment".into(), comment(args));
    copy_present(
        &mut ticket,
        args,
        &[
            "priority",
            "status",
            "type",
            "tags",
            "requester_id",
            "assignee_id",
            "group_id",
            "custom_fields",
        ],
    );
    let mut payload = Payload::new();
    payload.insert("ticket".into(), Value::Object(ticket));
    payload
}

fn build_update_ticket(args: &Args) -> Payload {
    let mut ticket = Payload::new();
    copy_present(
        &mut ticket,
        args,
        &[
            "subject",
            "priority",
            "status",
            "type",
            "tags",
            "assignee_id",
            "group_id",
            "custom_fields",
        ],
    );
    if args.is_present("comment_body") {
        ticket.insert("comment".into(), comment(args));
    }
    let mut payload = Payload::new();
    payload.insert("ticket".into(), Value::Object(ticket));
    payload
}

fn build_add_comment(args: &Args) -> Payload {
    let mut payload = Payload::new();
    payload.insert("ticket".into(), json!({ "comment": comment(args) }));
    payload
}

/// Zendesk returns either `{"error": "...", "description": "..."}` or
/// `{"error": {"title": ..., "message": ...}}`.
fn zendesk_error(_status: u16, data: &Value) -> Option<String> {
    if let Some(description) = data.get("description").and_then(Value::as_str) {
        return Some(description.to_string());
    }
    match data.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .or_else(|| obj.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

impl Connector for ZendeskConnector {
    fn name(&self) -> &str {
        "zendesk"
    }

    fn service(&self) -> &str {
        "Zendesk"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn connection_fields(&self) -> &[&'static str] {
        &["subdomain"]
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["email", "api_token"]
    }

    fn base_url(&self, args: &Args) -> String {
        format!("https://{}.zendesk.com/api/v2", seg(args, "subdomain"))
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::Basic {
            username: format!("{}/token", args.text("email").unwrap_or_default()),
            password: args.text("api_token").unwrap_or_default(),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service())
            .parser(zendesk_error)
            .request_error("Failed to connect to Zendesk API")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::runner::{run, Invocation, RunOptions};
    use crate::dispatch::validate_and_build_payload;
    use crate::http::stub::StubClient;
    use std::collections::BTreeSet;

    fn base_args(operation: &str) -> Args {
        Args::new()
            .with("operation", operation)
            .with("subdomain", "acme")
            .with("email", "agent@acme.com")
            .with("api_token", "tok")
    }

    #[test]
    fn create_ticket_keys_match_supplied_fields() {
        let connector = ZendeskConnector::new();
        let args = base_args("create_ticket")
            .with("subject", "Printer on fire")
            .with("comment_body", "Please help")
            .with("priority", "urgent")
            .with("status", "")
            .with("tags", json!(["hardware"]))
            .with("unknown_flag", true);

        let payload = validate_and_build_payload("create_ticket", connector.operations(), &args)
            .unwrap()
            .unwrap();
        let ticket = payload["ticket"].as_object().unwrap();
        let keys: BTreeSet<&str> = ticket.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            BTreeSet::from(["subject", "comment", "priority", "tags"])
        );
        assert_eq!(ticket["comment"], json!({"body": "Please help"}));
        assert!(ticket.values().all(|v| !v.is_null()));
    }

    #[test]
    fn update_without_comment_omits_it() {
        let connector = ZendeskConnector::new();
        let args = base_args("update_ticket")
            .with("ticket_id", 9)
            .with("status", "solved");
        let payload = validate_and_build_payload("update_ticket", connector.operations(), &args)
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(payload), json!({"ticket": {"status": "solved"}}));
    }

    #[test]
    fn get_ticket_has_no_body() {
        let connector = ZendeskConnector::new();
        let args = base_args("get_ticket").with("ticket_id", "12");
        assert_eq!(
            validate_and_build_payload("get_ticket", connector.operations(), &args),
            Ok(None)
        );
    }

    #[test]
    fn error_parser_prefers_description() {
        assert_eq!(
            zendesk_error(
                422,
                &json!({"error": "RecordInvalid", "description": "Record validation errors"})
            ),
            Some("Record validation errors".to_string())
        );
        assert_eq!(
            zendesk_error(404, &json!({"error": {"title": "No help desk at acme.zendesk.com"}})),
            Some("No help desk at acme.zendesk.com".to_string())
        );
        assert_eq!(zendesk_error(500, &json!({})), None);
    }

    #[tokio::test]
    async fn add_comment_live_call() {
        let client = StubClient::new().respond(200, r#"{"ticket": {"id": 5}}"#);
        let args = base_args("add_comment")
            .with("ticket_id", 5)
            .with("comment_body", "Following up")
            .with("public", false);
        let env = run(
            &ZendeskConnector::new(),
            &client,
            &Invocation::new(args),
            &RunOptions::default(),
        )
        .await;

        assert_eq!(env.output, json!({"ticket": {"id": 5}}));
        let sent = &client.requests()[0];
        assert_eq!(sent.url, "https://acme.zendesk.com/api/v2/tickets/5.json");
        assert_eq!(
            sent.body,
            crate::http::client::RequestBody::Json(
                json!({"ticket": {"comment": {"body": "Following up", "public": false}}})
            )
        );
        assert!(sent.headers.contains(&(
            "Authorization".to_string(),
            crate::auth::basic_header("agent@acme.com/token", "tok")
        )));
    }

    #[tokio::test]
    async fn search_passes_query_param() {
        let client = StubClient::new();
        let env = run(
            &ZendeskConnector::new(),
            &client,
            &Invocation::new(
                base_args("search")
                    .with("query", "type:ticket status:open")
                    .with("dry_run", true),
            ),
            &RunOptions::default(),
        )
        .await;
        assert_eq!(
            env.output["preview"]["params"],
            json!({"query": "type:ticket status:open"})
        );
        assert_eq!(env.output["preview"]["url"], json!("https://acme.zendesk.com/api/v2/search.json"));
    }
}
