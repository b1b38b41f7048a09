//! Gorgias helpdesk REST API (`https://{domain}.gorgias.com/api`).

use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::connectors::{nested_error_message, seg, text_or, Connector};
use crate::dispatch::args::Args;
use crate::dispatch::operation::{
    copy_present, copy_present_as, is_email, present_params, OperationDefinition, OperationTable,
    Payload,
};
use crate::http::executor::ErrorHandling;

pub struct GorgiasConnector {
    ops: OperationTable,
}

impl GorgiasConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "list_tickets",
                OperationDefinition::get(tickets_path).query(list_params),
            )
            .with(
                "get_ticket",
                OperationDefinition::get(ticket_path).require(&["ticket_id"]),
            )
            .with(
                "create_ticket",
                OperationDefinition::post(tickets_path)
                    .require_with("customer_email", is_email)
                    .require(&["message_body"])
                    .body(build_create_ticket),
            )
            .with(
                "update_ticket",
                OperationDefinition::put(ticket_path)
                    .require(&["ticket_id"])
                    .body(build_update_ticket),
            )
            .with(
                "list_customers",
                OperationDefinition::get(customers_path).query(customer_params),
            );
        Self { ops }
    }
}

impl Default for GorgiasConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn tickets_path(_: &Args) -> String {
    "/tickets".to_string()
}

fn ticket_path(args: &Args) -> String {
    format!("/tickets/{}", seg(args, "ticket_id"))
}

fn customers_path(_: &Args) -> String {
    "/customers".to_string()
}

fn list_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, &["limit", "cursor", "order_by", "customer_id", "view_id"])
}

fn customer_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, &["limit", "cursor", "email"])
}

fn build_create_ticket(args: &Args) -> Payload {
    let email = args.text("customer_email").unwrap_or_default();
    let channel = text_or(args, "channel", "email");

    let mut message = Payload::new();
    message.insert("channel".into(), json!(channel));
    message.insert("via".into(), json!(text_or(args, "via", "api")));
    message.insert("from_agent".into(), json!(args.flag("from_agent")));
    message.insert("sender".into(), json!({ "email": email }));
    copy_present_as(&mut message, args, "message_body", "body_text");
    copy_present_as(&mut message, args, "message_html", "body_html");
    copy_present(&mut message, args, &["subject"]);

    let mut payload = Payload::new();
    payload.insert("customer".into(), json!({ "email": email }));
    payload.insert("messages".into(), json!([message]));
    payload.insert("channel".into(), json!(channel));
    payload.insert("via".into(), json!(text_or(args, "via", "api")));
    copy_present(&mut payload, args, &["subject", "status", "priority", "tags", "assignee_user"]);
    payload
}

fn build_update_ticket(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(
        &mut payload,
        args,
        &["status", "subject", "priority", "tags", "assignee_user", "assignee_team", "spam"],
    );
    payload
}

/// Gorgias nests details under `error.msg`; validation errors use `message`.
fn gorgias_error(status: u16, data: &Value) -> Option<String> {
    nested_error_message(status, data).or_else(|| {
        data.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

impl Connector for GorgiasConnector {
    fn name(&self) -> &str {
        "gorgias"
    }

    fn service(&self) -> &str {
        "Gorgias"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn connection_fields(&self) -> &[&'static str] {
        &["domain"]
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["username", "api_key"]
    }

    fn base_url(&self, args: &Args) -> String {
        format!("https://{}.gorgias.com/api", seg(args, "domain"))
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::Basic {
            username: args.text("username").unwrap_or_default(),
            password: args.text("api_key").unwrap_or_default(),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service()).parser(gorgias_error)
    }
}
