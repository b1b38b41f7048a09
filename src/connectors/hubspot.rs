//! HubSpot CRM v3 objects API.

use serde_json::{json, Value};

use crate::auth::Credentials;
use crate::connectors::{seg, text_or, Connector};
use crate::dispatch::args::{is_present, Args};
use crate::dispatch::operation::{
    copy_present, copy_present_as, is_email, present_params, OperationDefinition,
    OperationTable, Payload,
};
use crate::http::executor::ErrorHandling;

const BASE_URL: &str = "https://api.hubapi.com";
const CONTACT_PROPERTIES: &[&str] = &[
    "email",
    "firstname",
    "lastname",
    "phone",
    "company",
    "website",
    "lifecyclestage",
];

pub struct HubSpotConnector {
    ops: OperationTable,
}

impl HubSpotConnector {
    pub fn new() -> Self {
        let ops = OperationTable::new()
            .with(
                "get_contact",
                OperationDefinition::get(contact_path)
                    .require(&["contact_id"])
                    .query_keys(CONTACT_QUERY, contact_params),
            )
            .with(
                "create_contact",
                OperationDefinition::post(contacts_path)
                    .require_with("email", is_email)
                    .body(build_contact),
            )
            .with(
                "update_contact",
                OperationDefinition::patch(contact_path)
                    .require(&["contact_id"])
                    .body(build_contact),
            )
            .with(
                "search_contacts",
                OperationDefinition::post(search_path)
                    .require(&["query"])
                    .body(build_search),
            )
            .with(
                "create_ticket",
                OperationDefinition::post(tickets_path)
                    .require(&["subject"])
                    .body(build_ticket),
            );
        Self { ops }
    }
}

impl Default for HubSpotConnector {
    fn default() -> Self {
        Self::new()
    }
}

fn contacts_path(_: &Args) -> String {
    "/crm/v3/objects/contacts".to_string()
}

fn contact_path(args: &Args) -> String {
    format!("/crm/v3/objects/contacts/{}", seg(args, "contact_id"))
}

fn search_path(_: &Args) -> String {
    "/crm/v3/objects/contacts/search".to_string()
}

fn tickets_path(_: &Args) -> String {
    "/crm/v3/objects/tickets".to_string()
}

const CONTACT_QUERY: &[&str] = &["properties", "archived"];

fn contact_params(args: &Args) -> Vec<(String, String)> {
    present_params(args, CONTACT_QUERY)
}

/// Known contact fields plus an optional free-form `properties` object.
fn build_contact(args: &Args) -> Payload {
    let mut properties = Payload::new();
    if let Some(Value::Object(extra)) = args.present("properties") {
        properties.extend(
            extra
                .iter()
                .filter(|(_, v)| is_present(v))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }
    copy_present(&mut properties, args, CONTACT_PROPERTIES);
    let mut payload = Payload::new();
    payload.insert("properties".into(), Value::Object(properties));
    payload
}

fn build_search(args: &Args) -> Payload {
    let mut payload = Payload::new();
    copy_present(&mut payload, args, &["query", "after", "sorts"]);
    payload.insert(
        "limit".into(),
        args.present("limit").cloned().unwrap_or_else(|| json!(10)),
    );
    if let Some(props) = args.present("return_properties") {
        payload.insert("properties".into(), props.clone());
    }
    payload
}

fn build_ticket(args: &Args) -> Payload {
    let mut properties = Payload::new();
    copy_present(&mut properties, args, &["subject", "content"]);
    copy_present_as(&mut properties, args, "priority", "hs_ticket_priority");
    properties.insert("hs_pipeline".into(), json!(text_or(args, "pipeline", "0")));
    properties.insert(
        "hs_pipeline_stage".into(),
        json!(text_or(args, "pipeline_stage", "1")),
    );
    let mut payload = Payload::new();
    payload.insert("properties".into(), Value::Object(properties));
    if let Some(assoc) = args.present("associations").filter(|v| v.is_array()) {
        payload.insert("associations".into(), assoc.clone());
    }
    payload
}

impl Connector for HubSpotConnector {
    fn name(&self) -> &str {
        "hubspot"
    }

    fn service(&self) -> &str {
        "HubSpot"
    }

    fn operations(&self) -> &OperationTable {
        &self.ops
    }

    fn credential_fields(&self) -> &[&'static str] {
        &["access_token"]
    }

    fn base_url(&self, _args: &Args) -> String {
        BASE_URL.to_string()
    }

    fn credentials(&self, args: &Args) -> Credentials {
        Credentials::Bearer {
            token: args.text("access_token").unwrap_or_default(),
        }
    }

    fn error_handling(&self) -> ErrorHandling {
        ErrorHandling::new(self.service()).key("message")
    }
}
