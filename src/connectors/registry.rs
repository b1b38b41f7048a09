use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{apply_credential_fallback, AppConfig};
use crate::connectors::bigquery::BigQueryConnector;
use crate::connectors::gitlab::GitLabConnector;
use crate::connectors::google_docs::GoogleDocsConnector;
use crate::connectors::gorgias::GorgiasConnector;
use crate::connectors::hubspot::HubSpotConnector;
use crate::connectors::runner::{run, Invocation, RunOptions};
use crate::connectors::servicenow::ServiceNowConnector;
use crate::connectors::zendesk::ZendeskConnector;
use crate::connectors::Connector;
use crate::envelope::{validation_error, Envelope};
use crate::errors::{RelayError, RelayResult};
use crate::http::client::{HttpClient, ReqwestClient};

/// Resolves `RELAYCALL_<CONNECTOR>_<FIELD>` names to credential values.
pub type CredentialLookup = fn(&str) -> Option<String>;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Connectors keyed by name, sharing one HTTP client. Immutable once built, so
/// concurrent invocations can share it behind an `Arc`.
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
    client: Arc<dyn HttpClient>,
    config: AppConfig,
    credential_lookup: CredentialLookup,
}

impl ConnectorRegistry {
    pub fn new(client: Arc<dyn HttpClient>, config: AppConfig) -> Self {
        Self {
            connectors: HashMap::new(),
            client,
            config,
            credential_lookup: env_lookup,
        }
    }

    /// Replace the environment as the source of missing credentials.
    pub fn with_credential_lookup(mut self, lookup: CredentialLookup) -> Self {
        self.credential_lookup = lookup;
        self
    }

    /// All bundled connectors, minus those disabled in config.
    pub fn with_builtin(client: Arc<dyn HttpClient>, config: AppConfig) -> Self {
        let mut registry = Self::new(client, config);
        let builtin: Vec<Arc<dyn Connector>> = vec![
            Arc::new(ZendeskConnector::new()),
            Arc::new(GorgiasConnector::new()),
            Arc::new(HubSpotConnector::new()),
            Arc::new(GitLabConnector::new()),
            Arc::new(ServiceNowConnector::new()),
            Arc::new(BigQueryConnector::new()),
            Arc::new(GoogleDocsConnector::new()),
        ];
        for connector in builtin {
            if registry.config.is_enabled(connector.name()) {
                registry.register(connector);
            } else {
                tracing::info!(connector = connector.name(), "connector disabled in config");
            }
        }
        registry
    }

    /// Build the bundled registry with a `reqwest` client configured from `config`.
    pub fn from_config(config: AppConfig) -> RelayResult<Self> {
        let client = ReqwestClient::new(&config.http.user_agent)?;
        Ok(Self::with_builtin(Arc::new(client), config))
    }

    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.name().to_string(), connector);
    }

    pub fn get(&self, name: &str) -> RelayResult<Arc<dyn Connector>> {
        self.connectors
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::UnknownConnector(name.to_string()))
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connectors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn options_for(&self, name: &str) -> RunOptions {
        RunOptions {
            timeout: self.config.timeout_for(name),
            base_url_override: self.config.base_url_for(name).map(str::to_string),
        }
    }

    /// Run one invocation; unknown connectors become a 400 envelope.
    ///
    /// Credential arguments the caller left out are filled from the
    /// credential lookup before the connector sees them.
    pub async fn invoke(&self, name: &str, invocation: &Invocation) -> Envelope {
        let connector = match self.get(name) {
            Ok(connector) => connector,
            Err(e) => {
                tracing::warn!(connector = name, "unknown connector requested");
                return validation_error(e.to_string(), Some("connector"));
            }
        };
        let fields = connector.credential_fields();
        let invocation = if fields.iter().all(|f| invocation.args.is_present(f)) {
            Cow::Borrowed(invocation)
        } else {
            let mut owned = invocation.clone();
            apply_credential_fallback(name, fields, &mut owned.args, self.credential_lookup);
            Cow::Owned(owned)
        };
        run(
            connector.as_ref(),
            self.client.as_ref(),
            &invocation,
            &self.options_for(name),
        )
        .await
    }
}
