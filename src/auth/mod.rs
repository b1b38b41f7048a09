pub mod google;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::AuthError;
use crate::http::client::HttpClient;

/// Credentials for one connector call, built from the invocation arguments.
#[derive(Clone)]
pub enum Credentials {
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    GoogleServiceAccount {
        key_json: String,
        scopes: Vec<String>,
        /// User to impersonate through domain-wide delegation.
        subject: Option<String>,
    },
}

impl Credentials {
    /// Scheme name reported in dry-run previews.
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::Basic { .. } => "basic",
            Credentials::Bearer { .. } => "bearer",
            Credentials::GoogleServiceAccount { .. } => "google_service_account",
        }
    }

    /// Resolve request headers. Only the Google scheme touches the network.
    pub async fn authorize(
        &self,
        client: &dyn HttpClient,
        timeout: Duration,
    ) -> Result<Vec<(String, String)>, AuthError> {
        let value = match self {
            Credentials::Basic { username, password } => basic_header(username, password),
            Credentials::Bearer { token } => bearer_header(token),
            Credentials::GoogleServiceAccount {
                key_json,
                scopes,
                subject,
            } => {
                let token = google::fetch_access_token(
                    client,
                    key_json,
                    scopes,
                    subject.as_deref(),
                    timeout,
                )
                .await?;
                bearer_header(&token)
            }
        };
        Ok(vec![("Authorization".to_string(), value)])
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
            Credentials::GoogleServiceAccount { scopes, subject, .. } => f
                .debug_struct("GoogleServiceAccount")
                .field("scopes", scopes)
                .field("subject", subject)
                .finish_non_exhaustive(),
        }
    }
}

pub fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub fn bearer_header(token: &str) -> String {
    format!("Bearer {token}")
}
