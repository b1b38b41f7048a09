//! Google service-account authentication (OAuth 2.0 JWT-bearer grant).
//!
//! A signed RS256 assertion is exchanged at the key's `token_uri` for a
//! short-lived access token, which is then sent as a Bearer token.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;
use crate::http::client::{HttpClient, HttpMethod, HttpRequest, RequestBody};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let key: Self = serde_json::from_str(raw)
            .map_err(|e| AuthError::InvalidServiceAccount(e.to_string()))?;
        if key.client_email.trim().is_empty() || key.private_key.trim().is_empty() {
            return Err(AuthError::InvalidServiceAccount(
                "client_email and private_key must not be empty".into(),
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

/// Sign the JWT-bearer assertion for `scopes`, optionally impersonating `subject`.
pub fn signed_assertion(
    key: &ServiceAccountKey,
    scopes: &[String],
    subject: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let iat = now.timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: scopes.join(" "),
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
        sub: subject,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &encoding_key,
    )?)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange the service-account key for an access token (one POST).
pub async fn fetch_access_token(
    client: &dyn HttpClient,
    key_json: &str,
    scopes: &[String],
    subject: Option<&str>,
    timeout: Duration,
) -> Result<String, AuthError> {
    let key = ServiceAccountKey::from_json(key_json)?;
    let assertion = signed_assertion(&key, scopes, subject, Utc::now())?;

    let mut request = HttpRequest::new(HttpMethod::Post, key.token_uri.clone(), timeout);
    request.body = RequestBody::Form(vec![
        ("grant_type".to_string(), JWT_BEARER_GRANT.to_string()),
        ("assertion".to_string(), assertion),
    ]);

    tracing::debug!(client_email = %key.client_email, token_uri = %key.token_uri, "exchanging service account assertion");
    let response = client
        .send(request)
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let parsed: TokenResponse = serde_json::from_str(response.text()).map_err(|_| {
        AuthError::TokenExchange(format!(
            "token endpoint returned non-JSON body (HTTP {})",
            response.status
        ))
    })?;

    match parsed.access_token {
        Some(token) if response.is_ok() && !token.is_empty() => Ok(token),
        _ => {
            let reason = parsed
                .error_description
                .or(parsed.error)
                .unwrap_or_else(|| format!("HTTP {}", response.status));
            tracing::warn!(client_email = %key.client_email, status = response.status, "token exchange rejected");
            Err(AuthError::TokenExchange(reason))
        }
    }
}
