use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::args::Args;
use crate::errors::{RelayError, RelayResult};

pub const CONFIG_FILE_NAME: &str = "relaycall.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    /// Per-connector overrides keyed by registry name (`zendesk`, `gitlab`, ...).
    #[serde(default)]
    pub connectors: HashMap<String, ConnectorSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// Replaces the connector's computed base URL (self-hosted GitLab, test servers).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("relaycall/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn settings_for(&self, connector: &str) -> Option<&ConnectorSettings> {
        self.connectors.get(connector)
    }

    pub fn timeout_for(&self, connector: &str) -> Duration {
        let secs = self
            .settings_for(connector)
            .and_then(|s| s.timeout_secs)
            .unwrap_or(self.http.timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn base_url_for(&self, connector: &str) -> Option<&str> {
        self.settings_for(connector)
            .and_then(|s| s.base_url.as_deref())
            .map(|u| u.trim_end_matches('/'))
    }

    pub fn is_enabled(&self, connector: &str) -> bool {
        self.settings_for(connector).map_or(true, |s| s.enabled)
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> RelayResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(RelayError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("relaycall").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config directory");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

pub fn parse_config(content: &str) -> RelayResult<AppConfig> {
    Ok(toml::from_str(content)?)
}

/// Load the config file, falling back to defaults when none is found.
/// An explicitly requested path must exist.
pub fn load_config(explicit: Option<&Path>) -> RelayResult<AppConfig> {
    let Some(path) = resolve_config_path(explicit)? else {
        tracing::debug!("no {CONFIG_FILE_NAME} found; using defaults");
        return Ok(AppConfig::default());
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        connectors = config.connectors.len(),
        "config loaded"
    );
    Ok(config)
}

/// Environment variable consulted for a missing credential argument,
/// e.g. `RELAYCALL_ZENDESK_API_TOKEN`.
pub fn credential_env_var(connector: &str, field: &str) -> String {
    format!(
        "RELAYCALL_{}_{}",
        connector.to_uppercase(),
        field.to_uppercase()
    )
}

/// Fill absent credential arguments via `lookup`; returns how many were filled.
pub fn apply_credential_fallback<F>(connector: &str, fields: &[&str], args: &mut Args, lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    let mut filled = 0;
    for field in fields {
        if args.is_present(field) {
            continue;
        }
        if let Some(value) = lookup(credential_env_var(connector, field).as_str()).filter(|v| !v.is_empty()) {
            args.insert(field, value);
            filled += 1;
        }
    }
    if filled > 0 {
        tracing::debug!(connector, filled, "credentials filled from environment");
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.http.user_agent.starts_with("relaycall/"));
        assert_eq!(config.timeout_for("zendesk"), Duration::from_secs(30));
        assert!(config.is_enabled("zendesk"));
    }

    #[test]
    fn connector_overrides_apply() {
        let config = parse_config(
            r#"
            [http]
            timeout_secs = 10

            [connectors.gitlab]
            base_url = "https://git.internal.example/"
            timeout_secs = 60

            [connectors.gorgias]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout_for("gitlab"), Duration::from_secs(60));
        assert_eq!(config.timeout_for("hubspot"), Duration::from_secs(10));
        assert_eq!(config.base_url_for("gitlab"), Some("https://git.internal.example"));
        assert_eq!(config.base_url_for("hubspot"), None);
        assert!(!config.is_enabled("gorgias"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(parse_config("[http"), Err(RelayError::TomlDe(_))));
    }

    #[test]
    fn explicit_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\ntimeout_secs = 5").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn fallback_fills_only_missing_fields() {
        let mut args = Args::new().with("email", "agent@example.com");
        let filled = apply_credential_fallback(
            "zendesk",
            &["email", "api_token"],
            &mut args,
            |name| match name {
                "RELAYCALL_ZENDESK_EMAIL" => Some("other@example.com".into()),
                "RELAYCALL_ZENDESK_API_TOKEN" => Some("tok".into()),
                _ => None,
            },
        );
        assert_eq!(filled, 1);
        assert_eq!(args.str("email"), Some("agent@example.com"));
        assert_eq!(args.str("api_token"), Some("tok"));
    }

    #[test]
    fn env_var_name_is_uppercased() {
        assert_eq!(
            credential_env_var("google_docs", "service_account_json"),
            "RELAYCALL_GOOGLE_DOCS_SERVICE_ACCOUNT_JSON"
        );
    }
}
