//! Resolution of the completion endpoint credential.
//!
//! The API key can be given inline (local testing), as a file (Docker
//! secrets) or as an environment variable name (the default, `GROQ_API_KEY`).
//! The first non-empty source wins.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::config::AiConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Secret from {origin} is empty")]
    Empty { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a secret is looked up, in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub direct: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    pub fn from_ai_config(ai: &'a AiConfig) -> Self {
        Self {
            direct: ai.api_key.as_deref(),
            file_path: ai.api_key_file.as_deref(),
            env_var: ai.api_key_env_var.as_deref(),
        }
    }

    /// True when at least one non-empty source is configured.
    pub fn is_configured(&self) -> bool {
        [self.direct, self.file_path, self.env_var]
            .iter()
            .any(|s| s.is_some_and(|s| !s.is_empty()))
    }
}

/// Resolves a secret from the first configured source.
pub fn resolve_secret(source: SecretSource<'_>) -> Result<SecretString> {
    if let Some(value) = source.direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = source.file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = std::fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::Empty {
                origin: format!("file '{}'", expanded.display()),
            });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = source.env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            // Env vars set from files often carry a trailing newline.
            Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value.trim())),
            Ok(_) => Err(SecretError::Empty {
                origin: format!("environment variable '{}'", name),
            }),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Resolves the completion API key for the given AI settings.
///
/// Returns `Ok(None)` when no source is configured at all, which is valid
/// for endpoints that do not require authentication (local gateways).
pub fn resolve_api_key(ai: &AiConfig) -> Result<Option<SecretString>> {
    match resolve_secret(SecretSource::from_ai_config(ai)) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the home directory. `~user/...` is not supported.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return match path.strip_prefix("~/") {
                Some(rest) => home.join(rest),
                None => home,
            };
        }
    }
    PathBuf::from(path)
}
