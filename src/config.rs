// Configuration comes from the environment, with the access token
// optionally persisted in the user's home directory between runs.

use crate::api::DEFAULT_BASE_URL;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CREDENTIALS_FILE: &str = ".gpt4api-sk.pub";

/// Credentials document issued by the proxy console.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub expired_at: i64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    /// Empty when no token was found; the UI asks for one.
    pub access_token: String,
    pub model: String,
    pub gizmo_id: String,
}

impl Config {
    /// Read `GPT4API_BASE_URL`, `GPT4API_ACCESS_TOKEN`, `GPT4API_MODEL` and
    /// `GPT4API_GIZMO_ID`. Without a token in the environment the one in the
    /// credentials file is used, if any.
    pub fn from_env() -> Self {
        let access_token = env_or("GPT4API_ACCESS_TOKEN", "");
        let access_token = if access_token.is_empty() {
            load_token().unwrap_or_default()
        } else {
            access_token
        };

        Config {
            base_url: env_or("GPT4API_BASE_URL", DEFAULT_BASE_URL),
            access_token,
            model: env_or("GPT4API_MODEL", "gpt-4"),
            gizmo_id: env_or("GPT4API_GIZMO_ID", ""),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.into())
}

/// `GPT4API_CREDENTIALS`, or `~/.gpt4api-sk.pub`.
pub fn credentials_path() -> PathBuf {
    if let Ok(path) = std::env::var("GPT4API_CREDENTIALS") {
        if !path.trim().is_empty() {
            return PathBuf::from(path.trim());
        }
    }
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(CREDENTIALS_FILE)
}

/// Read the access token out of a credentials file. An empty file is an
/// error.
pub fn parse_credentials(path: &Path) -> Result<String> {
    let data = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if data.trim().is_empty() {
        bail!("{} has no token", path.display());
    }
    let creds: Credentials =
        serde_json::from_str(&data).with_context(|| format!("Invalid credentials in {}", path.display()))?;
    Ok(creds.access_token)
}

/// Store `token` as a credentials document at `path`.
pub fn write_credentials(path: &Path, token: &str) -> Result<()> {
    let creds = Credentials {
        access_token: token.to_string(),
        ..Default::default()
    };
    std::fs::write(path, serde_json::to_vec_pretty(&creds)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Persist the access token into the credentials file.
pub fn persist_token(token: &str) -> Result<()> {
    write_credentials(&credentials_path(), token)
}

/// Load the access token from the credentials file.
pub fn load_token() -> Result<String> {
    parse_credentials(&credentials_path())
}
