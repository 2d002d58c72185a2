use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::utils::error::{FedilistError, Result};
use crate::utils::validation::{validate_non_empty, validate_url, Validate};

/// Credentials file for the viewer's home server. `client_key` falls back to
/// `client_id`, the name older config files used.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub base_url: String,
    #[serde(default)]
    pub client_key: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub access_token: String,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| FedilistError::ConfigError {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;
        let mut credentials: Credentials = serde_json::from_str(&raw)?;
        if credentials.client_key.is_none() {
            credentials.client_key = credentials.client_id.clone();
        }
        Ok(credentials)
    }
}

impl Validate for Credentials {
    fn validate(&self) -> Result<()> {
        validate_url("base_url", &self.base_url)?;
        validate_non_empty("access_token", &self.access_token)?;
        Ok(())
    }
}
