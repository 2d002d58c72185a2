use crate::utils::error::{FedilistError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(FedilistError::ConfigError {
            message: format!("{field_name} cannot be empty"),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(FedilistError::ConfigError {
                message: format!("{field_name} has unsupported URL scheme: {scheme}"),
            }),
        },
        Err(e) => Err(FedilistError::ConfigError {
            message: format!("{field_name} is not a valid URL: {e}"),
        }),
    }
}

pub fn validate_non_empty(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(FedilistError::ConfigError {
            message: format!("{field_name} cannot be empty"),
        });
    }
    Ok(())
}
