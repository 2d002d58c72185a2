use thiserror::Error;

#[derive(Error, Debug)]
pub enum FedilistError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Profile URL has no hostname: {0}")]
    MalformedUrl(String),

    #[error("{0} was not found")]
    NotFound(String),

    #[error("Must use the full account address (user@domain), got {0:?}")]
    InvalidAddress(String),

    #[error("CSV row at line {line} has no account address")]
    MissingAddress { line: u64 },

    #[error("Cannot add {address} to a list while the follow request is pending")]
    PendingFollow { address: String },

    #[error("Remote server returned status {status}: {message}")]
    DirectoryError { status: u16, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

pub type Result<T> = std::result::Result<T, FedilistError>;
