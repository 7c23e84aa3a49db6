use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Server returned an empty response for {0}")]
    EmptyResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid record URL: {0}")]
    InvalidRecordUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimit,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Gemini API key not configured. Set GEMINI_API_KEY or run 'vozcivica config set summary.key YOUR_KEY'.")]
    NoApiKey,

    #[error("Summary does not match the expected schema: {0}")]
    SummaryDecode(String),

    #[error("{0}")]
    Other(String),
}

impl HarvestError {
    /// Get user-friendly hint for the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NoApiKey => Some(
                "Create a key at https://aistudio.google.com and export GEMINI_API_KEY, \
                 or run: vozcivica config set summary.key YOUR_KEY"
                    .to_string(),
            ),
            Self::Network(_) => Some("Check your internet connection and try again.".to_string()),
            Self::RateLimit => Some("The council site is throttling requests. Raise crawl.page_delay_ms and retry later.".to_string()),
            Self::Storage(_) | Self::Database(_) => Some(
                "The data directory may be unwritable or the store file corrupt. Check storage.data_dir.".to_string(),
            ),
            Self::SummaryDecode(_) => Some("The model answered outside the schema. Running the command again usually helps.".to_string()),
            _ => None,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => !e.is_builder(),
            Self::ServerError(_) | Self::RateLimit | Self::EmptyResponse(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
