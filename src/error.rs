/// Failures of a remote match fetch.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The request never got an HTTP answer (connect, DNS, TLS, timeout).
    #[error("http request failed for {url}: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status code.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The body was not a valid match payload.
    #[error("failed to decode match payload from {url}: {source}")]
    Decode {
        url: String,
        source: reqwest::Error,
    },

    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl FetchError {
    /// True when the failure means the network itself is unreachable.
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// Failures of the durable key-value store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("failed to serialize {key}: {source}")]
    Serialization {
        key: &'static str,
        source: serde_json::Error,
    },

    /// The persisted bytes under `key` could not be parsed back.
    #[error("cached entry {key} is corrupt: {source}")]
    CorruptCache {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Unavailable {
            reason: err.to_string(),
        }
    }
}
