/// Soft failures of a single fetch. None of these are retried; the next
/// scheduled firing tries again.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("non-200 status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode listGrid body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid source url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
