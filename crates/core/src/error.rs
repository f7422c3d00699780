use thiserror::Error;

/// Errors raised while loading or validating a source list.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid source url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("source url '{0}' must use http or https")]
    UnsupportedScheme(String),

    #[error("empty path for source '{0}'")]
    EmptyPath(String),

    #[error("duplicate source url '{0}'")]
    DuplicateUrl(String),

    #[error("route path '{0}' is used by more than one source")]
    DuplicatePath(String),

    #[error("cache namespace '{0}' is used by more than one source")]
    DuplicateNamespace(String),

    #[error("route path '{0}' is reserved")]
    ReservedPath(String),

    #[error("invalid schedule for '{url}': {reason}")]
    InvalidSchedule { url: String, reason: String },
}
