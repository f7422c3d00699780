//! Source configuration: the wire shape of one configured remote table and
//! the resolved form the rest of the workspace works with.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Paths served by the admin surface; sources may not claim them.
pub const RESERVED_PATHS: &[&str] = &["/health", "/config"];

/// One configured source, exactly as it arrives from a config feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Base URL of the remote instance (e.g. `https://dhis.example.org/api/`).
    pub dhis_url: String,
    /// Path resolved against `dhis_url`; also the HTTP path the lookup is mounted on.
    pub dhis_path: String,
    /// 5-field or 6-field cron expression.
    pub cron_pattern: String,
    /// IANA timezone for the cron pattern (empty = UTC).
    #[serde(default)]
    pub cron_timezone: String,
}

impl SourceConfig {
    /// Resolve `dhis_path` against `dhis_url` into the source's absolute URL.
    pub fn resolve_url(&self) -> Result<Url, ConfigError> {
        let base = Url::parse(self.dhis_url.trim()).map_err(|source| ConfigError::InvalidUrl {
            url: self.dhis_url.clone(),
            source,
        })?;
        let url = base
            .join(self.dhis_path.trim())
            .map_err(|source| ConfigError::InvalidUrl {
                url: format!("{} + {}", self.dhis_url, self.dhis_path),
                source,
            })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(ConfigError::UnsupportedScheme(url.to_string())),
        }
    }

    /// The HTTP path the lookup handler for this source is mounted on.
    pub fn route_path(&self) -> String {
        normalize_route_path(&self.dhis_path)
    }
}

/// Normalize a route path: leading `/`, no trailing `/` (except root).
pub fn normalize_route_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{}", trimmed)
}

/// A validated source with its identity and derived names computed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    /// Absolute URL; the identity key of the source.
    pub url: String,
    /// Cache namespace (the path component of `url`).
    pub namespace: String,
    /// Normalized HTTP path the lookup is mounted on.
    pub route_path: String,
    pub cron_pattern: String,
    pub cron_timezone: String,
}

impl ResolvedSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        if config.dhis_path.trim().is_empty() {
            return Err(ConfigError::EmptyPath(config.dhis_url.clone()));
        }
        let url = config.resolve_url()?;
        let route_path = config.route_path();
        if RESERVED_PATHS.contains(&route_path.as_str()) {
            return Err(ConfigError::ReservedPath(route_path));
        }
        Ok(Self {
            namespace: url.path().to_string(),
            url: url.to_string(),
            route_path,
            cron_pattern: config.cron_pattern.trim().to_string(),
            cron_timezone: config.cron_timezone.trim().to_string(),
        })
    }
}

/// Resolve every entry of a list, rejecting duplicate URLs, route paths and
/// cache namespaces.
pub fn resolve_sources(list: &[SourceConfig]) -> Result<Vec<ResolvedSource>, ConfigError> {
    let mut urls = HashSet::new();
    let mut paths = HashSet::new();
    let mut namespaces = HashSet::new();
    let mut resolved = Vec::with_capacity(list.len());

    for config in list {
        let source = ResolvedSource::from_config(config)?;
        if !urls.insert(source.url.clone()) {
            return Err(ConfigError::DuplicateUrl(source.url));
        }
        if !paths.insert(source.route_path.clone()) {
            return Err(ConfigError::DuplicatePath(source.route_path));
        }
        // Refreshes replace the whole namespace, so two sources can never share one.
        if !namespaces.insert(source.namespace.clone()) {
            return Err(ConfigError::DuplicateNamespace(source.namespace));
        }
        resolved.push(source);
    }

    Ok(resolved)
}

/// On-disk layouts accepted for a source list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SourcesDocument {
    List(Vec<SourceConfig>),
    Wrapped { sources: Vec<SourceConfig> },
}

impl From<SourcesDocument> for Vec<SourceConfig> {
    fn from(doc: SourcesDocument) -> Self {
        match doc {
            SourcesDocument::List(list) => list,
            SourcesDocument::Wrapped { sources } => sources,
        }
    }
}

/// Serialization format of a sources file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse a source list from text.
pub fn parse_sources(contents: &str, format: SourceFormat) -> Result<Vec<SourceConfig>, ConfigError> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: SourcesDocument = match format {
        SourceFormat::Yaml => serde_yaml::from_str(contents)?,
        SourceFormat::Json => serde_json::from_str(contents)?,
    };
    Ok(doc.into())
}

/// Read and parse a sources file, picking the format from its extension.
pub fn load_sources_file(path: &Path) -> Result<Vec<SourceConfig>, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_sources(&contents, SourceFormat::from_path(path))
}
