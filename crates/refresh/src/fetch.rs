//! Remote listGrid fetching.

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use gridcache_core::config::FetchConfig;

use crate::error::FetchError;
use crate::grid::{ListGrid, ListGridResponse};

/// Source of listGrid tables.
#[async_trait]
pub trait GridFetcher: Send + Sync {
    /// Fetch the complete table behind `url`.
    async fn fetch(&self, url: &Url) -> Result<ListGrid, FetchError>;
}

/// `url` with `paging=false` appended so the source returns every row.
pub fn full_table_url(url: &Url) -> Url {
    let mut full = url.clone();
    full.query_pairs_mut().append_pair("paging", "false");
    full
}

/// [`GridFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpGridFetcher {
    client: reqwest::Client,
}

impl HttpGridFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client with the configured timeout and user agent.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl GridFetcher for HttpGridFetcher {
    async fn fetch(&self, url: &Url) -> Result<ListGrid, FetchError> {
        let request_url = full_table_url(url);
        let response = self
            .client
            .get(request_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        let parsed: ListGridResponse = serde_json::from_slice(&body)?;
        Ok(parsed.list_grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_table_url_appends_paging_flag() {
        let url = Url::parse("http://a/api/sqlViews/x/data.json").unwrap();
        assert_eq!(
            full_table_url(&url).as_str(),
            "http://a/api/sqlViews/x/data.json?paging=false"
        );
    }

    #[test]
    fn full_table_url_keeps_existing_query() {
        let url = Url::parse("http://a/x?var=org:1").unwrap();
        assert_eq!(full_table_url(&url).query(), Some("var=org:1&paging=false"));
    }
}
