//! Link preview fetcher
//!
//! One GET per call, no caching. [`MetadataFetcher::fetch`] reports every
//! failure; [`MetadataFetcher::preview`] always yields a card.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS};
use reqwest::{Client, Url};
use std::time::Duration;

use super::error::{MetadataError, MetadataResult};
use super::extract::{LinkMetadata, MetadataExtractor};

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; LinkPreviewBot/1.0)";

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Fetches pages and extracts preview metadata
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: Client,
    extractor: MetadataExtractor,
}

impl MetadataFetcher {
    pub fn new(config: FetcherConfig) -> MetadataResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| MetadataError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            extractor: MetadataExtractor::new()?,
        })
    }

    pub fn extractor(&self) -> &MetadataExtractor {
        &self.extractor
    }

    /// Fetch a page and extract its metadata
    pub async fn fetch(&self, url: &str) -> MetadataResult<LinkMetadata> {
        let parsed = Url::parse(url).map_err(|e| MetadataError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MetadataError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status(status.as_u16()));
        }

        let html = response.text().await?;
        let metadata = self.extractor.extract(&html, url);

        tracing::debug!(url = %url, title = %metadata.title, "Extracted link metadata");
        Ok(metadata)
    }

    /// Preview card for a URL. Failures degrade to the fallback card, Notion
    /// pages get a title from their slug when the page has none.
    pub async fn preview(&self, url: &str) -> LinkMetadata {
        let notion_title = self.extractor.notion_title(url);

        let mut metadata = match self.fetch(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Link preview fell back");
                LinkMetadata::fallback(url)
            }
        };

        if let Some(title) = notion_title {
            if metadata.title.is_empty() || metadata.title == super::extract::FALLBACK_TITLE {
                metadata.title = title;
            }
            metadata.site_name = "Notion".to_string();
        }

        if metadata.title.is_empty() {
            metadata.title = super::extract::FALLBACK_TITLE.to_string();
        }

        metadata.with_fallback_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::extract::FALLBACK_IMAGE;

    fn fetcher() -> MetadataFetcher {
        MetadataFetcher::new(FetcherConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_urls() {
        let fetcher = fetcher();
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(MetadataError::InvalidUrl(_))
        ));
        assert!(matches!(
            fetcher.fetch("ftp://example.com/file").await,
            Err(MetadataError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_preview_never_fails() {
        let preview = fetcher().preview("http://127.0.0.1:9/unreachable").await;
        assert_eq!(preview.title, "Link Preview");
        assert_eq!(preview.description, "");
        assert_eq!(preview.image, FALLBACK_IMAGE);
        assert_eq!(preview.site_name, "127.0.0.1");

        let preview = fetcher().preview("::").await;
        assert_eq!(preview.site_name, "External Link");
    }

    #[tokio::test]
    async fn test_unreachable_notion_page_uses_slug() {
        // .invalid never resolves
        let preview = fetcher()
            .preview("https://walker.notion.site.invalid/Day-2-Watervliet-0123456789abcdef0123456789abcdef")
            .await;
        assert_eq!(preview.title, "Day 2 Watervliet");
        assert_eq!(preview.site_name, "Notion");
    }
}
