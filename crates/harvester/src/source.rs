//! Fetch-and-extract collaborators.
//!
//! A [`FragmentSource`] performs one request against the remote source and
//! returns the extracted text, which may be empty. Trimming and empty-fragment
//! filtering happen in the worker pool.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{FetchError, HarvestError, Result};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("harvester/", env!("CARGO_PKG_VERSION"));

/// One fetch-and-extract round trip against the remote source.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Fetch once and return the extracted (untrimmed) text.
    async fn fetch(&self) -> std::result::Result<String, FetchError>;
}

/// HTTP source: GET a fixed URL and extract the text under a CSS selector.
pub struct HttpSource {
    client: Client,
    url: String,
    selector: Selector,
}

impl HttpSource {
    /// Build a source for `url`, extracting elements matching `selector`.
    pub fn new(url: &str, selector: &str, request_timeout: Duration) -> Result<Self> {
        let selector = parse_selector(selector)?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            selector,
        })
    }

    /// URL polled by this source
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FragmentSource for HttpSource {
    async fn fetch(&self) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: self.url.clone(),
                msg: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: self.url.clone(),
            msg: e.to_string(),
        })?;

        Ok(extract_text(&body, &self.selector))
    }
}

/// Parse a CSS selector, mapping failures to a configuration error.
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| HarvestError::Config(format!("invalid selector {:?}: {}", selector, e)))
}

/// Concatenate the text of every element matching `selector`, in document order.
pub fn extract_text(html: &str, selector: &Selector) -> String {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .flat_map(|element| element.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="header">Moderation</div>
          <div class="fi_text">  First line of the quote.
          </div>
          <div class="footer">footer</div>
        </body></html>
    "#;

    #[test]
    fn test_extract_selected_text() {
        let selector = parse_selector(".fi_text").unwrap();
        let text = extract_text(PAGE, &selector);
        assert_eq!(text.trim(), "First line of the quote.");
    }

    #[test]
    fn test_extract_concatenates_matches() {
        let html = r#"<p class="q">one</p><p class="q"><b>two</b> three</p>"#;
        let selector = parse_selector(".q").unwrap();
        assert_eq!(extract_text(html, &selector), "onetwo three");
    }

    #[test]
    fn test_extract_no_match_is_empty() {
        let selector = parse_selector(".missing").unwrap();
        assert_eq!(extract_text(PAGE, &selector), "");
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let err = parse_selector("div[").unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_source_is_transport_error() {
        let source = HttpSource::new(
            "http://127.0.0.1:1/moderation/",
            ".fi_text",
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(source.url(), "http://127.0.0.1:1/moderation/");

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
        assert!(err.is_retryable());
    }
}
