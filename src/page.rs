use async_trait::async_trait;
use error_stack::{Result, ResultExt};
use fantoccini::error::CmdError;
use fantoccini::{Client, Locator};
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to navigate to {0}")]
    NavigationFailed(String),
    #[error("Failed to read the current URL")]
    CurrentUrlUnavailable,
    #[error("Failed to query element {0}")]
    ElementQueryFailed(String),
    #[error("Failed to type into {0}")]
    TypeFailed(String),
    #[error("Failed to click {0}")]
    ClickFailed(String),
    #[error("Failed to capture a screenshot")]
    ScreenshotFailed,
}

/// The page operations the capture workflow needs, as a seam so the
/// workflow can run against a scripted page in tests instead of a live
/// WebDriver session.
#[async_trait]
pub trait Page: Send + Sync {
    async fn current_url(&self) -> Result<String, PageError>;
    async fn goto(&self, url: &str) -> Result<(), PageError>;
    async fn element_exists(&self, css: &str) -> Result<bool, PageError>;
    async fn type_into(&self, css: &str, text: &str) -> Result<(), PageError>;
    async fn click(&self, css: &str) -> Result<(), PageError>;
    async fn screenshot_png(&self) -> Result<Vec<u8>, PageError>;
}

/// [`Page`] over a live fantoccini client.
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// LoiloNote renders the login page client-side, so a WebDriver load
    /// alone is not enough. Poll `document.readyState` for a while before
    /// declaring navigation done.
    async fn wait_document_complete(&self) -> std::result::Result<(), CmdError> {
        for _ in 0..50 {
            let state = self
                .client
                .execute("return document.readyState;", vec![])
                .await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for WebDriverPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDriverPage").finish()
    }
}

#[async_trait]
impl Page for WebDriverPage {
    #[instrument(skip(self))]
    async fn current_url(&self) -> Result<String, PageError> {
        let url = self
            .client
            .current_url()
            .await
            .change_context(PageError::CurrentUrlUnavailable)?;
        Ok(url.to_string())
    }

    #[instrument(skip(self))]
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.client
            .goto(url)
            .await
            .change_context(PageError::NavigationFailed(url.to_string()))?;
        self.wait_document_complete()
            .await
            .change_context(PageError::NavigationFailed(url.to_string()))
    }

    #[instrument(skip(self))]
    async fn element_exists(&self, css: &str) -> Result<bool, PageError> {
        match self.client.find(Locator::Css(css)).await {
            Ok(_) => Ok(true),
            Err(CmdError::NoSuchElement(_)) => Ok(false),
            Err(error) => Err(error).change_context(PageError::ElementQueryFailed(css.to_string())),
        }
    }

    #[instrument(skip(self, text))]
    async fn type_into(&self, css: &str, text: &str) -> Result<(), PageError> {
        let element = self
            .client
            .find(Locator::Css(css))
            .await
            .change_context(PageError::TypeFailed(css.to_string()))?;
        element
            .send_keys(text)
            .await
            .change_context(PageError::TypeFailed(css.to_string()))
    }

    #[instrument(skip(self))]
    async fn click(&self, css: &str) -> Result<(), PageError> {
        let element = self
            .client
            .find(Locator::Css(css))
            .await
            .change_context(PageError::ClickFailed(css.to_string()))?;
        element
            .click()
            .await
            .change_context(PageError::ClickFailed(css.to_string()))
    }

    #[instrument(skip(self))]
    async fn screenshot_png(&self) -> Result<Vec<u8>, PageError> {
        self.client
            .screenshot()
            .await
            .change_context(PageError::ScreenshotFailed)
    }
}
