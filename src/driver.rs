use std::process::{Child, Command};

use error_stack::{Result, ResultExt};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

const VIEWPORT_WIDTH: u32 = 1024;
const VIEWPORT_HEIGHT: u32 = 768;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to spawn geckodriver process")]
    FailedToSpawnGeckodriver,
    #[error("Failed to create WebDriver session")]
    FailedToCreateSession,
    #[error("Failed to normalize the browser user agent")]
    FailedToSetUserAgent,
    #[error("Failed to resize the browser window")]
    FailedToSetViewport,
}

pub fn random_port() -> u16 {
    rand::random::<u16>() % (65535 - 1024) + 1024
}

/// Strips the automation-identifying token from a reported user agent so
/// the site's UA sniffing sees a regular browser.
pub fn normalize_user_agent(user_agent: &str) -> String {
    user_agent
        .replace("HeadlessChrome", "Chrome")
        .replace("Headless", "")
}

#[instrument]
fn spawn_geckodriver_process(port: u16) -> Result<Child, DriverError> {
    Command::new("geckodriver")
        .arg("--port")
        .arg(port.to_string())
        .arg("--log")
        .arg("fatal")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .change_context(DriverError::FailedToSpawnGeckodriver)
}

fn firefox_capabilities(headless: bool) -> serde_json::Map<String, serde_json::Value> {
    let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
    let mut capabilities = serde_json::Map::new();
    capabilities.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
    capabilities
}

#[instrument]
async fn create_and_configure_client(port: u16, headless: bool) -> Result<Client, DriverError> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(firefox_capabilities(headless));
    let client = builder
        .connect(format!("http://localhost:{}", port).as_str())
        .await
        .change_context(DriverError::FailedToCreateSession)
        .attach_printable_lazy(|| format!("Failed to connect to geckodriver on port {}", port))?;

    let reported = client
        .execute("return navigator.userAgent;", vec![])
        .await
        .change_context(DriverError::FailedToSetUserAgent)?;
    if let Some(user_agent) = reported.as_str() {
        let normalized = normalize_user_agent(user_agent);
        if normalized != user_agent {
            client
                .set_ua(&normalized)
                .await
                .change_context(DriverError::FailedToSetUserAgent)?;
        }
    }

    client
        .set_window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
        .await
        .change_context(DriverError::FailedToSetViewport)?;

    Ok(client)
}

/// Owns the geckodriver child process and the one WebDriver session used
/// for the whole run.
pub struct ScraperDriver {
    driver_process: Option<Child>,
    pub client: Client,
}

impl std::fmt::Debug for ScraperDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperDriver").finish()
    }
}

impl ScraperDriver {
    /// Spawns geckodriver on a random port and opens a session. The
    /// browser is headless unless `debug` asks for a visible window.
    // `skip(debug)`: tracing's instrument macro cannot record a field
    // named `debug` (it collides with `tracing::field::debug`).
    #[instrument(skip(debug))]
    pub async fn new(debug: bool) -> Result<Self, DriverError> {
        let port = random_port();
        Ok(ScraperDriver {
            driver_process: spawn_geckodriver_process(port)?.into(),
            client: create_and_configure_client(port, !debug).await?,
        })
    }

    /// Closes the WebDriver session and kills the geckodriver child.
    #[instrument]
    pub async fn shutdown(&mut self) {
        let client = self.client.clone();
        if let Err(error) = client.close().await {
            tracing::warn!("Failed to close WebDriver session: {}", error);
        }
        if let Some(mut process) = self.driver_process.take() {
            if let Err(error) = process.kill() {
                tracing::warn!("Failed to kill geckodriver process: {}", error);
            }
        }
    }
}

impl Drop for ScraperDriver {
    fn drop(&mut self) {
        // Last resort if shutdown() never ran; the session itself dies
        // with the driver process.
        if let Some(mut process) = self.driver_process.take() {
            if let Err(error) = process.kill() {
                tracing::warn!("Failed to kill geckodriver process: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_port_avoids_privileged_range() {
        for _ in 0..1000 {
            let port = random_port();
            assert!(port >= 1024);
        }
    }

    #[test]
    fn headless_chrome_token_is_rewritten() {
        assert_eq!(
            normalize_user_agent("Mozilla/5.0 HeadlessChrome/120.0"),
            "Mozilla/5.0 Chrome/120.0"
        );
    }

    #[test]
    fn bare_headless_token_is_stripped() {
        assert_eq!(normalize_user_agent("Mozilla/5.0 Headless"), "Mozilla/5.0 ");
    }

    #[test]
    fn normal_user_agent_is_untouched() {
        let ua = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/124.0";
        assert_eq!(normalize_user_agent(ua), ua);
    }

    #[test]
    fn capabilities_carry_headless_arg_only_when_headless() {
        let caps = firefox_capabilities(true);
        assert_eq!(
            caps["moz:firefoxOptions"]["args"],
            serde_json::json!(["-headless"])
        );
        let caps = firefox_capabilities(false);
        assert_eq!(caps["moz:firefoxOptions"]["args"], serde_json::json!([]));
    }
}
