mod capture;
mod config;
mod driver;
mod page;
mod workflow;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use error_stack::{Result, ResultExt};
use thiserror::Error;
use tracing::instrument;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::RunConfig;
use crate::driver::ScraperDriver;
use crate::page::WebDriverPage;

#[derive(Debug, Error)]
enum SessionError {
    #[error("Failed to start the browser session")]
    Driver,
    #[error("The capture workflow failed")]
    Workflow,
}

/// Resolves when the user asks the run to stop, so the capture loop can
/// exit cleanly and the browser gets shut down instead of left dangling.
async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", error);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received ctrl-c");
}

#[instrument(skip(cfg))]
async fn run_session(cfg: &RunConfig) -> Result<(), SessionError> {
    let mut driver = ScraperDriver::new(cfg.debug)
        .await
        .change_context(SessionError::Driver)?;
    let page = WebDriverPage::new(driver.client.clone());

    let result = workflow::run(&page, cfg, Path::new(capture::OUT_DIR), shutdown_signal())
        .await
        .change_context(SessionError::Workflow);

    // Close the session and kill geckodriver whether the workflow ended
    // cleanly or not.
    driver.shutdown().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = RunConfig::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loilo_shot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run_session(&cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("{report:?}");
            ExitCode::from(1)
        }
    }
}
