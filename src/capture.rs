use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use error_stack::{Result, ResultExt};
use thiserror::Error;
use tracing::instrument;

use crate::config::RunConfig;
use crate::page::Page;

/// Element present on a note page while a teacher is sharing a screen.
pub const SHARING_INDICATOR: &str = ".screenSharing";

/// Shots land here, relative to the working directory.
pub const OUT_DIR: &str = "out";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to check the page for the sharing indicator")]
    SharingProbeFailed,
    #[error("Failed to create the output directory")]
    CreateDirFailed,
    #[error("Failed to capture a screenshot")]
    ScreenshotFailed,
    #[error("Failed to write the screenshot to disk")]
    WriteFailed,
}

/// `<pid>_<yyyy-mm-dd-HH-MM-ss-l>.png`; the pid prefix keeps concurrent
/// runs writing to the same directory apart.
fn shot_filename(now: DateTime<Local>) -> String {
    format!(
        "{}_{}.png",
        std::process::id(),
        now.format("%Y-%m-%d-%H-%M-%S-%3f")
    )
}

/// Single-level create; already existing is fine.
fn ensure_out_dir(dir: &Path) -> Result<(), CaptureError> {
    match std::fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(error) => Err(error)
            .change_context(CaptureError::CreateDirFailed)
            .attach_printable_lazy(|| format!("dir: {}", dir.display())),
    }
}

/// Captures the current page into `out_dir`, unless the run is gated on
/// screen sharing and nothing is being shared right now (a silent skip,
/// not an error). Returns the written path, or `None` when skipped.
#[instrument(skip(page, cfg, out_dir))]
pub async fn take<P: Page>(
    page: &P,
    cfg: &RunConfig,
    out_dir: &Path,
) -> Result<Option<PathBuf>, CaptureError> {
    if cfg.if_sharing
        && !page
            .element_exists(SHARING_INDICATOR)
            .await
            .change_context(CaptureError::SharingProbeFailed)?
    {
        tracing::debug!("No sharing indicator on the page, skipping shot");
        return Ok(None);
    }

    ensure_out_dir(out_dir)?;

    let png = page
        .screenshot_png()
        .await
        .change_context(CaptureError::ScreenshotFailed)?;

    let path = out_dir.join(shot_filename(Local::now()));
    std::fs::write(&path, png)
        .change_context(CaptureError::WriteFailed)
        .attach_printable_lazy(|| format!("path: {}", path.display()))?;

    tracing::info!(path = %path.display(), "Saved shot");
    Ok(Some(path))
}
