use std::future::Future;
use std::path::Path;

use error_stack::{bail, Result, ResultExt};
use thiserror::Error;
use tracing::{info, instrument};

use crate::capture;
use crate::config::RunConfig;
use crate::page::Page;

pub const BASE_URL: &str = "https://loilonote.app";
pub const LOGIN_URL: &str = "https://loilonote.app/login";

const SCHOOL_FIELD: &str = "#login-form input[name=\"school_code\"]";
const USER_FIELD: &str = "#login-form input[name=\"user\"]";
const PASSWORD_FIELD: &str = "#login-form input[name=\"password\"]";
const SUBMIT_BUTTON: &str = "#submit-button";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to open the login page")]
    LoginPageUnreachable,
    #[error("Failed to read the current URL")]
    UrlCheckFailed,
    #[error("Failed to submit the login form")]
    LoginSubmitFailed,
    #[error("Failed to open the note page")]
    NotePageUnreachable,
    #[error("Login failed for school {school} user {user} (class {class_id}, note {note_id})")]
    LoginRejected {
        school: String,
        user: String,
        class_id: u32,
        note_id: u32,
    },
    #[error("Failed to take a shot")]
    CaptureFailed,
}

pub fn note_url(class_id: u32, note_id: u32) -> String {
    format!("{BASE_URL}/_/{class_id}/{note_id}")
}

/// Fills the login form and clicks submit. Whether it worked is only
/// established later, by looking at where the note navigation lands.
#[instrument(skip(page, cfg))]
async fn submit_login<P: Page>(page: &P, cfg: &RunConfig) -> Result<(), WorkflowError> {
    page.type_into(SCHOOL_FIELD, &cfg.school)
        .await
        .change_context(WorkflowError::LoginSubmitFailed)?;
    page.type_into(USER_FIELD, &cfg.user)
        .await
        .change_context(WorkflowError::LoginSubmitFailed)?;
    page.type_into(PASSWORD_FIELD, &cfg.pass)
        .await
        .change_context(WorkflowError::LoginSubmitFailed)?;
    page.click(SUBMIT_BUTTON)
        .await
        .change_context(WorkflowError::LoginSubmitFailed)
}

/// Runs the whole session: log in if the site asks for it, open the note,
/// then capture until `shutdown` resolves.
///
/// Each loop tick sleeps the full interval after the capture finishes, so
/// the effective cadence drifts by however long a capture takes. That
/// matches the observed site behavior people rely on; do not replace it
/// with a fixed-rate schedule.
#[instrument(skip(page, cfg, out_dir, shutdown))]
pub async fn run<P: Page>(
    page: &P,
    cfg: &RunConfig,
    out_dir: &Path,
    shutdown: impl Future<Output = ()>,
) -> Result<(), WorkflowError> {
    tokio::pin!(shutdown);

    page.goto(LOGIN_URL)
        .await
        .change_context(WorkflowError::LoginPageUnreachable)?;

    let url = page
        .current_url()
        .await
        .change_context(WorkflowError::UrlCheckFailed)?;
    if url == LOGIN_URL {
        // Document the pre-login state before touching the form.
        capture::take(page, cfg, out_dir)
            .await
            .change_context(WorkflowError::CaptureFailed)?;
        submit_login(page, cfg).await?;
    }

    capture::take(page, cfg, out_dir)
        .await
        .change_context(WorkflowError::CaptureFailed)?;

    let target = note_url(cfg.class_id, cfg.note_id);
    page.goto(&target)
        .await
        .change_context(WorkflowError::NotePageUnreachable)?;

    let url = page
        .current_url()
        .await
        .change_context(WorkflowError::UrlCheckFailed)?;
    if url.starts_with(LOGIN_URL) {
        bail!(WorkflowError::LoginRejected {
            school: cfg.school.clone(),
            user: cfg.user.clone(),
            class_id: cfg.class_id,
            note_id: cfg.note_id,
        });
    }

    info!(url = %url, interval = ?cfg.interval, "Entering capture loop");
    loop {
        capture::take(page, cfg, out_dir)
            .await
            .change_context(WorkflowError::CaptureFailed)?;
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, leaving capture loop");
                return Ok(());
            }
            _ = tokio::time::sleep(cfg.interval) => {}
        }
    }
}
