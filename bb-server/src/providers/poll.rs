//! Fixed-interval provider job polling
//!
//! Sleeps `interval`, asks the provider for the job's status, and repeats
//! until the job reaches a terminal state or `max_attempts` queries have
//! been made. Cancellation is observed while sleeping and while a status
//! query is in flight.

use bb_common::db::RuntimeSettings;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{GenerationProvider, ProviderStatus};

pub const EMPTY_OUTPUT_REASON: &str = "provider reported success without output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&RuntimeSettings::default())
    }
}

impl From<&RuntimeSettings> for PollConfig {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            interval: Duration::from_millis(settings.poll_interval_ms),
            max_attempts: settings.poll_max_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {attempts} status checks{}", last_error_suffix(.last_error))]
    TimedOut {
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("cancelled")]
    Cancelled,
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {})", e))
        .unwrap_or_default()
}

/// Poll `job_id` until it finishes, returning its output URLs
///
/// `on_pending(attempt, detail)` runs after every status check that found
/// the job still in progress. A failed status query is logged and counts
/// as an attempt.
pub async fn poll_until_complete<F, Fut>(
    provider: &dyn GenerationProvider,
    job_id: &str,
    config: PollConfig,
    cancel: &CancellationToken,
    mut on_pending: F,
) -> Result<Vec<String>, PollError>
where
    F: FnMut(u32, String) -> Fut,
    Fut: Future<Output = ()>,
{
    let provider_name = provider.kind().as_str();
    let mut last_error: Option<String> = None;

    for attempt in 1..=config.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(config.interval) => {}
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            status = provider.status(job_id) => status,
        };

        match status {
            Ok(ProviderStatus::Succeeded { outputs }) => {
                if outputs.is_empty() {
                    return Err(PollError::Failed(EMPTY_OUTPUT_REASON.to_string()));
                }
                debug!(provider = provider_name, job_id, attempt, "Job succeeded");
                return Ok(outputs);
            }
            Ok(ProviderStatus::Failed { reason }) => {
                debug!(provider = provider_name, job_id, attempt, %reason, "Job failed");
                return Err(PollError::Failed(reason));
            }
            Ok(ProviderStatus::Pending { detail }) => {
                on_pending(attempt, detail).await;
            }
            Err(e) => {
                warn!(
                    provider = provider_name,
                    job_id,
                    attempt,
                    "Status check failed: {}",
                    e
                );
                last_error = Some(e.to_string());
            }
        }
    }

    Err(PollError::TimedOut {
        attempts: config.max_attempts,
        last_error,
    })
}
