//! Upload controller: submits CSV files and follows each one until the
//! backend reports a terminal status.
//!
//! Files in a batch are submitted concurrently and fail independently. A file
//! the backend accepts as `Processing` gets a background resolution task that
//! polls `/files/{id}` with a bounded number of attempts. Once the window is
//! over the record is always Done or Error. Resolution tasks stop without
//! touching the store when the session ends.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CsvdashError;
use crate::gateway::{Gateway, UploadFile};
use crate::models::{FileId, FileRecord, FileStatus};
use crate::store::Store;

/// Timing of the status resolution phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    /// Wait before the first poll; conversion rarely finishes sooner.
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Polls before giving up and marking the file as Error.
    pub max_attempts: u32,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(2),
            max_attempts: 10,
        }
    }
}

impl ResolutionPolicy {
    /// Upper bound on the time a record can stay in Processing, excluding
    /// time spent inside backend requests.
    pub fn window(&self) -> Duration {
        self.initial_delay + self.poll_interval * self.max_attempts.saturating_sub(1)
    }
}

/// Map a backend-reported status to the terminal state the record should take,
/// or `None` while the backend is still processing.
///
/// A file reported Done without any rows is treated as a failed conversion.
pub fn reconcile(status: FileStatus, row_count: Option<u64>) -> Option<(FileStatus, Option<u64>)> {
    match status {
        FileStatus::Processing => None,
        FileStatus::Done => match row_count {
            Some(rows) if rows > 0 => Some((FileStatus::Done, Some(rows))),
            _ => Some((FileStatus::Error, None)),
        },
        FileStatus::Error => Some((FileStatus::Error, None)),
    }
}

/// How a resolution task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(FileStatus),
    /// The session ended first; the store was left untouched.
    Cancelled,
}

#[derive(Debug)]
pub struct ResolutionHandle(JoinHandle<Resolution>);

impl ResolutionHandle {
    pub async fn wait(self) -> Resolution {
        match self.0.await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!("Status resolution task failed: {}", e);
                Resolution::Cancelled
            }
        }
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    /// Refused before any network call.
    Rejected { filename: String, reason: String },
    /// The backend (or the transport) refused the upload; no record was created.
    Failed {
        filename: String,
        error: CsvdashError,
    },
    /// The backend accepted the file and the store holds a record for it.
    Accepted {
        id: FileId,
        filename: String,
        status: FileStatus,
        resolution: Option<ResolutionHandle>,
    },
}

impl UploadOutcome {
    pub fn filename(&self) -> &str {
        match self {
            UploadOutcome::Rejected { filename, .. }
            | UploadOutcome::Failed { filename, .. }
            | UploadOutcome::Accepted { filename, .. } => filename,
        }
    }

    pub fn id(&self) -> Option<&FileId> {
        match self {
            UploadOutcome::Accepted { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, UploadOutcome::Accepted { .. })
    }
}

/// Per-file outcomes of one batch, in submission order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<UploadOutcome>,
}

impl BatchReport {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_accepted()).count()
    }

    pub fn pending(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Accepted { resolution: Some(_), .. }))
            .count()
    }

    /// Await every resolution task and fold the final status into each outcome.
    /// Outcomes whose resolution was cancelled keep their last known status.
    pub async fn wait(mut self) -> Self {
        let mut waits = Vec::new();
        for (index, outcome) in self.outcomes.iter_mut().enumerate() {
            if let UploadOutcome::Accepted { resolution, .. } = outcome {
                if let Some(handle) = resolution.take() {
                    waits.push(async move { (index, handle.wait().await) });
                }
            }
        }
        for (index, resolution) in join_all(waits).await {
            if let (Resolution::Resolved(final_status), UploadOutcome::Accepted { status, .. }) =
                (resolution, &mut self.outcomes[index])
            {
                *status = final_status;
            }
        }
        self
    }
}

pub struct UploadController {
    gateway: Arc<dyn Gateway>,
    store: Arc<Store>,
    policy: ResolutionPolicy,
}

impl UploadController {
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<Store>) -> Self {
        Self {
            gateway,
            store,
            policy: ResolutionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Submit every file concurrently. One file failing never affects the others.
    pub async fn upload_batch(&self, files: Vec<UploadFile>) -> BatchReport {
        let outcomes = join_all(files.into_iter().map(|file| self.upload_one(file))).await;
        let report = BatchReport { outcomes };
        info!(
            total = report.outcomes.len(),
            accepted = report.accepted(),
            pending = report.pending(),
            "Upload batch submitted"
        );
        report
    }

    pub async fn upload_one(&self, file: UploadFile) -> UploadOutcome {
        if !file.is_csv() {
            let reason = CsvdashError::InvalidFile {
                filename: file.filename.clone(),
            }
            .to_string();
            warn!(filename = %file.filename, "Rejected non-CSV file");
            return UploadOutcome::Rejected {
                filename: file.filename,
                reason,
            };
        }

        let Some(token) = self.store.token() else {
            return UploadOutcome::Failed {
                filename: file.filename,
                error: CsvdashError::NotAuthenticated,
            };
        };

        let meta = match self.gateway.upload_file(&file, &token).await {
            Ok(meta) => meta,
            Err(error) => {
                warn!(filename = %file.filename, error = %error, "Upload failed");
                return UploadOutcome::Failed {
                    filename: file.filename,
                    error,
                };
            }
        };

        let remote_id = meta.id;
        let reported = reconcile(meta.status, meta.row_count);
        let mut record = FileRecord::from(meta);
        let id = record.id.clone();
        let filename = record.filename.clone();
        info!(id = %id, filename = %filename, status = %record.status, "File uploaded");

        match reported {
            Some((status, rows)) => {
                record.apply_status(status, rows);
                self.store.insert_file(record);
                UploadOutcome::Accepted {
                    id,
                    filename,
                    status,
                    resolution: None,
                }
            }
            None => {
                self.store.insert_file(record);
                let resolution = self.spawn_resolution(remote_id, token);
                UploadOutcome::Accepted {
                    id,
                    filename,
                    status: FileStatus::Processing,
                    resolution: Some(resolution),
                }
            }
        }
    }

    fn spawn_resolution(&self, id: u64, token: String) -> ResolutionHandle {
        let gateway = Arc::clone(&self.gateway);
        let store = Arc::clone(&self.store);
        let cancel = self.store.session_cancellation();
        let policy = self.policy;

        ResolutionHandle(tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(id, "Status resolution cancelled");
                    Resolution::Cancelled
                }
                (status, rows) = resolve_status(gateway.as_ref(), id, &token, policy) => {
                    if !store.update_file_status_in_session(&FileId::Remote(id), status, rows, &cancel)
                        && cancel.is_cancelled()
                    {
                        return Resolution::Cancelled;
                    }
                    info!(id, status = %status, "File status resolved");
                    Resolution::Resolved(status)
                }
            }
        }))
    }
}

// ─── Resolution loop ─────────────────────────────────────────────────────────

async fn resolve_status(
    gateway: &dyn Gateway,
    id: u64,
    token: &str,
    policy: ResolutionPolicy,
) -> (FileStatus, Option<u64>) {
    tokio::time::sleep(policy.initial_delay).await;

    for attempt in 1..=policy.max_attempts.max(1) {
        if attempt > 1 {
            tokio::time::sleep(policy.poll_interval).await;
        }
        match gateway.get_file_by_id(id, token).await {
            Ok(meta) => {
                if let Some(terminal) = reconcile(meta.status, meta.row_count) {
                    return terminal;
                }
                debug!(id, attempt, "File still processing");
            }
            // Polling again cannot fix a missing file or a rejected token.
            Err(e) if e.is_auth() || e.status() == Some(404) => {
                warn!(id, error = %e, "Status polling aborted");
                return (FileStatus::Error, None);
            }
            Err(e) => {
                debug!(id, attempt, error = %e, "Status poll failed");
            }
        }
    }

    warn!(
        id,
        attempts = policy.max_attempts,
        "File did not finish processing within the resolution window"
    );
    (FileStatus::Error, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile() {
        assert_eq!(reconcile(FileStatus::Processing, None), None);
        assert_eq!(
            reconcile(FileStatus::Done, Some(12)),
            Some((FileStatus::Done, Some(12)))
        );
        assert_eq!(reconcile(FileStatus::Done, Some(0)), Some((FileStatus::Error, None)));
        assert_eq!(reconcile(FileStatus::Done, None), Some((FileStatus::Error, None)));
        assert_eq!(reconcile(FileStatus::Error, Some(5)), Some((FileStatus::Error, None)));
    }

    #[test]
    fn test_window() {
        let policy = ResolutionPolicy::default();
        assert_eq!(policy.window(), Duration::from_secs(3 + 2 * 9));
    }
}
