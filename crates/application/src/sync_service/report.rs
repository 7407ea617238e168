use dirsync_core::AppError;
use dirsync_domain::{RecordOutcome, RunLog, RunStatistics};
use thiserror::Error;
use tracing::{info, warn};

use crate::sync_ports::DirectoryError;

/// Error that ends a sync run before any user is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncAbort {
    /// Stored settings are missing or invalid.
    #[error("invalid sync settings: {0}")]
    Configuration(String),

    /// A directory step failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl SyncAbort {
    /// Returns the run log line explaining the abort.
    #[must_use]
    pub fn log_message(&self) -> String {
        match self {
            Self::Configuration(detail) => {
                format!("Sync settings are invalid. Please check the configuration: {detail}")
            }
            Self::Directory(DirectoryError::Connect(detail)) => format!(
                "Connect to LDAP server failed. Please check hostname and port. Additional information: {detail}"
            ),
            Self::Directory(DirectoryError::Authentication(detail)) => format!(
                "Bind to LDAP server failed. Please check Bind DN and password. Additional information: {detail}"
            ),
            Self::Directory(DirectoryError::Search(detail)) => format!(
                "Search was not successful. Please check Base DN and filter. Additional information: {detail}"
            ),
            Self::Directory(DirectoryError::Retrieval(detail)) => format!(
                "Entries could not be retrieved. Try again later. Additional information: {detail}"
            ),
        }
    }
}

impl From<AppError> for SyncAbort {
    fn from(error: AppError) -> Self {
        Self::Configuration(error.detail().to_owned())
    }
}

/// Result of one sync run before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Lines recorded during the run.
    pub log: RunLog,
    /// Per-record counters.
    pub statistics: RunStatistics,
    /// Fatal error that ended the run early, if any.
    pub abort: Option<SyncAbort>,
}

impl RunReport {
    /// Returns whether the run reached user processing.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.abort.is_none()
    }
}

/// Accumulates the log and statistics of one run and mirrors every line to
/// tracing.
#[derive(Debug, Default)]
pub(super) struct RunReporter {
    log: RunLog,
    statistics: RunStatistics,
}

impl RunReporter {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn progress(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(line = %message, "sync progress");
        self.log.push(message);
    }

    pub(super) fn problem(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(line = %message, "sync problem");
        self.log.push(message);
    }

    pub(super) fn record(&mut self, outcome: &RecordOutcome) {
        self.statistics.record(outcome);
        if let Some(message) = outcome.log_message() {
            self.problem(message);
        }
    }

    pub(super) fn abort(mut self, abort: SyncAbort) -> RunReport {
        self.problem(abort.log_message());
        RunReport {
            log: self.log,
            statistics: self.statistics,
            abort: Some(abort),
        }
    }

    pub(super) fn finish(mut self) -> RunReport {
        let line = self.statistics.to_string();
        self.progress(line);
        RunReport {
            log: self.log,
            statistics: self.statistics,
            abort: None,
        }
    }
}
