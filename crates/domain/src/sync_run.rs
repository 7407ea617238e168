//! Run-scoped bookkeeping: per-record outcomes, statistics and the run log.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// User store operation that failed for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    /// Looking up existing accounts by login or e-mail.
    Lookup,
    /// Creating a new account.
    Create,
    /// Updating an existing account.
    Update,
}

impl StoreOperation {
    /// Returns the verb used in log messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "looking up",
            Self::Create => "creating",
            Self::Update => "updating",
        }
    }
}

/// What reconciliation did with one user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new account was created.
    Created {
        /// Login of the new account.
        login: String,
        /// Identifier assigned by the store.
        user_id: UserId,
    },
    /// An existing account was updated.
    Updated {
        /// Login of the account.
        login: String,
        /// Identifier of the account.
        user_id: UserId,
    },
    /// The record had no login and was ignored.
    UnknownUser {
        /// Distinguished name of the source entry.
        dn: String,
    },
    /// The record had no e-mail address and was ignored.
    MissingEmail {
        /// Login of the ignored record.
        login: String,
    },
    /// The login belongs to one account and the e-mail to another.
    LoginEmailConflict {
        /// Login of the rejected record.
        login: String,
    },
    /// No account has the login but the e-mail is already in use.
    EmailClaimed {
        /// Login of the rejected record.
        login: String,
    },
    /// The user store reported a failure.
    StoreFailed {
        /// Login of the affected record.
        login: String,
        /// Operation that failed.
        operation: StoreOperation,
        /// Error detail reported by the store.
        detail: String,
    },
}

impl RecordOutcome {
    /// Returns whether the account was created or updated.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::Updated { .. })
    }

    /// Returns whether the outcome counts as an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::LoginEmailConflict { .. } | Self::EmailClaimed { .. } | Self::StoreFailed { .. }
        )
    }

    /// Returns the run log line for outcomes operators need to see.
    ///
    /// Successful creates and updates produce no line; they are counted in
    /// the statistics line only.
    #[must_use]
    pub fn log_message(&self) -> Option<String> {
        match self {
            Self::Created { .. } | Self::Updated { .. } => None,
            Self::UnknownUser { dn } => Some(format!(
                "An unknown user without user_login was ignored (entry {dn})."
            )),
            Self::MissingEmail { login } => {
                Some(format!("User {login} was ignored, no e-mail given."))
            }
            Self::LoginEmailConflict { login } => Some(format!(
                "Error updating user {login}: given e-mail is already in use by another user."
            )),
            Self::EmailClaimed { login } => Some(format!(
                "Error creating user {login}: given e-mail is already in use by another user."
            )),
            Self::StoreFailed {
                login,
                operation,
                detail,
            } => Some(format!(
                "Error {} user {login}: {detail}",
                operation.as_str()
            )),
        }
    }
}

/// Counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Accounts created.
    pub created: u32,
    /// Accounts updated.
    pub updated: u32,
    /// Records without a login.
    pub unknown: u32,
    /// Records without an e-mail address.
    pub missing_email: u32,
    /// Conflicts and store failures.
    pub errors: u32,
}

impl RunStatistics {
    /// Returns the number of accounts created or updated.
    #[must_use]
    pub fn synchronized(&self) -> u32 {
        self.created.saturating_add(self.updated)
    }

    /// Counts one record outcome.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        let counter = match outcome {
            RecordOutcome::Created { .. } => &mut self.created,
            RecordOutcome::Updated { .. } => &mut self.updated,
            RecordOutcome::UnknownUser { .. } => &mut self.unknown,
            RecordOutcome::MissingEmail { .. } => &mut self.missing_email,
            RecordOutcome::LoginEmailConflict { .. }
            | RecordOutcome::EmailClaimed { .. }
            | RecordOutcome::StoreFailed { .. } => &mut self.errors,
        };
        *counter = counter.saturating_add(1);
    }
}

impl Display for RunStatistics {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "Statistics: {} created/updated ({} created, {} updated), {} unknown, {} missing e-mail, {} errors.",
            self.synchronized(),
            self.created,
            self.updated,
            self.unknown,
            self.missing_email,
            self.errors
        )
    }
}

/// One timestamped run log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Time the line was recorded.
    pub at: DateTime<Utc>,
    /// Message text.
    pub message: String,
}

/// Ordered log of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one message stamped with the current time.
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    /// Returns the recorded entries in call order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Renders the log with an RFC 2822 header and empties the buffer.
    pub fn flush(&mut self, header_time: DateTime<Utc>) -> String {
        let mut rendered = header_time.to_rfc2822();
        for entry in self.entries.drain(..) {
            rendered.push('\n');
            rendered.push_str(entry.message.as_str());
        }
        rendered
    }
}
