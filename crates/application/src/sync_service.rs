//! Directory-to-user-store synchronization service.
//!
//! A run connects to the directory, binds, searches with the attributes the
//! mapping needs, transforms every entry into a user record, and reconciles
//! the records one by one against the user store. Directory failures end the
//! run; per-record failures are counted and logged while processing continues.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dirsync_core::{AppError, AppResult};
use dirsync_domain::{AttributeMapping, RunStatistics, SettingKey, SyncInterval, SyncSettings};
use tracing::{info, warn};

use crate::sync_ports::{DirectoryConnector, SettingsRepository, UserStore};

mod reconcile;
mod report;

pub use report::{RunReport, SyncAbort};

use reconcile::reconcile_record;
use report::RunReporter;

/// Persisted result of one `run_sync` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunSummary {
    /// Time the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-record counters.
    pub statistics: RunStatistics,
    /// Fatal error that ended the run early, if any.
    pub abort: Option<SyncAbort>,
    /// Log text written to the settings store.
    pub log_text: String,
}

/// Application service running directory sync.
#[derive(Clone)]
pub struct SyncService {
    directory_connector: Arc<dyn DirectoryConnector>,
    user_store: Arc<dyn UserStore>,
    settings_repository: Arc<dyn SettingsRepository>,
}

impl SyncService {
    /// Creates a sync service.
    #[must_use]
    pub fn new(
        directory_connector: Arc<dyn DirectoryConnector>,
        user_store: Arc<dyn UserStore>,
        settings_repository: Arc<dyn SettingsRepository>,
    ) -> Self {
        Self {
            directory_connector,
            user_store,
            settings_repository,
        }
    }

    /// Runs one sync with the stored settings and persists its log.
    ///
    /// Never fails: every problem ends up in the stored log. The last-sync time
    /// is written only when the run reached user processing.
    pub async fn run_sync(&self) -> SyncRunSummary {
        let mut report = match self.load_settings().await {
            Ok(settings) => self.run_with_settings(&settings).await,
            Err(error) => RunReporter::new().abort(SyncAbort::from(error)),
        };

        let finished_at = Utc::now();
        let log_text = report.log.flush(finished_at);

        if let Err(error) = self
            .settings_repository
            .set(SettingKey::Log, log_text.as_str())
            .await
        {
            warn!(error = %error, "failed to persist sync log");
        }

        if report.is_completed()
            && let Err(error) = self
                .settings_repository
                .set(
                    SettingKey::LastSync,
                    finished_at.timestamp().to_string().as_str(),
                )
                .await
        {
            warn!(error = %error, "failed to persist last sync time");
        }

        info!(
            completed = report.is_completed(),
            synchronized = report.statistics.synchronized(),
            unknown = report.statistics.unknown,
            missing_email = report.statistics.missing_email,
            errors = report.statistics.errors,
            "directory sync finished"
        );

        SyncRunSummary {
            finished_at,
            statistics: report.statistics,
            abort: report.abort,
            log_text,
        }
    }

    /// Runs one sync with explicit settings without persisting anything but
    /// user store changes.
    pub async fn run_with_settings(&self, settings: &SyncSettings) -> RunReport {
        let mut reporter = RunReporter::new();
        let mapping = AttributeMapping::parse(settings.mapping.as_str());
        for malformed_line in mapping.malformed_lines() {
            reporter.problem(format!("Attribute mapping {malformed_line}; line skipped."));
        }

        let mut session = match self
            .directory_connector
            .connect(settings.hostname.as_str(), settings.port)
            .await
        {
            Ok(session) => session,
            Err(error) => return reporter.abort(error.into()),
        };
        reporter.progress("Connection to LDAP server succeeded.");

        if let Err(error) = session
            .authenticate(settings.bind_dn.as_str(), settings.bind_password.as_str())
            .await
        {
            session.close().await;
            return reporter.abort(error.into());
        }
        reporter.progress("Bind to LDAP server succeeded.");

        let search_result = session
            .search(
                settings.base_dn.as_str(),
                settings.filter.as_str(),
                mapping.requested_attributes(),
            )
            .await;
        session.close().await;

        let entries = match search_result {
            Ok(entries) => entries,
            Err(error) => return reporter.abort(error.into()),
        };
        reporter.progress("Search was successful.");
        reporter.progress(format!("Entries retrieved: {}", entries.len()));

        let records: Vec<_> = entries
            .iter()
            .map(|entry| (entry.dn(), mapping.apply(entry)))
            .collect();
        reporter.progress("Entries processed. Updating users...");

        for (dn, record) in records {
            let outcome = reconcile_record(self.user_store.as_ref(), dn, record).await;
            reporter.record(&outcome);
        }

        reporter.finish()
    }

    /// Returns the configured schedule interval.
    pub async fn schedule_interval(&self) -> AppResult<SyncInterval> {
        let stored = self
            .settings_repository
            .get(SettingKey::CronInterval)
            .await?
            .filter(|value| !value.trim().is_empty());

        SyncInterval::parse(
            stored
                .as_deref()
                .or(SettingKey::CronInterval.default_value())
                .unwrap_or_default(),
        )
    }

    /// Returns the time of the last run that reached user processing.
    pub async fn last_sync(&self) -> AppResult<Option<DateTime<Utc>>> {
        let Some(value) = self.settings_repository.get(SettingKey::LastSync).await? else {
            return Ok(None);
        };

        let seconds = value.trim().parse::<i64>().map_err(|error| {
            AppError::Validation(format!("invalid stored last sync time '{value}': {error}"))
        })?;

        Utc.timestamp_opt(seconds, 0)
            .single()
            .map(Some)
            .ok_or_else(|| {
                AppError::Validation(format!("stored last sync time '{value}' is out of range"))
            })
    }

    /// Returns the log text of the last run.
    pub async fn stored_log(&self) -> AppResult<Option<String>> {
        self.settings_repository.get(SettingKey::Log).await
    }

    async fn load_settings(&self) -> AppResult<SyncSettings> {
        let mut stored = HashMap::new();
        for key in SettingKey::EDITABLE {
            if let Some(value) = self.settings_repository.get(key).await? {
                stored.insert(key, value);
            }
        }

        SyncSettings::from_stored(|key| stored.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests;
