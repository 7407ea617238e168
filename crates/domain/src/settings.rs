//! Persisted sync settings and their presentation metadata.

use std::str::FromStr;
use std::time::Duration;

use dirsync_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::DEFAULT_MAPPING;

/// Key of one persisted setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    /// Directory host name or `ldap://` / `ldaps://` URL.
    Hostname,
    /// Directory port.
    Port,
    /// Distinguished name used for the simple bind.
    BindDn,
    /// Password used for the simple bind.
    BindPassword,
    /// Search base.
    BaseDn,
    /// Search filter.
    Filter,
    /// Attribute mapping text.
    Mapping,
    /// Schedule interval name.
    CronInterval,
    /// Unix timestamp of the last completed run.
    LastSync,
    /// Log text of the last run.
    Log,
}

/// How a settings form should render an editable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingFieldKind {
    /// Single-line text input.
    SingleLine,
    /// Multi-line text area.
    MultiLine,
}

impl SettingKey {
    /// Settings an operator edits, in form order.
    pub const EDITABLE: [Self; 7] = [
        Self::Hostname,
        Self::Port,
        Self::BindDn,
        Self::BindPassword,
        Self::BaseDn,
        Self::Filter,
        Self::Mapping,
    ];

    /// Returns the storage key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hostname => "hostname",
            Self::Port => "port",
            Self::BindDn => "binddn",
            Self::BindPassword => "bindpass",
            Self::BaseDn => "basedn",
            Self::Filter => "filter",
            Self::Mapping => "mapping",
            Self::CronInterval => "cron-interval",
            Self::LastSync => "lastsync",
            Self::Log => "log",
        }
    }

    /// Returns the form field kind for editable settings.
    #[must_use]
    pub fn field_kind(&self) -> Option<SettingFieldKind> {
        match self {
            Self::Mapping => Some(SettingFieldKind::MultiLine),
            Self::Hostname
            | Self::Port
            | Self::BindDn
            | Self::BindPassword
            | Self::BaseDn
            | Self::Filter => Some(SettingFieldKind::SingleLine),
            Self::CronInterval | Self::LastSync | Self::Log => None,
        }
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hostname => "Hostname",
            Self::Port => "Port",
            Self::BindDn => "Bind DN",
            Self::BindPassword => "Bind Password",
            Self::BaseDn => "Base DN",
            Self::Filter => "Filter",
            Self::Mapping => "Attribute mapping",
            Self::CronInterval => "Schedule interval",
            Self::LastSync => "Last sync",
            Self::Log => "Log",
        }
    }

    /// Returns the help text shown next to the field.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Hostname => "Hostname of LDAP server",
            Self::Port => "Port of LDAP server",
            Self::BindDn => "User to sign in on LDAP",
            Self::BindPassword => "Password to sign in on LDAP",
            Self::BaseDn => "Base DN to search users",
            Self::Filter => "LDAP filter for user accounts",
            Self::Mapping => "Mapping of LDAP attributes to account data",
            Self::CronInterval => "How often the sync runs",
            Self::LastSync => "Time the last sync completed",
            Self::Log => "Log of the last sync run",
        }
    }

    /// Returns the value used when the setting was never saved.
    #[must_use]
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            Self::Filter => Some(DEFAULT_FILTER),
            Self::Mapping => Some(DEFAULT_MAPPING),
            Self::CronInterval => Some(SyncInterval::Daily.as_str()),
            _ => None,
        }
    }
}

impl FromStr for SettingKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "hostname" => Ok(Self::Hostname),
            "port" => Ok(Self::Port),
            "binddn" => Ok(Self::BindDn),
            "bindpass" => Ok(Self::BindPassword),
            "basedn" => Ok(Self::BaseDn),
            "filter" => Ok(Self::Filter),
            "mapping" => Ok(Self::Mapping),
            "cron-interval" => Ok(Self::CronInterval),
            "lastsync" => Ok(Self::LastSync),
            "log" => Ok(Self::Log),
            _ => Err(AppError::Validation(format!(
                "unknown setting key '{value}'"
            ))),
        }
    }
}

/// Interval between scheduled runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncInterval {
    /// Once per hour.
    Hourly,
    /// Twice per day.
    TwiceDaily,
    /// Once per day.
    #[default]
    Daily,
}

impl SyncInterval {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::TwiceDaily => "twicedaily",
            Self::Daily => "daily",
        }
    }

    /// Parses a storage string into an interval.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "hourly" => Ok(Self::Hourly),
            "twicedaily" => Ok(Self::TwiceDaily),
            "daily" => Ok(Self::Daily),
            _ => Err(AppError::Validation(format!(
                "unknown sync interval '{value}'"
            ))),
        }
    }

    /// Returns the wall-clock duration between runs.
    #[must_use]
    pub fn period(&self) -> Duration {
        let hours = match self {
            Self::Hourly => 1,
            Self::TwiceDaily => 12,
            Self::Daily => 24,
        };
        Duration::from_secs(hours * 60 * 60)
    }
}

/// Filter used when none was saved.
pub const DEFAULT_FILTER: &str = "(objectClass=*)";

/// Directory and mapping settings read at the start of a sync run.
#[derive(Clone)]
pub struct SyncSettings {
    /// Directory host name or URL.
    pub hostname: NonEmptyString,
    /// Explicit port; `None` uses the default for the URL scheme.
    pub port: Option<u16>,
    /// Bind DN; empty for an anonymous bind.
    pub bind_dn: String,
    /// Bind password.
    pub bind_password: String,
    /// Search base.
    pub base_dn: String,
    /// Search filter.
    pub filter: String,
    /// Attribute mapping text.
    pub mapping: String,
}

impl SyncSettings {
    /// Builds settings from stored values, applying defaults for blank ones.
    pub fn from_stored(mut stored: impl FnMut(SettingKey) -> Option<String>) -> AppResult<Self> {
        let mut value = |key: SettingKey| {
            stored(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .or_else(|| key.default_value().map(str::to_owned))
        };

        let hostname = value(SettingKey::Hostname)
            .ok_or_else(|| AppError::Validation("hostname is not configured".to_owned()))
            .and_then(NonEmptyString::new)?;
        let port = value(SettingKey::Port)
            .map(|port| {
                port.parse::<u16>().map_err(|error| {
                    AppError::Validation(format!("invalid port '{port}': {error}"))
                })
            })
            .transpose()?;
        let bind_dn = value(SettingKey::BindDn).unwrap_or_default();
        let base_dn = value(SettingKey::BaseDn).unwrap_or_default();
        let filter = value(SettingKey::Filter).unwrap_or_default();
        let mapping = value(SettingKey::Mapping).unwrap_or_default();
        // Passwords may legitimately start or end with spaces.
        let bind_password = stored(SettingKey::BindPassword).unwrap_or_default();

        Ok(Self {
            hostname,
            port,
            bind_dn,
            bind_password,
            base_dn,
            filter,
            mapping,
        })
    }
}

impl std::fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("hostname", &self.hostname.as_str())
            .field("port", &self.port)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"<redacted>")
            .field("base_dn", &self.base_dn)
            .field("filter", &self.filter)
            .field("mapping", &self.mapping)
            .finish()
    }
}
