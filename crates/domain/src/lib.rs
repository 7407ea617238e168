//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod directory;
mod mapping;
mod settings;
mod sync_run;
mod user;

pub use directory::DirectoryEntry;
pub use mapping::{AttributeMapping, DEFAULT_MAPPING, MalformedMappingLine, MappingRule};
pub use settings::{DEFAULT_FILTER, SettingFieldKind, SettingKey, SyncInterval, SyncSettings};
pub use sync_run::{LogEntry, RecordOutcome, RunLog, RunStatistics, StoreOperation};
pub use user::{USER_EMAIL_FIELD, USER_LOGIN_FIELD, UserId, UserRecord};
