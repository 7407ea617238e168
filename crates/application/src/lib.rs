//! Application services and ports.

#![forbid(unsafe_code)]

mod sync_ports;
mod sync_service;

pub use sync_ports::{
    DirectoryConnector, DirectoryError, DirectorySession, SettingsRepository, UserStore,
};
pub use sync_service::{RunReport, SyncAbort, SyncRunSummary, SyncService};
