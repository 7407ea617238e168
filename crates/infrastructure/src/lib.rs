//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_settings_repository;
mod in_memory_user_store;
mod ldap_directory_connector;
mod postgres_settings_repository;
mod postgres_user_store;

pub use in_memory_settings_repository::InMemorySettingsRepository;
pub use in_memory_user_store::InMemoryUserStore;
pub use ldap_directory_connector::LdapDirectoryConnector;
pub use postgres_settings_repository::PostgresSettingsRepository;
pub use postgres_user_store::PostgresUserStore;
