mod directory;
mod settings;
mod user_store;

pub use directory::{DirectoryConnector, DirectoryError, DirectorySession};
pub use settings::SettingsRepository;
pub use user_store::UserStore;
