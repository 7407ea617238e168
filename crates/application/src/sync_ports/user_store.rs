use async_trait::async_trait;
use dirsync_core::AppResult;
use dirsync_domain::{UserId, UserRecord};

/// Port for the application user store that sync writes into.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the account owning a login.
    async fn find_by_login(&self, login: &str) -> AppResult<Option<UserId>>;

    /// Returns the account owning an e-mail address.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserId>>;

    /// Creates an account from a record. Returns the assigned identifier.
    async fn create(&self, record: &UserRecord) -> AppResult<UserId>;

    /// Updates the account named by the record identifier.
    ///
    /// Fields absent from the record keep their stored values.
    async fn update(&self, record: &UserRecord) -> AppResult<UserId>;
}
