use async_trait::async_trait;
use dirsync_domain::DirectoryEntry;
use thiserror::Error;

/// Failure of one directory step. Every variant is fatal to a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The directory host could not be reached.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The bind was rejected; carries the server diagnostic text.
    #[error("bind failed: {0}")]
    Authentication(String),

    /// The search was rejected, usually because of the base DN or filter.
    #[error("search failed: {0}")]
    Search(String),

    /// The search was accepted but its entries could not be read.
    #[error("entries could not be retrieved: {0}")]
    Retrieval(String),
}

/// Port for opening directory sessions.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens a session to the directory.
    ///
    /// `hostname` is a bare host or an `ldap://` / `ldaps://` URL. `port`
    /// overrides the port implied by the URL.
    async fn connect(
        &self,
        hostname: &str,
        port: Option<u16>,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// One open directory session.
#[async_trait]
pub trait DirectorySession: Send {
    /// Performs a simple bind.
    async fn authenticate(
        &mut self,
        bind_dn: &str,
        bind_password: &str,
    ) -> Result<(), DirectoryError>;

    /// Searches the subtree below `base_dn`, returning only `attributes`.
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Ends the session. Failures are logged by the adapter and not reported.
    async fn close(&mut self);
}
