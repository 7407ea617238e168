//! LDAP-backed directory connector.

use std::time::Duration;

use async_trait::async_trait;
use dirsync_application::{DirectoryConnector, DirectoryError, DirectorySession};
use dirsync_domain::DirectoryEntry;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Scope, SearchEntry};
use tracing::{debug, warn};
use url::Url;

const NO_ATTRIBUTES: &str = "1.1";

/// Directory connector speaking LDAPv3 through `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapDirectoryConnector {
    connect_timeout: Duration,
}

impl LdapDirectoryConnector {
    /// Creates a connector that gives up connecting after `connect_timeout`.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl DirectoryConnector for LdapDirectoryConnector {
    async fn connect(
        &self,
        hostname: &str,
        port: Option<u16>,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let url = directory_url(hostname, port)?;
        debug!(url = %url, "connecting to LDAP server");

        let settings = LdapConnSettings::new().set_conn_timeout(self.connect_timeout);
        let (connection, ldap) = LdapConnAsync::from_url_with_settings(settings, &url)
            .await
            .map_err(|error| DirectoryError::Connect(format!("{url}: {error}")))?;

        tokio::spawn(async move {
            if let Err(error) = connection.drive().await {
                warn!(error = %error, "LDAP connection driver error");
            }
        });

        Ok(Box::new(LdapDirectorySession { ldap }))
    }
}

struct LdapDirectorySession {
    ldap: Ldap,
}

#[async_trait]
impl DirectorySession for LdapDirectorySession {
    async fn authenticate(
        &mut self,
        bind_dn: &str,
        bind_password: &str,
    ) -> Result<(), DirectoryError> {
        debug!(bind_dn = %bind_dn, "performing LDAP bind");
        let result = self
            .ldap
            .simple_bind(bind_dn, bind_password)
            .await
            .map_err(|error| DirectoryError::Authentication(error.to_string()))?;

        if result.rc != 0 {
            return Err(DirectoryError::Authentication(diagnostic(&result)));
        }

        Ok(())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        debug!(
            base_dn = %base_dn,
            filter = %filter,
            attributes = ?attributes,
            "searching LDAP directory"
        );
        let search = self
            .ldap
            .search(
                base_dn,
                Scope::Subtree,
                filter,
                search_attributes(attributes),
            )
            .await
            .map_err(|error| match error {
                LdapError::FilterParsing => {
                    DirectoryError::Search(format!("invalid filter '{filter}'"))
                }
                other => DirectoryError::Retrieval(other.to_string()),
            })?;

        let (entries, result) = (search.0, search.1);
        if result.rc != 0 {
            return Err(DirectoryError::Search(diagnostic(&result)));
        }

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry::from_attributes(entry.dn, entry.attrs))
            .collect())
    }

    async fn close(&mut self) {
        if let Err(error) = self.ldap.unbind().await {
            warn!(error = %error, "error during LDAP unbind");
        }
    }
}

/// Builds the server URL from a bare host or a full `ldap://` / `ldaps://` URL.
fn directory_url(hostname: &str, port: Option<u16>) -> Result<Url, DirectoryError> {
    let hostname = hostname.trim();
    let raw = if hostname.contains("://") {
        hostname.to_owned()
    } else {
        format!("ldap://{hostname}")
    };

    let mut url = Url::parse(raw.as_str()).map_err(|error| {
        DirectoryError::Connect(format!("invalid directory address '{hostname}': {error}"))
    })?;

    if !matches!(url.scheme(), "ldap" | "ldaps") {
        return Err(DirectoryError::Connect(format!(
            "unsupported directory scheme '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(DirectoryError::Connect(format!(
            "directory address '{hostname}' has no host"
        )));
    }

    if let Some(port) = port {
        url.set_port(Some(port)).map_err(|()| {
            DirectoryError::Connect(format!("cannot apply port {port} to '{hostname}'"))
        })?;
    }

    Ok(url)
}

/// An empty attribute list asks the server for every user attribute; `1.1`
/// asks for none.
fn search_attributes(attributes: &[String]) -> Vec<&str> {
    if attributes.is_empty() {
        return vec![NO_ATTRIBUTES];
    }
    attributes.iter().map(String::as_str).collect()
}

fn diagnostic(result: &LdapResult) -> String {
    if result.text.trim().is_empty() {
        format!("result code {}", result.rc)
    } else {
        format!("result code {}: {}", result.rc, result.text.trim())
    }
}
