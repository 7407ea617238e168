//! Application user identifiers and the profile record produced from one
//! directory entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Profile field carrying the unique account login.
pub const USER_LOGIN_FIELD: &str = "user_login";

/// Profile field carrying the account e-mail address.
pub const USER_EMAIL_FIELD: &str = "user_email";

/// Unique identifier for an account in the user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Profile fields for one account, keyed by target field name.
///
/// A field that no mapping candidate matched is absent rather than empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    id: Option<UserId>,
    fields: BTreeMap<String, String>,
}

impl UserRecord {
    /// Creates an empty record without an identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record with one field set.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Returns the record bound to an existing account.
    #[must_use]
    pub fn with_id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets one field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Returns a field value when present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the login when present and not blank.
    #[must_use]
    pub fn login(&self) -> Option<&str> {
        self.non_blank(USER_LOGIN_FIELD)
    }

    /// Returns the e-mail address when present and not blank.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.non_blank(USER_EMAIL_FIELD)
    }

    /// Returns the identifier of the account this record updates.
    #[must_use]
    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    /// Returns all fields in name order.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    fn non_blank(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.trim().is_empty())
    }
}
