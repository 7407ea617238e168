use std::collections::HashMap;

use async_trait::async_trait;
use dirsync_application::UserStore;
use dirsync_core::{AppError, AppResult};
use dirsync_domain::{UserId, UserRecord};
use tokio::sync::RwLock;

/// In-memory user store implementation.
///
/// Logins and e-mail addresses are unique and compared case-insensitively,
/// matching the PostgreSQL store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the stored record for an account.
    pub async fn get(&self, user_id: UserId) -> Option<UserRecord> {
        self.users.read().await.get(&user_id).cloned()
    }

    /// Returns the number of stored accounts.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns whether the store holds no accounts.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn owner_of(
    users: &HashMap<UserId, UserRecord>,
    value: &str,
    field: fn(&UserRecord) -> Option<&str>,
) -> Option<UserId> {
    users.iter().find_map(|(user_id, record)| {
        field(record)
            .is_some_and(|stored| stored.to_lowercase() == value.to_lowercase())
            .then_some(*user_id)
    })
}

fn ensure_unclaimed(
    users: &HashMap<UserId, UserRecord>,
    user_id: UserId,
    record: &UserRecord,
) -> AppResult<()> {
    if let Some(login) = record.login()
        && owner_of(users, login, UserRecord::login).is_some_and(|owner| owner != user_id)
    {
        return Err(AppError::Conflict(format!(
            "login '{login}' is already in use"
        )));
    }

    if let Some(email) = record.email()
        && owner_of(users, email, UserRecord::email).is_some_and(|owner| owner != user_id)
    {
        return Err(AppError::Conflict(format!(
            "an account with e-mail '{email}' already exists"
        )));
    }

    Ok(())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_login(&self, login: &str) -> AppResult<Option<UserId>> {
        Ok(owner_of(&*self.users.read().await, login, UserRecord::login))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserId>> {
        Ok(owner_of(&*self.users.read().await, email, UserRecord::email))
    }

    async fn create(&self, record: &UserRecord) -> AppResult<UserId> {
        if record.login().is_none() || record.email().is_none() {
            return Err(AppError::Validation(
                "user_login and user_email are required to create a user".to_owned(),
            ));
        }

        let mut users = self.users.write().await;
        let user_id = UserId::new();
        ensure_unclaimed(&users, user_id, record)?;

        let mut stored = UserRecord::new().with_id(user_id);
        for (name, value) in record.fields() {
            stored.set(name.as_str(), value.as_str());
        }
        users.insert(user_id, stored);

        Ok(user_id)
    }

    async fn update(&self, record: &UserRecord) -> AppResult<UserId> {
        let user_id = record.id().ok_or_else(|| {
            AppError::Validation("updating a user requires its identifier".to_owned())
        })?;

        let mut users = self.users.write().await;
        if !users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }
        ensure_unclaimed(&users, user_id, record)?;

        let stored = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        for (name, value) in record.fields() {
            stored.set(name.as_str(), value.as_str());
        }

        Ok(user_id)
    }
}
