//! PostgreSQL-backed user store.

use async_trait::async_trait;
use dirsync_application::UserStore;
use dirsync_core::{AppError, AppResult};
use dirsync_domain::{USER_EMAIL_FIELD, USER_LOGIN_FIELD, UserId, UserRecord};
use serde_json::{Map, Value};
use sqlx::PgPool;

/// PostgreSQL implementation of the user store port.
///
/// Login and e-mail live in their own columns with case-insensitive unique
/// indexes; every other mapped field is kept in the `profile` JSON object.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the stored record for an account.
    pub async fn get(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, user_login, user_email, profile
            FROM directory_users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load user: {error}")))?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_id(&self, column_query: &str, value: &str) -> AppResult<Option<UserId>> {
        let id = sqlx::query_scalar::<_, uuid::Uuid>(column_query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to look up user: {error}")))?;

        Ok(id.map(UserId::from_uuid))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    user_login: String,
    user_email: String,
    profile: Value,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        let mut record = UserRecord::new()
            .with_id(UserId::from_uuid(row.id))
            .with_field(USER_LOGIN_FIELD, row.user_login)
            .with_field(USER_EMAIL_FIELD, row.user_email);

        if let Value::Object(profile) = row.profile {
            for (name, value) in profile {
                if let Value::String(value) = value {
                    record.set(name, value);
                }
            }
        }

        record
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn find_by_login(&self, login: &str) -> AppResult<Option<UserId>> {
        self.find_id(
            r#"
            SELECT id
            FROM directory_users
            WHERE lower(user_login) = lower($1)
            "#,
            login,
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserId>> {
        self.find_id(
            r#"
            SELECT id
            FROM directory_users
            WHERE lower(user_email) = lower($1)
            "#,
            email,
        )
        .await
    }

    async fn create(&self, record: &UserRecord) -> AppResult<UserId> {
        let login = record
            .login()
            .ok_or_else(|| AppError::Validation("user login is required".to_owned()))?;
        let email = record
            .email()
            .ok_or_else(|| AppError::Validation("user e-mail is required".to_owned()))?;

        let id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO directory_users (id, user_login, user_email, profile)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(UserId::new().as_uuid())
        .bind(login)
        .bind(email)
        .bind(profile_of(record))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| conflict_or_internal(error, "create user"))?;

        Ok(UserId::from_uuid(id))
    }

    async fn update(&self, record: &UserRecord) -> AppResult<UserId> {
        let user_id = record
            .id()
            .ok_or_else(|| AppError::Validation("user id is required for update".to_owned()))?;

        let id = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            UPDATE directory_users
            SET user_login = COALESCE($2, user_login),
                user_email = COALESCE($3, user_email),
                profile = profile || $4,
                updated_at = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(record.login())
        .bind(record.email())
        .bind(profile_of(record))
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| conflict_or_internal(error, "update user"))?;

        id.map(UserId::from_uuid)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' does not exist")))
    }
}

fn profile_of(record: &UserRecord) -> Value {
    let profile: Map<String, Value> = record
        .fields()
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), USER_LOGIN_FIELD | USER_EMAIL_FIELD))
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();

    Value::Object(profile)
}

fn conflict_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict("login or e-mail is already taken".to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
