use dirsync_core::AppError;
use dirsync_domain::{RecordOutcome, StoreOperation, UserId, UserRecord};
use tracing::debug;

use crate::sync_ports::UserStore;

/// Applies one transformed record against the user store.
///
/// `dn` names the source entry in the outcome when the record has no login.
///
/// Checks run in a fixed order: missing login, missing e-mail, then the
/// login/e-mail ownership decision. Store failures become outcomes and never
/// abort the batch.
pub(super) async fn reconcile_record(
    user_store: &dyn UserStore,
    dn: &str,
    record: UserRecord,
) -> RecordOutcome {
    let Some(login) = record.login().map(str::to_owned) else {
        return RecordOutcome::UnknownUser { dn: dn.to_owned() };
    };
    let Some(email) = record.email().map(str::to_owned) else {
        return RecordOutcome::MissingEmail { login };
    };

    let existing_by_login = match user_store.find_by_login(login.as_str()).await {
        Ok(user_id) => user_id,
        Err(error) => return store_failed(login, StoreOperation::Lookup, &error),
    };
    let existing_by_email = match user_store.find_by_email(email.as_str()).await {
        Ok(user_id) => user_id,
        Err(error) => return store_failed(login, StoreOperation::Lookup, &error),
    };

    match (existing_by_login, existing_by_email) {
        (None, None) => match user_store.create(&record).await {
            Ok(user_id) => {
                debug!(login = %login, user_id = %user_id, "created user from directory entry");
                RecordOutcome::Created { login, user_id }
            }
            Err(error) => store_failed(login, StoreOperation::Create, &error),
        },
        (Some(user_id), None) => update_account(user_store, login, record, user_id).await,
        (Some(user_id), Some(email_owner)) if email_owner == user_id => {
            update_account(user_store, login, record, user_id).await
        }
        (Some(_), Some(_)) => RecordOutcome::LoginEmailConflict { login },
        (None, Some(_)) => RecordOutcome::EmailClaimed { login },
    }
}

async fn update_account(
    user_store: &dyn UserStore,
    login: String,
    record: UserRecord,
    user_id: UserId,
) -> RecordOutcome {
    match user_store.update(&record.with_id(user_id)).await {
        Ok(user_id) => {
            debug!(login = %login, user_id = %user_id, "updated user from directory entry");
            RecordOutcome::Updated { login, user_id }
        }
        Err(error) => store_failed(login, StoreOperation::Update, &error),
    }
}

fn store_failed(login: String, operation: StoreOperation, error: &AppError) -> RecordOutcome {
    RecordOutcome::StoreFailed {
        login,
        operation,
        detail: error.detail().to_owned(),
    }
}
