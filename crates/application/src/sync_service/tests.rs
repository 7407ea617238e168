use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dirsync_core::{AppError, AppResult};
use dirsync_domain::{
    DirectoryEntry, SettingKey, SyncInterval, USER_EMAIL_FIELD, USER_LOGIN_FIELD, UserId,
    UserRecord,
};

use crate::sync_ports::{
    DirectoryConnector, DirectoryError, DirectorySession, SettingsRepository, UserStore,
};

use super::{SyncAbort, SyncService};

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredAccount {
    id: UserId,
    fields: BTreeMap<String, String>,
}

#[derive(Default)]
struct FakeUserStore {
    accounts: Mutex<Vec<StoredAccount>>,
    rejected_logins: HashSet<String>,
    failing_updates: HashSet<String>,
    failing_lookups: HashSet<String>,
    mutations: Mutex<u32>,
}

impl FakeUserStore {
    fn rejecting(login: &str) -> Self {
        Self {
            rejected_logins: HashSet::from([login.to_owned()]),
            ..Self::default()
        }
    }

    fn failing_update_of(login: &str) -> Self {
        Self {
            failing_updates: HashSet::from([login.to_owned()]),
            ..Self::default()
        }
    }

    fn failing_lookup_of(login_or_email: &str) -> Self {
        Self {
            failing_lookups: HashSet::from([login_or_email.to_owned()]),
            ..Self::default()
        }
    }

    async fn seed(&self, login: &str, email: &str) -> UserId {
        let id = UserId::new();
        self.accounts.lock().await.push(StoredAccount {
            id,
            fields: BTreeMap::from([
                (USER_LOGIN_FIELD.to_owned(), login.to_owned()),
                (USER_EMAIL_FIELD.to_owned(), email.to_owned()),
            ]),
        });
        id
    }

    async fn snapshot(&self) -> Vec<StoredAccount> {
        self.accounts.lock().await.clone()
    }

    async fn mutation_count(&self) -> u32 {
        *self.mutations.lock().await
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Option<UserId> {
        self.accounts
            .lock()
            .await
            .iter()
            .find(|account| account.fields.get(field).map(String::as_str) == Some(value))
            .map(|account| account.id)
    }
}

#[async_trait]
impl UserStore for FakeUserStore {
    async fn find_by_login(&self, login: &str) -> AppResult<Option<UserId>> {
        if self.failing_lookups.contains(login) {
            return Err(AppError::Internal("user table is unavailable".to_owned()));
        }
        Ok(self.find_by_field(USER_LOGIN_FIELD, login).await)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserId>> {
        if self.failing_lookups.contains(email) {
            return Err(AppError::Internal("user table is unavailable".to_owned()));
        }
        Ok(self.find_by_field(USER_EMAIL_FIELD, email).await)
    }

    async fn create(&self, record: &UserRecord) -> AppResult<UserId> {
        if let Some(login) = record.login()
            && self.rejected_logins.contains(login)
        {
            return Err(AppError::Conflict("login is reserved".to_owned()));
        }

        let id = UserId::new();
        self.accounts.lock().await.push(StoredAccount {
            id,
            fields: record.fields().clone(),
        });
        *self.mutations.lock().await += 1;
        Ok(id)
    }

    async fn update(&self, record: &UserRecord) -> AppResult<UserId> {
        let id = record
            .id()
            .ok_or_else(|| AppError::Validation("update requires an id".to_owned()))?;
        if let Some(login) = record.login()
            && self.failing_updates.contains(login)
        {
            return Err(AppError::Internal("account is locked".to_owned()));
        }
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .iter_mut()
            .find(|account| account.id == id)
            .ok_or_else(|| AppError::NotFound(format!("user '{id}' not found")))?;

        for (name, value) in record.fields() {
            account.fields.insert(name.clone(), value.clone());
        }
        *self.mutations.lock().await += 1;
        Ok(id)
    }
}

#[derive(Default)]
struct DirectoryCalls {
    connects: u32,
    binds: Vec<String>,
    requested_attributes: Vec<Vec<String>>,
    closed_sessions: u32,
}

struct FakeDirectory {
    entries: Vec<DirectoryEntry>,
    failure: Option<DirectoryError>,
    calls: Arc<Mutex<DirectoryCalls>>,
}

impl FakeDirectory {
    fn with_entries(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries,
            failure: None,
            calls: Arc::new(Mutex::new(DirectoryCalls::default())),
        }
    }

    fn failing(failure: DirectoryError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::with_entries(Vec::new())
        }
    }
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn connect(
        &self,
        _hostname: &str,
        _port: Option<u16>,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        self.calls.lock().await.connects += 1;
        if let Some(failure @ DirectoryError::Connect(_)) = &self.failure {
            return Err(failure.clone());
        }

        Ok(Box::new(FakeSession {
            entries: self.entries.clone(),
            failure: self.failure.clone(),
            calls: self.calls.clone(),
        }))
    }
}

struct FakeSession {
    entries: Vec<DirectoryEntry>,
    failure: Option<DirectoryError>,
    calls: Arc<Mutex<DirectoryCalls>>,
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn authenticate(
        &mut self,
        bind_dn: &str,
        _bind_password: &str,
    ) -> Result<(), DirectoryError> {
        self.calls.lock().await.binds.push(bind_dn.to_owned());
        if let Some(failure @ DirectoryError::Authentication(_)) = &self.failure {
            return Err(failure.clone());
        }
        Ok(())
    }

    async fn search(
        &mut self,
        _base_dn: &str,
        _filter: &str,
        attributes: &[String],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.calls
            .lock()
            .await
            .requested_attributes
            .push(attributes.to_vec());
        match &self.failure {
            Some(failure @ (DirectoryError::Search(_) | DirectoryError::Retrieval(_))) => {
                Err(failure.clone())
            }
            _ => Ok(self.entries.clone()),
        }
    }

    async fn close(&mut self) {
        self.calls.lock().await.closed_sessions += 1;
    }
}

#[derive(Default)]
struct FakeSettingsRepository {
    values: Mutex<HashMap<SettingKey, String>>,
}

impl FakeSettingsRepository {
    fn configured() -> Self {
        Self {
            values: Mutex::new(HashMap::from([
                (SettingKey::Hostname, "ldap.example.com".to_owned()),
                (SettingKey::Port, "389".to_owned()),
                (
                    SettingKey::BindDn,
                    "cn=sync,dc=example,dc=com".to_owned(),
                ),
                (SettingKey::BindPassword, "secret".to_owned()),
                (SettingKey::BaseDn, "ou=people,dc=example,dc=com".to_owned()),
                (SettingKey::Filter, "(objectClass=person)".to_owned()),
            ])),
        }
    }

    async fn value(&self, key: SettingKey) -> Option<String> {
        self.values.lock().await.get(&key).cloned()
    }
}

#[async_trait]
impl SettingsRepository for FakeSettingsRepository {
    async fn get(&self, key: SettingKey) -> AppResult<Option<String>> {
        Ok(self.value(key).await)
    }

    async fn set(&self, key: SettingKey, value: &str) -> AppResult<()> {
        self.values.lock().await.insert(key, value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: SettingKey) -> AppResult<()> {
        self.values.lock().await.remove(&key);
        Ok(())
    }
}

struct Harness {
    service: SyncService,
    store: Arc<FakeUserStore>,
    settings: Arc<FakeSettingsRepository>,
    calls: Arc<Mutex<DirectoryCalls>>,
}

fn harness(
    directory: FakeDirectory,
    store: FakeUserStore,
    settings: FakeSettingsRepository,
) -> Harness {
    let calls = directory.calls.clone();
    let store = Arc::new(store);
    let settings = Arc::new(settings);
    let service = SyncService::new(Arc::new(directory), store.clone(), settings.clone());

    Harness {
        service,
        store,
        settings,
        calls,
    }
}

fn person(uid: &str, mail: &str) -> DirectoryEntry {
    DirectoryEntry::new(format!("uid={uid},ou=people,dc=example,dc=com"))
        .with_attribute("uid", [uid])
        .with_attribute("mail", [mail])
        .with_attribute("cn", [format!("{uid} example")])
}

#[tokio::test]
async fn run_creates_new_user_and_updates_existing_one() {
    let store = FakeUserStore::default();
    let bob_id = store.seed("bob", "bob@example.com").await;
    let directory = FakeDirectory::with_entries(vec![
        person("alice", "alice@example.com"),
        person("bob", "bob@example.com"),
    ]);
    let harness = harness(directory, store, FakeSettingsRepository::configured());

    let summary = harness.service.run_sync().await;

    assert!(summary.abort.is_none());
    assert_eq!(summary.statistics.synchronized(), 2);
    assert_eq!(summary.statistics.created, 1);
    assert_eq!(summary.statistics.updated, 1);
    assert_eq!(summary.statistics.errors, 0);
    assert!(summary.log_text.contains(
        "Statistics: 2 created/updated (1 created, 1 updated), 0 unknown, 0 missing e-mail, 0 errors."
    ));
    assert!(summary.log_text.contains("Entries retrieved: 2"));

    let accounts = harness.store.snapshot().await;
    assert_eq!(accounts.len(), 2);
    let bob = accounts.iter().find(|account| account.id == bob_id);
    assert_eq!(
        bob.and_then(|account| account.fields.get("display_name"))
            .map(String::as_str),
        Some("bob example")
    );

    assert_eq!(
        harness.settings.value(SettingKey::Log).await.as_deref(),
        Some(summary.log_text.as_str())
    );
    assert_eq!(
        harness.settings.value(SettingKey::LastSync).await,
        Some(summary.finished_at.timestamp().to_string())
    );
}

#[tokio::test]
async fn search_requests_only_mapped_attributes() {
    let directory = FakeDirectory::with_entries(Vec::new());
    let harness = harness(
        directory,
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );

    let summary = harness.service.run_sync().await;

    assert!(summary.abort.is_none());
    let calls = harness.calls.lock().await;
    assert_eq!(
        calls.requested_attributes,
        vec![vec!["uid", "nickname", "mail", "cn", "givenname", "sn"]]
    );
    assert_eq!(calls.binds, vec!["cn=sync,dc=example,dc=com"]);
    assert_eq!(calls.closed_sessions, 1);
}

#[tokio::test]
async fn login_and_email_owned_by_different_accounts_is_rejected() {
    let store = FakeUserStore::default();
    store.seed("alice", "a@x.com").await;
    store.seed("bob", "b@x.com").await;
    let before = store.snapshot().await;
    let directory = FakeDirectory::with_entries(vec![person("alice", "b@x.com")]);
    let harness = harness(directory, store, FakeSettingsRepository::configured());

    let summary = harness.service.run_sync().await;

    assert_eq!(summary.statistics.errors, 1);
    assert_eq!(summary.statistics.synchronized(), 0);
    assert!(summary.log_text.contains(
        "Error updating user alice: given e-mail is already in use by another user."
    ));
    assert_eq!(harness.store.snapshot().await, before);
    assert_eq!(harness.store.mutation_count().await, 0);
}

#[tokio::test]
async fn new_login_with_claimed_email_is_rejected() {
    let store = FakeUserStore::default();
    store.seed("alice", "a@x.com").await;
    let directory = FakeDirectory::with_entries(vec![person("carol", "a@x.com")]);
    let harness = harness(directory, store, FakeSettingsRepository::configured());

    let summary = harness.service.run_sync().await;

    assert_eq!(summary.statistics.errors, 1);
    assert!(summary.log_text.contains("Error creating user carol"));
    assert_eq!(harness.store.mutation_count().await, 0);
}

#[tokio::test]
async fn records_without_login_or_email_are_skipped() {
    let without_login = DirectoryEntry::new("cn=printer").with_attribute("mail", ["p@x.com"]);
    let without_email = DirectoryEntry::new("uid=dave").with_attribute("uid", ["dave"]);
    let directory = FakeDirectory::with_entries(vec![without_login, without_email]);
    let harness = harness(
        directory,
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );

    let summary = harness.service.run_sync().await;

    assert_eq!(summary.statistics.unknown, 1);
    assert_eq!(summary.statistics.missing_email, 1);
    assert_eq!(summary.statistics.errors, 0);
    assert!(
        summary
            .log_text
            .contains("An unknown user without user_login was ignored (entry cn=printer).")
    );
    assert!(
        summary
            .log_text
            .contains("User dave was ignored, no e-mail given.")
    );
    assert_eq!(harness.store.mutation_count().await, 0);
}

#[tokio::test]
async fn repeated_run_updates_instead_of_duplicating() {
    let directory = FakeDirectory::with_entries(vec![person("erin", "erin@example.com")]);
    let harness = harness(
        directory,
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );

    let first = harness.service.run_sync().await;
    let after_first = harness.store.snapshot().await;
    let second = harness.service.run_sync().await;
    let after_second = harness.store.snapshot().await;

    assert_eq!(first.statistics.created, 1);
    assert_eq!(second.statistics.created, 0);
    assert_eq!(second.statistics.updated, 1);
    assert_eq!(after_second.len(), 1);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn store_failure_is_counted_and_later_records_continue() {
    let directory = FakeDirectory::with_entries(vec![
        person("root", "root@example.com"),
        person("frank", "frank@example.com"),
    ]);
    let harness = harness(
        directory,
        FakeUserStore::rejecting("root"),
        FakeSettingsRepository::configured(),
    );

    let summary = harness.service.run_sync().await;

    assert_eq!(summary.statistics.errors, 1);
    assert_eq!(summary.statistics.created, 1);
    assert!(
        summary
            .log_text
            .contains("Error creating user root: login is reserved")
    );
    assert!(summary.log_text.contains("1 errors."));
}

#[tokio::test]
async fn existing_login_with_unclaimed_email_takes_the_new_email() {
    let store = FakeUserStore::default();
    let bob_id = store.seed("bob", "bob@old.example.com").await;
    let directory = FakeDirectory::with_entries(vec![
        person("bob", "bob@new.example.com"),
        person("iris", "iris@example.com"),
    ]);
    let harness = harness(directory, store, FakeSettingsRepository::configured());

    let summary = harness.service.run_sync().await;

    assert_eq!(summary.statistics.updated, 1);
    assert_eq!(summary.statistics.created, 1);
    assert_eq!(summary.statistics.errors, 0);
    assert!(!summary.log_text.contains("Error"));

    let accounts = harness.store.snapshot().await;
    let bob = accounts.iter().find(|account| account.id == bob_id);
    assert_eq!(
        bob.and_then(|account| account.fields.get(USER_EMAIL_FIELD))
            .map(String::as_str),
        Some("bob@new.example.com")
    );
    assert_eq!(accounts.len(), 2);
}

#[tokio::test]
async fn update_failure_is_counted_and_later_records_continue() {
    let store = FakeUserStore::failing_update_of("bob");
    store.seed("bob", "bob@example.com").await;
    let directory = FakeDirectory::with_entries(vec![
        person("bob", "bob@example.com"),
        person("jack", "jack@example.com"),
    ]);
    let harness = harness(directory, store, FakeSettingsRepository::configured());

    let summary = harness.service.run_sync().await;

    assert!(summary.abort.is_none());
    assert_eq!(summary.statistics.errors, 1);
    assert_eq!(summary.statistics.updated, 0);
    assert_eq!(summary.statistics.created, 1);
    assert!(
        summary
            .log_text
            .contains("Error updating user bob: account is locked")
    );
    assert_eq!(harness.store.mutation_count().await, 1);
    assert_eq!(harness.store.snapshot().await.len(), 2);
}

#[tokio::test]
async fn lookup_failure_is_counted_and_later_records_continue() {
    let directory = FakeDirectory::with_entries(vec![
        person("hank", "hank@example.com"),
        person("kate", "kate@example.com"),
    ]);
    let harness = harness(
        directory,
        FakeUserStore::failing_lookup_of("hank@example.com"),
        FakeSettingsRepository::configured(),
    );

    let summary = harness.service.run_sync().await;

    assert!(summary.abort.is_none());
    assert_eq!(summary.statistics.errors, 1);
    assert_eq!(summary.statistics.created, 1);
    assert!(
        summary
            .log_text
            .contains("Error looking up user hank: user table is unavailable")
    );
    assert!(summary.log_text.contains("1 errors."));

    let accounts = harness.store.snapshot().await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(
        accounts[0].fields.get(USER_LOGIN_FIELD).map(String::as_str),
        Some("kate")
    );
}

#[tokio::test]
async fn bind_failure_aborts_without_touching_users_or_last_sync() {
    let directory = FakeDirectory::failing(DirectoryError::Authentication(
        "invalid credentials".to_owned(),
    ));
    let harness = harness(
        directory,
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );

    let summary = harness.service.run_sync().await;

    assert_eq!(
        summary.abort,
        Some(SyncAbort::Directory(DirectoryError::Authentication(
            "invalid credentials".to_owned()
        )))
    );
    assert!(summary.log_text.contains("Connection to LDAP server succeeded."));
    assert!(summary.log_text.contains(
        "Bind to LDAP server failed. Please check Bind DN and password. Additional information: invalid credentials"
    ));
    assert!(!summary.log_text.contains("Statistics:"));
    assert!(harness.settings.value(SettingKey::LastSync).await.is_none());
    assert!(harness.settings.value(SettingKey::Log).await.is_some());

    let calls = harness.calls.lock().await;
    assert!(calls.requested_attributes.is_empty());
    assert_eq!(calls.closed_sessions, 1);
}

#[tokio::test]
async fn connect_and_search_failures_abort_the_run() {
    let unreachable = harness(
        FakeDirectory::failing(DirectoryError::Connect("connection refused".to_owned())),
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );
    let summary = unreachable.service.run_sync().await;
    assert!(
        summary
            .log_text
            .contains("Connect to LDAP server failed. Please check hostname and port.")
    );
    assert!(unreachable.calls.lock().await.binds.is_empty());

    let bad_filter = harness(
        FakeDirectory::failing(DirectoryError::Search("bad filter".to_owned())),
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );
    let summary = bad_filter.service.run_sync().await;
    assert!(
        summary
            .log_text
            .contains("Search was not successful. Please check Base DN and filter.")
    );
    assert!(!summary.log_text.contains("Search was successful."));
    assert!(bad_filter.settings.value(SettingKey::LastSync).await.is_none());
}

#[tokio::test]
async fn missing_hostname_aborts_before_connecting() {
    let harness = harness(
        FakeDirectory::with_entries(Vec::new()),
        FakeUserStore::default(),
        FakeSettingsRepository::default(),
    );

    let summary = harness.service.run_sync().await;

    assert!(matches!(summary.abort, Some(SyncAbort::Configuration(_))));
    assert!(summary.log_text.contains("hostname is not configured"));
    assert_eq!(harness.calls.lock().await.connects, 0);
}

#[tokio::test]
async fn malformed_mapping_lines_are_logged_and_skipped() {
    let settings = FakeSettingsRepository::configured();
    settings
        .values
        .lock()
        .await
        .insert(SettingKey::Mapping, "user_login=uid\nnot a rule\nuser_email=mail".to_owned());
    let directory = FakeDirectory::with_entries(vec![person("gina", "gina@example.com")]);
    let harness = harness(directory, FakeUserStore::default(), settings);

    let summary = harness.service.run_sync().await;

    assert!(summary.abort.is_none());
    assert_eq!(summary.statistics.created, 1);
    assert!(summary.log_text.contains("line 2 'not a rule'"));
    assert_eq!(
        harness.calls.lock().await.requested_attributes,
        vec![vec!["uid", "mail"]]
    );
}

#[tokio::test]
async fn schedule_and_last_sync_read_back_from_settings() {
    let harness = harness(
        FakeDirectory::with_entries(Vec::new()),
        FakeUserStore::default(),
        FakeSettingsRepository::configured(),
    );

    let interval = harness.service.schedule_interval().await;
    assert!(matches!(interval, Ok(SyncInterval::Daily)));
    let never_synced = harness.service.last_sync().await;
    assert!(matches!(never_synced, Ok(None)));

    let summary = harness.service.run_sync().await;
    let _ = harness
        .settings
        .set(SettingKey::CronInterval, "hourly")
        .await;

    assert!(matches!(
        harness.service.schedule_interval().await,
        Ok(SyncInterval::Hourly)
    ));
    let last_sync = harness.service.last_sync().await;
    assert_eq!(
        last_sync.ok().flatten().map(|time| time.timestamp()),
        Some(summary.finished_at.timestamp())
    );
    assert_eq!(
        harness.service.stored_log().await.ok().flatten(),
        Some(summary.log_text)
    );
}
