//! Directory sync worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use dirsync_application::{SettingsRepository, SyncService, UserStore};
use dirsync_core::{AppError, AppResult};
use dirsync_domain::{SettingKey, SyncInterval};
use dirsync_infrastructure::{
    InMemorySettingsRepository, InMemoryUserStore, LdapDirectoryConnector,
    PostgresSettingsRepository, PostgresUserStore,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SEEDED_SETTINGS: [(&str, SettingKey); 8] = [
    ("DIRSYNC_HOSTNAME", SettingKey::Hostname),
    ("DIRSYNC_PORT", SettingKey::Port),
    ("DIRSYNC_BIND_DN", SettingKey::BindDn),
    ("DIRSYNC_BIND_PASSWORD", SettingKey::BindPassword),
    ("DIRSYNC_BASE_DN", SettingKey::BaseDn),
    ("DIRSYNC_FILTER", SettingKey::Filter),
    ("DIRSYNC_MAPPING", SettingKey::Mapping),
    ("DIRSYNC_INTERVAL", SettingKey::CronInterval),
];

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: Option<String>,
    run_once: bool,
    ldap_timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let (user_store, settings_repository) = build_stores(&config).await?;
    seed_settings(settings_repository.as_ref()).await?;

    let sync_service = SyncService::new(
        Arc::new(LdapDirectoryConnector::new(Duration::from_secs(
            config.ldap_timeout_seconds,
        ))),
        user_store,
        settings_repository,
    );

    info!(
        persistent = config.database_url.is_some(),
        run_once = config.run_once,
        ldap_timeout_seconds = config.ldap_timeout_seconds,
        "dirsync-worker started"
    );

    loop {
        let summary = sync_service.run_sync().await;
        if let Some(abort) = &summary.abort {
            warn!(error = %abort, "directory sync aborted");
        }

        if config.run_once {
            return Ok(());
        }

        let interval = match sync_service.schedule_interval().await {
            Ok(interval) => interval,
            Err(error) => {
                warn!(
                    error = %error,
                    "failed to read sync interval, falling back to default"
                );
                SyncInterval::default()
            }
        };

        info!(
            interval = %interval.as_str(),
            "waiting for next directory sync"
        );
        tokio::time::sleep(interval.period()).await;
    }
}

async fn build_stores(
    config: &WorkerConfig,
) -> AppResult<(Arc<dyn UserStore>, Arc<dyn SettingsRepository>)> {
    let Some(database_url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL is not set, users and settings are kept in memory");
        let user_store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let settings_repository: Arc<dyn SettingsRepository> =
            Arc::new(InMemorySettingsRepository::new());
        return Ok((user_store, settings_repository));
    };

    let pool = connect_pool(database_url).await?;
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let user_store: Arc<dyn UserStore> = Arc::new(PostgresUserStore::new(pool.clone()));
    let settings_repository: Arc<dyn SettingsRepository> =
        Arc::new(PostgresSettingsRepository::new(pool));
    Ok((user_store, settings_repository))
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn seed_settings(settings_repository: &dyn SettingsRepository) -> AppResult<()> {
    for (name, key) in SEEDED_SETTINGS {
        let Ok(value) = env::var(name) else {
            continue;
        };

        if key == SettingKey::CronInterval {
            SyncInterval::parse(value.as_str())?;
        }

        settings_repository.set(key, value.as_str()).await?;
        info!(setting = %key.as_str(), "seeded sync setting from environment");
    }

    Ok(())
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let run_once = parse_env_bool("DIRSYNC_RUN_ONCE", false)?;
        let ldap_timeout_seconds = parse_env_u64("DIRSYNC_LDAP_TIMEOUT_SECONDS", 10)?;

        if ldap_timeout_seconds == 0 {
            return Err(AppError::Validation(
                "DIRSYNC_LDAP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            run_once,
            ldap_timeout_seconds,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Validation(format!(
                "invalid {name} value '{value}': expected true or false"
            ))),
        },
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
