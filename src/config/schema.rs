use std::collections::{HashMap, HashSet};
use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteJournalMode;

pub const ENV_PREFIX: &str = "BASEGRID";
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct BasegridConfig {
    pub store: Store,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub cascade: Cascade,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Store {
    #[cfg(feature = "store-postgres")]
    Postgres(Postgres),
    Sqlite(Sqlite),
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Postgres {
    pub dsn: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Sqlite {
    pub dsn: String,
    #[serde(default)]
    pub journal_mode: JournalMode,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    #[default]
    Wal,
    Off,
}

impl From<JournalMode> for SqliteJournalMode {
    fn from(mode: JournalMode) -> Self {
        match mode {
            JournalMode::Delete => SqliteJournalMode::Delete,
            JournalMode::Truncate => SqliteJournalMode::Truncate,
            JournalMode::Persist => SqliteJournalMode::Persist,
            JournalMode::Memory => SqliteJournalMode::Memory,
            JournalMode::Wal => SqliteJournalMode::Wal,
            JournalMode::Off => SqliteJournalMode::Off,
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

#[derive(Deserialize, Debug, PartialEq, Eq, Default, Clone)]
pub struct Auth {
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub password_sha256: String,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Keystrokes edit a draft; blur/Enter persist it, Escape throws it away
    #[default]
    OnConfirm,
    /// Every change is persisted as it happens; Escape keeps what was typed
    PerChange,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Grid {
    pub commit_mode: CommitMode,
    pub date_format: String,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            commit_mode: CommitMode::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Delete whatever the failed cascade already created, newest first
    #[default]
    Rollback,
    /// Keep the partially created entities
    LeaveOrphans,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(default)]
pub struct Cascade {
    pub on_failure: FailurePolicy,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(default)]
pub struct Logging {
    pub json: bool,
}

pub fn str_to_hex_hash(input: &str) -> String {
    hex::encode(Sha256::digest(input))
}

pub fn validate_config(config: BasegridConfig) -> Result<BasegridConfig, ConfigError> {
    let in_memory_store = matches!(config.store, Store::Sqlite(Sqlite { ref dsn, .. }) if dsn.contains(":memory:"));

    if in_memory_store && config.auth.users.is_empty() {
        return Err(ConfigError::Message(
            "You are using an in-memory store without any configured users. \
            Nobody will be able to sign in, and nothing will survive a restart."
                .to_string(),
        ));
    }

    let mut ids = HashSet::new();
    let mut emails = HashSet::new();
    for user in &config.auth.users {
        if !ids.insert(user.id.as_str()) {
            return Err(ConfigError::Message(format!(
                "Duplicate user id {:?}",
                user.id
            )));
        }
        if !emails.insert(user.email.to_lowercase()) {
            return Err(ConfigError::Message(format!(
                "Duplicate user email {:?}",
                user.email
            )));
        }
        if user.password_sha256.len() != 64
            || !user.password_sha256.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ConfigError::Message(format!(
                "password_sha256 for {:?} must be a 64-character hex SHA-256 digest",
                user.email
            )));
        }
    }

    if config.grid.date_format.trim().is_empty() {
        return Err(ConfigError::Message(
            "grid.date_format can't be empty".to_string(),
        ));
    }

    Ok(config)
}

fn environment(env_override: Option<HashMap<String, String>>) -> Environment {
    let env = Environment::with_prefix(ENV_PREFIX).separator("__");

    match env_override {
        Some(vars) => env.source(Some(vars.into_iter().collect::<Map<String, String>>())),
        None => env,
    }
}

pub fn load_config(path: &Path) -> Result<BasegridConfig, ConfigError> {
    let path = path.to_str().ok_or_else(|| {
        ConfigError::Message(format!("Config path {path:?} isn't valid UTF-8"))
    })?;

    let config = Config::builder()
        .add_source(File::with_name(path))
        .add_source(environment(None));

    config.build()?.try_deserialize().and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
    env_override: Option<HashMap<String, String>>,
) -> Result<BasegridConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(config_str, FileFormat::Toml))
        .add_source(environment(env_override));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
