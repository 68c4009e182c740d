use crate::constants::{limits, network, paths, timeouts};
use crate::errors::BotError;
use crate::services::validation::Validation;
use crate::utils::feature_flags::is_truthy;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKeyPolicy {
    Accept,
    Pin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub host_key_policy: HostKeyPolicy,
    pub host_key_fingerprint: Option<String>,
    pub timeout: Duration,
    pub max_concurrency: usize,
}

impl std::fmt::Debug for SshSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("host_key_policy", &self.host_key_policy)
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .field("timeout", &self.timeout)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub timeout: Duration,
    pub init_schema: bool,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .field("init_schema", &self.init_schema)
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub api_base: String,
}

impl TelegramSettings {
    pub fn bot_url(&self) -> String {
        format!("{}/bot{}", self.api_base.trim_end_matches('/'), self.token)
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("token", &"***")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub telegram: TelegramSettings,
    pub ssh: SshSettings,
    pub database: DatabaseSettings,
    pub store: StoreKind,
    pub repl_log_path: PathBuf,
    pub session_idle: Duration,
    pub log_file: Option<PathBuf>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, BotError> {
        let _ = dotenvy::dotenv();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, BotError> {
        let validation = Validation::new();
        let get = |key: &str| -> Option<String> {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| -> Result<String, BotError> {
            get(key).ok_or_else(|| {
                BotError::config(format!("{} is required", key))
                    .with_hint("Set it in the environment or in a .env file.")
            })
        };

        let store = match get("BOT_ENTITY_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => {
                return Err(BotError::config(format!(
                    "Unknown BOT_ENTITY_STORE: {}",
                    other
                ))
                .with_hint("Use one of: postgres, memory."))
            }
        };

        let host_key_fingerprint = get("RM_HOST_KEY_SHA256").map(|v| normalize_fingerprint(&v));
        let ssh = SshSettings {
            host: require("RM_HOST")?,
            port: validation.ensure_port(get("RM_PORT").as_deref(), network::SSH_DEFAULT_PORT, "RM_PORT")?,
            username: require("RM_USER")?,
            password: require("RM_PASSWORD")?,
            host_key_policy: if host_key_fingerprint.is_some() {
                HostKeyPolicy::Pin
            } else {
                HostKeyPolicy::Accept
            },
            host_key_fingerprint,
            timeout: Duration::from_millis(validation.ensure_positive(
                get("BOT_SSH_TIMEOUT_MS").as_deref(),
                network::TIMEOUT_SSH_EXEC_DEFAULT_MS,
                "BOT_SSH_TIMEOUT_MS",
            )?),
            max_concurrency: validation.ensure_positive(
                get("BOT_SSH_MAX_CONCURRENCY").as_deref(),
                limits::MAX_CONCURRENT_SSH_CALLS as u64,
                "BOT_SSH_MAX_CONCURRENCY",
            )? as usize,
        };

        let database_required = store == StoreKind::Postgres;
        let db_value = |key: &str| -> Result<String, BotError> {
            if database_required {
                require(key)
            } else {
                Ok(get(key).unwrap_or_default())
            }
        };
        let database = DatabaseSettings {
            host: db_value("DB_HOST")?,
            port: validation.ensure_port(
                get("DB_PORT").as_deref(),
                network::POSTGRES_DEFAULT_PORT,
                "DB_PORT",
            )?,
            user: db_value("DB_USER")?,
            password: get("DB_PASSWORD").unwrap_or_default(),
            database: db_value("DB_DATABASE")?,
            timeout: Duration::from_millis(validation.ensure_positive(
                get("BOT_DB_TIMEOUT_MS").as_deref(),
                network::TIMEOUT_DB_DEFAULT_MS,
                "BOT_DB_TIMEOUT_MS",
            )?),
            init_schema: get("BOT_DB_INIT_SCHEMA").map(is_truthy).unwrap_or(false),
        };

        let telegram = TelegramSettings {
            token: require("TOKEN")?,
            api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| network::TELEGRAM_API_BASE.to_string()),
        };

        Ok(Self {
            telegram,
            ssh,
            database,
            store,
            repl_log_path: get("BOT_REPL_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(paths::REPL_LOG_DEFAULT)),
            session_idle: Duration::from_millis(validation.ensure_positive(
                get("BOT_SESSION_IDLE_MS").as_deref(),
                timeouts::SESSION_IDLE_MS,
                "BOT_SESSION_IDLE_MS",
            )?),
            log_file: get("BOT_LOG_FILE").map(PathBuf::from),
        })
    }
}

fn normalize_fingerprint(value: &str) -> String {
    let cleaned = value.trim().trim_end_matches('=');
    if cleaned.to_lowercase().starts_with("sha256:") {
        return format!("SHA256:{}", cleaned[7..].trim());
    }
    format!("SHA256:{}", cleaned)
}

#[cfg(test)]
mod tests {
    use super::{BotConfig, HostKeyPolicy, StoreKind};
    use crate::errors::BotErrorKind;
    use std::collections::HashMap;
    use std::time::Duration;

    fn base_vars() -> HashMap<String, String> {
        [
            ("TOKEN", "123:abc"),
            ("RM_HOST", "10.0.0.5"),
            ("RM_USER", "ops"),
            ("RM_PASSWORD", "secret"),
            ("DB_HOST", "10.0.0.6"),
            ("DB_USER", "bot"),
            ("DB_PASSWORD", "pw"),
            ("DB_DATABASE", "entities"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn defaults_apply_when_optional_values_missing() {
        let config = BotConfig::from_vars(&base_vars()).expect("config");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.ssh.host_key_policy, HostKeyPolicy::Accept);
        assert_eq!(config.store, StoreKind::Postgres);
        assert_eq!(config.ssh.timeout, Duration::from_millis(60_000));
        assert!(!config.database.init_schema);
        assert_eq!(config.telegram.bot_url(), "https://api.telegram.org/bot123:abc");
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let mut vars = base_vars();
        vars.remove("TOKEN");
        let err = BotConfig::from_vars(&vars).expect_err("token required");
        assert_eq!(err.kind, BotErrorKind::Config);
        assert!(err.message.contains("TOKEN"));
    }

    #[test]
    fn fingerprint_switches_to_pin_policy() {
        let mut vars = base_vars();
        vars.insert("RM_HOST_KEY_SHA256".to_string(), "sha256:AbCd==".to_string());
        let config = BotConfig::from_vars(&vars).expect("config");
        assert_eq!(config.ssh.host_key_policy, HostKeyPolicy::Pin);
        assert_eq!(config.ssh.host_key_fingerprint.as_deref(), Some("SHA256:AbCd"));
    }

    #[test]
    fn memory_store_does_not_require_database_settings() {
        let mut vars = base_vars();
        vars.remove("DB_HOST");
        vars.remove("DB_DATABASE");
        vars.insert("BOT_ENTITY_STORE".to_string(), "memory".to_string());
        let config = BotConfig::from_vars(&vars).expect("config");
        assert_eq!(config.store, StoreKind::Memory);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut vars = base_vars();
        vars.insert("RM_PORT".to_string(), "70000".to_string());
        let err = BotConfig::from_vars(&vars).expect_err("port out of range");
        assert_eq!(err.kind, BotErrorKind::Config);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = BotConfig::from_vars(&base_vars()).expect("config");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("123:abc"));
    }
}
