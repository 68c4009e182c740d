mod common;
use common::ENV_LOCK;

use opsbot::errors::BotErrorKind;
use opsbot::services::config::{BotConfig, StoreKind};
use std::time::Duration;

const KEYS: &[(&str, &str)] = &[
    ("TOKEN", "42:token"),
    ("RM_HOST", "192.0.2.10"),
    ("RM_PORT", "2222"),
    ("RM_USER", "ops"),
    ("RM_PASSWORD", "pw"),
    ("BOT_ENTITY_STORE", "memory"),
    ("BOT_SSH_TIMEOUT_MS", "1500"),
    ("BOT_SESSION_IDLE_MS", "1000"),
    ("BOT_REPL_LOG_PATH", "/tmp/pg.log"),
];

fn clear() {
    for (key, _) in KEYS {
        std::env::remove_var(key);
    }
}

#[tokio::test]
async fn config_is_read_from_process_environment() {
    let _guard = ENV_LOCK.lock().await;
    clear();
    for (key, value) in KEYS {
        std::env::set_var(key, value);
    }

    let config = BotConfig::from_env();
    clear();
    let config = config.expect("config");

    assert_eq!(config.ssh.port, 2222);
    assert_eq!(config.ssh.timeout, Duration::from_millis(1500));
    assert_eq!(config.session_idle, Duration::from_millis(1000));
    assert_eq!(config.store, StoreKind::Memory);
    assert_eq!(config.repl_log_path, std::path::PathBuf::from("/tmp/pg.log"));
}

#[tokio::test]
async fn missing_ssh_target_aborts_startup() {
    let _guard = ENV_LOCK.lock().await;
    clear();
    for (key, value) in KEYS.iter().filter(|(k, _)| *k != "RM_HOST") {
        std::env::set_var(key, value);
    }

    let result = BotConfig::from_env();
    clear();
    let err = result.expect_err("RM_HOST is required");
    assert_eq!(err.kind, BotErrorKind::Config);
    assert!(err.is_fatal());
}
