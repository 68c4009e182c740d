pub mod network {
    pub const POSTGRES_DEFAULT_PORT: u16 = 5432;
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_SSH_EXEC_DEFAULT_MS: u64 = 60_000;
    pub const TIMEOUT_SSH_EXEC_HARD_GRACE_MS: u64 = 2_000;
    pub const TIMEOUT_DB_DEFAULT_MS: u64 = 10_000;
    pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
    pub const TELEGRAM_POLL_TIMEOUT_SECS: u64 = 30;
    pub const TELEGRAM_POLL_RETRY_MS: u64 = 2_000;
}

pub mod limits {
    pub const MAX_CONCURRENT_SSH_CALLS: usize = 8;
    pub const MAX_PORT: u16 = 65_535;
    pub const MIN_PORT: u16 = 1;
    pub const MESSAGE_TEXT_LIMIT: usize = 4096;
    pub const STORED_LIST_LIMIT: usize = 4000;
    pub const REPL_LOG_TAIL_LINES: usize = 15;
    pub const LOG_SUBSTRING_LENGTH: usize = 100;
}

pub mod timeouts {
    pub const SESSION_IDLE_MS: u64 = 300_000;
    pub const SSH_POLL_INTERVAL_MS: u64 = 20;
}

pub mod paths {
    pub const REPL_LOG_DEFAULT: &str = "/var/log/postgresql/postgresql.log";
    pub const REPL_LOG_MARKER: &str = "repl";
}
