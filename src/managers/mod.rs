pub mod postgres;
pub mod replication_log;
pub mod ssh;
