use crate::constants::{limits, paths};
use crate::errors::BotError;
use crate::services::logger::Logger;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Clone)]
pub struct ReplicationLog {
    logger: Logger,
    path: PathBuf,
}

impl ReplicationLog {
    pub fn new(logger: Logger, path: impl Into<PathBuf>) -> Self {
        Self {
            logger: logger.child("repl_log"),
            path: path.into(),
        }
    }

    /// Last replication-related lines of the local PostgreSQL log, oldest first.
    /// The file is streamed; only the kept window is held in memory.
    pub async fn tail(&self) -> Result<Vec<String>, BotError> {
        let file = File::open(&self.path)
            .await
            .map_err(|err| self.read_failed(err))?;
        let mut reader = BufReader::new(file);
        let mut window = TailWindow::new(limits::REPL_LOG_TAIL_LINES);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|err| self.read_failed(err))?;
            if read == 0 {
                break;
            }
            window.offer(&String::from_utf8_lossy(&buf));
        }
        Ok(window.into_lines())
    }

    fn read_failed(&self, err: std::io::Error) -> BotError {
        self.logger.warn(
            "failed to read replication log",
            Some(&serde_json::json!({
                "path": self.path.display().to_string(),
                "error": err.to_string(),
            })),
        );
        BotError::from(err).with_hint("Check BOT_REPL_LOG_PATH and file permissions.")
    }
}

/// Bounded window over the most recent marker lines.
struct TailWindow {
    keep: usize,
    lines: VecDeque<String>,
}

impl TailWindow {
    fn new(keep: usize) -> Self {
        Self {
            keep,
            lines: VecDeque::with_capacity(keep),
        }
    }

    fn offer(&mut self, raw: &str) {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if self.keep == 0 || !line.contains(paths::REPL_LOG_MARKER) {
            return;
        }
        if self.lines.len() == self.keep {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn into_lines(self) -> Vec<String> {
        self.lines.into()
    }
}

#[cfg(test)]
fn filter_tail(content: &str, keep: usize) -> Vec<String> {
    let mut window = TailWindow::new(keep);
    for line in content.split_inclusive('\n') {
        window.offer(line);
    }
    window.into_lines()
}

#[cfg(test)]
mod tests {
    use super::{filter_tail, ReplicationLog};
    use crate::errors::BotErrorKind;
    use crate::services::logger::Logger;

    #[test]
    fn keeps_only_the_last_matching_lines() {
        let content: String = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    format!("line {} replication slot active\n", i)
                } else {
                    format!("line {} checkpoint complete\n", i)
                }
            })
            .collect();
        let tail = filter_tail(&content, 15);
        assert_eq!(tail.len(), 15);
        assert_eq!(tail.first().map(String::as_str), Some("line 10 replication slot active"));
        assert_eq!(tail.last().map(String::as_str), Some("line 38 replication slot active"));
    }

    #[test]
    fn no_matches_yields_empty() {
        assert!(filter_tail("checkpoint starting\nautovacuum\n", 15).is_empty());
        assert!(filter_tail("", 15).is_empty());
    }

    #[tokio::test]
    async fn reads_from_configured_path() {
        let path = std::env::temp_dir().join(format!("opsbot-repl-{}.log", uuid::Uuid::new_v4()));
        std::fs::write(&path, "a\nstarted streaming WAL from primary (repl)\nb\n").expect("write log");
        let log = ReplicationLog::new(Logger::new("test"), &path);
        let tail = log.tail().await.expect("tail");
        assert_eq!(tail, vec!["started streaming WAL from primary (repl)".to_string()]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn crlf_endings_are_stripped() {
        assert_eq!(
            filter_tail("replica connected\r\nidle\r\nrepl lag 0\r\n", 15),
            vec!["replica connected".to_string(), "repl lag 0".to_string()]
        );
    }

    #[tokio::test]
    async fn large_log_with_invalid_utf8_keeps_only_the_window() {
        let path = std::env::temp_dir().join(format!("opsbot-repl-big-{}.log", uuid::Uuid::new_v4()));
        let mut raw = Vec::new();
        for i in 0..50_000 {
            if i % 1000 == 0 {
                raw.extend_from_slice(format!("{} walreceiver repl ", i).as_bytes());
                raw.extend_from_slice(&[0xff, 0xfe]);
                raw.push(b'\n');
            } else {
                raw.extend_from_slice(format!("{} checkpoint complete\n", i).as_bytes());
            }
        }
        raw.extend_from_slice(b"final repl line without newline");
        std::fs::write(&path, &raw).expect("write log");

        let log = ReplicationLog::new(Logger::new("test"), &path);
        let tail = log.tail().await.expect("tail");
        assert_eq!(tail.len(), 15);
        assert!(tail[0].starts_with("36000 walreceiver repl"));
        assert!(tail[13].starts_with("49000 walreceiver repl"));
        assert!(tail[13].ends_with('\u{FFFD}'));
        assert_eq!(tail[14], "final repl line without newline");
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let path = std::env::temp_dir().join(format!("opsbot-missing-{}.log", uuid::Uuid::new_v4()));
        let log = ReplicationLog::new(Logger::new("test"), path);
        let err = log.tail().await.expect_err("missing file");
        assert_eq!(err.kind, BotErrorKind::NotFound);
    }
}
