use crate::constants::{limits, network as network_constants, timeouts};
use crate::errors::BotError;
use crate::services::config::{HostKeyPolicy, SshSettings};
use crate::services::logger::Logger;
use crate::utils::text::truncate_utf8_prefix;
use async_trait::async_trait;
use base64::Engine;
use ssh2::{Channel, Session};
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommandResult {
    Output(String),
    RemoteError(String),
    TransportError(String),
}

impl RemoteCommandResult {
    // A non-empty error stream wins even when stdout carries data.
    pub fn classify(stdout: &[u8], stderr: &[u8]) -> Self {
        let error = String::from_utf8_lossy(stderr).trim().to_string();
        if !error.is_empty() {
            return RemoteCommandResult::RemoteError(error);
        }
        RemoteCommandResult::Output(String::from_utf8_lossy(stdout).trim().to_string())
    }

    fn label(&self) -> &'static str {
        match self {
            RemoteCommandResult::Output(_) => "output",
            RemoteCommandResult::RemoteError(_) => "remote_error",
            RemoteCommandResult::TransportError(_) => "transport_error",
        }
    }
}

#[async_trait]
pub trait CommandGateway: Send + Sync {
    async fn run(&self, command: &str) -> RemoteCommandResult;
}

struct Captured {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[derive(Clone)]
pub struct SshGateway {
    logger: Logger,
    settings: Arc<SshSettings>,
    permits: Arc<Semaphore>,
}

impl SshGateway {
    pub fn new(logger: Logger, settings: SshSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));
        Self {
            logger: logger.child("ssh"),
            settings: Arc::new(settings),
            permits,
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl CommandGateway for SshGateway {
    async fn run(&self, command: &str) -> RemoteCommandResult {
        let started = Instant::now();
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return RemoteCommandResult::TransportError(
                    "SSH gateway is shutting down".to_string(),
                )
            }
        };
        let settings = self.settings.clone();
        let owned_command = command.to_string();
        let deadline = settings.timeout
            + Duration::from_millis(network_constants::TIMEOUT_SSH_EXEC_HARD_GRACE_MS);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            exec_blocking(&settings, &owned_command)
        });

        let result = match tokio::time::timeout(deadline, task).await {
            Ok(Ok(Ok(captured))) => RemoteCommandResult::classify(&captured.stdout, &captured.stderr),
            Ok(Ok(Err(err))) => RemoteCommandResult::TransportError(err.message),
            Ok(Err(join_err)) => {
                RemoteCommandResult::TransportError(format!("SSH worker failed: {}", join_err))
            }
            Err(_) => RemoteCommandResult::TransportError(format!(
                "SSH command timed out after {} ms",
                deadline.as_millis()
            )),
        };

        let meta = serde_json::json!({
            "command": truncate_utf8_prefix(command, limits::LOG_SUBSTRING_LENGTH),
            "result": result.label(),
            "duration_ms": started.elapsed().as_millis() as u64,
            "permits_free": self.permits.available_permits(),
        });
        match &result {
            RemoteCommandResult::TransportError(reason) => {
                self.logger.warn(&format!("ssh transport failure: {}", reason), Some(&meta))
            }
            _ => self.logger.info("ssh command finished", Some(&meta)),
        }
        result
    }
}

fn connect_tcp(settings: &SshSettings) -> Result<TcpStream, BotError> {
    let addrs = (settings.host.as_str(), settings.port)
        .to_socket_addrs()
        .map_err(|err| BotError::transport(format!("Failed to resolve SSH host: {}", err)))?;
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, settings.timeout) {
            Ok(tcp) => {
                tcp.set_read_timeout(Some(settings.timeout)).ok();
                tcp.set_write_timeout(Some(settings.timeout)).ok();
                return Ok(tcp);
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(BotError::transport(match last_error {
        Some(err) => format!("Failed to connect SSH: {}", err),
        None => "Failed to connect SSH: host resolved to no addresses".to_string(),
    }))
}

fn connect_session(settings: &SshSettings) -> Result<Session, BotError> {
    let tcp = connect_tcp(settings)?;
    let mut session =
        Session::new().map_err(|_| BotError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(settings.timeout.as_millis()).unwrap_or(u32::MAX));
    session.handshake().map_err(map_ssh_error)?;

    if settings.host_key_policy == HostKeyPolicy::Pin {
        let observed = fingerprint_host_key_sha256(&session);
        let expected = settings.host_key_fingerprint.as_ref();
        if expected.is_none() || observed.as_ref() != expected {
            return Err(BotError::transport(format!(
                "SSH host key mismatch (expected {}, got {})",
                expected.map(String::as_str).unwrap_or("unset"),
                observed.as_deref().unwrap_or("unknown")
            )));
        }
    }

    session
        .userauth_password(&settings.username, &settings.password)
        .map_err(map_ssh_error)?;
    if !session.authenticated() {
        return Err(BotError::transport("SSH authentication failed"));
    }
    Ok(session)
}

fn exec_blocking(settings: &SshSettings, command: &str) -> Result<Captured, BotError> {
    let session = connect_session(settings)?;
    let mut channel = match session.channel_session() {
        Ok(channel) => channel,
        Err(err) => {
            let _ = session.disconnect(None, "channel open failed", None);
            return Err(map_ssh_error(err));
        }
    };
    let captured = match channel.exec(command) {
        Ok(()) => {
            session.set_blocking(false);
            let drained = drain_channel(&mut channel, settings.timeout);
            session.set_blocking(true);
            drained
        }
        Err(err) => Err(map_ssh_error(err)),
    };
    let _ = channel.close();
    let _ = channel.wait_close();
    let _ = session.disconnect(None, "done", None);
    captured
}

fn drain_channel(channel: &mut Channel, timeout: Duration) -> Result<Captured, BotError> {
    let mut stderr_stream = channel.stderr();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = [0u8; 8192];
    let started = Instant::now();

    loop {
        let mut progressed = read_available(channel, &mut buf, &mut stdout, "stdout")?;
        progressed |= read_available(&mut stderr_stream, &mut buf, &mut stderr, "stderr")?;

        if channel.eof() {
            loop {
                let more = read_available(channel, &mut buf, &mut stdout, "stdout")?
                    | read_available(&mut stderr_stream, &mut buf, &mut stderr, "stderr")?;
                if !more {
                    break;
                }
            }
            break;
        }
        if started.elapsed() > timeout {
            return Err(BotError::timeout(format!(
                "SSH command timed out after {} ms",
                timeout.as_millis()
            )));
        }
        if !progressed {
            std::thread::sleep(Duration::from_millis(timeouts::SSH_POLL_INTERVAL_MS));
        }
    }

    Ok(Captured { stdout, stderr })
}

fn read_available<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
    label: &str,
) -> Result<bool, BotError> {
    match reader.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(err) => Err(BotError::transport(format!(
            "SSH {} read failed: {}",
            label, err
        ))),
    }
}

fn fingerprint_host_key_sha256(session: &Session) -> Option<String> {
    let hash = session.host_key_hash(ssh2::HashType::Sha256)?;
    let encoded = base64::engine::general_purpose::STANDARD_NO_PAD.encode(hash);
    Some(format!("SHA256:{}", encoded))
}

fn map_ssh_error(err: ssh2::Error) -> BotError {
    let io_err: std::io::Error = err.into();
    match io_err.kind() {
        std::io::ErrorKind::TimedOut => BotError::timeout("SSH operation timed out"),
        _ => BotError::transport(format!("SSH error: {}", io_err)),
    }
}

#[cfg(test)]
mod tests {
    use super::RemoteCommandResult;

    #[test]
    fn stdout_only_yields_output() {
        let result = RemoteCommandResult::classify(b"  Linux host 6.1.0\n", b"");
        assert_eq!(result, RemoteCommandResult::Output("Linux host 6.1.0".to_string()));
    }

    #[test]
    fn any_stderr_wins_over_stdout() {
        let result = RemoteCommandResult::classify(b"partial output", b"warning: disk slow\n");
        assert_eq!(
            result,
            RemoteCommandResult::RemoteError("warning: disk slow".to_string())
        );
    }

    #[test]
    fn whitespace_only_stderr_is_ignored() {
        let result = RemoteCommandResult::classify(b"ok", b" \n\t");
        assert_eq!(result, RemoteCommandResult::Output("ok".to_string()));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let result = RemoteCommandResult::classify(&[0x66, 0xff, 0x6f], b"");
        assert_eq!(result, RemoteCommandResult::Output("f\u{fffd}o".to_string()));
    }
}
