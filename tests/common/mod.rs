#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use opsbot::errors::BotError;
use opsbot::managers::replication_log::ReplicationLog;
use opsbot::managers::ssh::{CommandGateway, RemoteCommandResult};
use opsbot::services::conversation::ConversationEngine;
use opsbot::services::dispatcher::{ChatTransport, InboundMessage};
use opsbot::services::extraction::EntityKind;
use opsbot::services::logger::Logger;
use opsbot::stores::EntityStore;
use opsbot::utils::temp_artifact::TempArtifact;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn tmp_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
}

/// Gateway double: canned results per command, optional gate that holds a
/// command until released.
#[derive(Default)]
pub struct FakeGateway {
    results: StdMutex<HashMap<String, RemoteCommandResult>>,
    calls: StdMutex<Vec<String>>,
    gates: StdMutex<HashMap<String, Arc<Notify>>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, command: &str, result: RemoteCommandResult) {
        self.results
            .lock()
            .expect("results lock")
            .insert(command.to_string(), result);
    }

    pub fn gate(&self, command: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .expect("gates lock")
            .insert(command.to_string(), notify.clone());
        notify
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CommandGateway for FakeGateway {
    async fn run(&self, command: &str) -> RemoteCommandResult {
        self.calls
            .lock()
            .expect("calls lock")
            .push(command.to_string());
        let gate = self.gates.lock().expect("gates lock").get(command).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.results
            .lock()
            .expect("results lock")
            .get(command)
            .cloned()
            .unwrap_or_else(|| RemoteCommandResult::Output(String::new()))
    }
}

pub struct FailingStore;

#[async_trait]
impl EntityStore for FailingStore {
    async fn save_all(&self, _kind: EntityKind, _values: &[String]) -> Result<(), BotError> {
        Err(BotError::transport("PostgreSQL error: connection refused"))
    }

    async fn load_all(&self, _kind: EntityKind) -> Result<Vec<String>, BotError> {
        Err(BotError::transport("PostgreSQL error: connection refused"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Document { file_name: String, content: String },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Sent::Text(text) => text,
            Sent::Document { content, .. } => content,
        }
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: StdMutex<Vec<(i64, Sent)>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<(i64, Sent)> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, sent)| sent)
            .collect()
    }

    pub async fn wait_for(&self, count: usize) -> Vec<(i64, Sent)> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn receive(&self) -> Result<Vec<InboundMessage>, BotError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Vec::new())
    }

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((chat_id, Sent::Text(text.to_string())));
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, document: &TempArtifact) -> Result<(), BotError> {
        let content = tokio::fs::read_to_string(document.path()).await?;
        self.sent.lock().expect("sent lock").push((
            chat_id,
            Sent::Document {
                file_name: document.file_name().to_string(),
                content,
            },
        ));
        Ok(())
    }
}

pub fn engine_with(
    gateway: Arc<dyn CommandGateway>,
    store: Arc<dyn EntityStore>,
    repl_log_path: PathBuf,
) -> ConversationEngine {
    let logger = Logger::new("test");
    ConversationEngine::new(
        logger.clone(),
        gateway,
        store,
        ReplicationLog::new(logger, repl_log_path),
    )
}

pub fn message(chat_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id,
        user_name: Some("tester".to_string()),
        text: text.to_string(),
    }
}
