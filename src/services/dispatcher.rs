use crate::constants::network;
use crate::errors::BotError;
use crate::services::conversation::{ConversationEngine, Reply, Session};
use crate::services::logger::Logger;
use crate::utils::temp_artifact::TempArtifact;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub user_name: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn receive(&self) -> Result<Vec<InboundMessage>, BotError>;

    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), BotError>;

    async fn send_document(&self, chat_id: i64, document: &TempArtifact) -> Result<(), BotError>;
}

type WorkerMap = DashMap<i64, UnboundedSender<InboundMessage>>;

/// Routes inbound messages to one worker task per chat. Turns within a chat
/// are handled strictly in arrival order; different chats run concurrently.
#[derive(Clone)]
pub struct Dispatcher {
    logger: Logger,
    engine: Arc<ConversationEngine>,
    transport: Arc<dyn ChatTransport>,
    workers: Arc<WorkerMap>,
    idle: Duration,
}

impl Dispatcher {
    pub fn new(
        logger: Logger,
        engine: Arc<ConversationEngine>,
        transport: Arc<dyn ChatTransport>,
        idle: Duration,
    ) -> Self {
        Self {
            logger: logger.child("dispatcher"),
            engine,
            transport,
            workers: Arc::new(DashMap::new()),
            idle,
        }
    }

    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    pub async fn run(&self) {
        loop {
            self.poll_once().await;
        }
    }

    pub async fn poll_once(&self) {
        match self.transport.receive().await {
            Ok(messages) => {
                for message in messages {
                    self.dispatch(message);
                }
            }
            Err(err) => {
                self.logger.warn(
                    "receive failed",
                    Some(&serde_json::json!({ "error": err.message, "code": err.code })),
                );
                tokio::time::sleep(Duration::from_millis(network::TELEGRAM_POLL_RETRY_MS)).await;
            }
        }
    }

    pub fn dispatch(&self, message: InboundMessage) {
        let chat_id = message.chat_id;
        let mut pending = message;
        loop {
            match self.workers.entry(chat_id) {
                Entry::Occupied(entry) => match entry.get().send(pending) {
                    Ok(()) => return,
                    Err(returned) => {
                        // Worker exited without deregistering (panic); replace it.
                        pending = returned.0;
                        entry.remove();
                    }
                },
                Entry::Vacant(entry) => {
                    let (sender, receiver) = unbounded_channel();
                    if let Err(returned) = sender.send(pending) {
                        pending = returned.0;
                        continue;
                    }
                    entry.insert(sender);
                    self.spawn_worker(chat_id, receiver);
                    return;
                }
            }
        }
    }

    fn spawn_worker(&self, chat_id: i64, receiver: UnboundedReceiver<InboundMessage>) {
        let worker = ChatWorker {
            logger: self.logger.child(&format!("chat{}", chat_id)),
            engine: self.engine.clone(),
            transport: self.transport.clone(),
            workers: self.workers.clone(),
            idle: self.idle,
            session: Session::new(chat_id),
        };
        tokio::spawn(worker.run(receiver));
    }
}

struct ChatWorker {
    logger: Logger,
    engine: Arc<ConversationEngine>,
    transport: Arc<dyn ChatTransport>,
    workers: Arc<WorkerMap>,
    idle: Duration,
    session: Session,
}

impl ChatWorker {
    async fn run(mut self, mut receiver: UnboundedReceiver<InboundMessage>) {
        let chat_id = self.session.chat_id();
        loop {
            match tokio::time::timeout(self.idle, receiver.recv()).await {
                Ok(Some(message)) => self.process(message).await,
                Ok(None) => break,
                Err(_) => {
                    if !self.session.is_idle() {
                        continue;
                    }
                    // Senders hold the shard lock while sending, so an empty
                    // queue here means nothing can be in flight.
                    if self
                        .workers
                        .remove_if(&chat_id, |_, _| receiver.is_empty())
                        .is_some()
                    {
                        self.logger.debug("worker retired", None);
                        break;
                    }
                }
            }
        }
    }

    async fn process(&mut self, message: InboundMessage) {
        let replies = self
            .engine
            .handle(&mut self.session, &message.text, message.user_name.as_deref())
            .await;
        for reply in replies {
            let sent = match &reply {
                Reply::Text(text) => self.transport.send_text(message.chat_id, text).await,
                Reply::Document(document) => {
                    self.transport.send_document(message.chat_id, document).await
                }
            };
            if let Err(err) = sent {
                self.logger.warn(
                    "failed to deliver reply",
                    Some(&serde_json::json!({ "error": err.message, "code": err.code })),
                );
            }
        }
    }
}
