use crate::constants::limits;
use crate::managers::replication_log::ReplicationLog;
use crate::managers::ssh::{CommandGateway, RemoteCommandResult};
use crate::services::commands::{self, Command, Input, IDLE_TEXT_HINT, UNKNOWN_COMMAND_HINT};
use crate::services::dialog::{self, entity_texts, DialogState, Effect, Next};
use crate::services::extraction::EntityKind;
use crate::services::logger::Logger;
use crate::stores::EntityStore;
use crate::utils::shell::escape_shell_value;
use crate::utils::temp_artifact::TempArtifact;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub const CANCELLED: &str = "Операция отменена.";
pub const NOTHING_TO_CANCEL: &str = "Нет активной операции для отмены.";
pub const EMPTY_OUTPUT: &str = "Команда не вернула данных.";
pub const REPL_LOG_EMPTY: &str = "Файл логов пуст.";

#[derive(Debug)]
pub enum Reply {
    Text(String),
    Document(TempArtifact),
}

impl Reply {
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Document(_) => None,
        }
    }
}

/// Per-chat dialog state. Idle when no dialog is in progress.
#[derive(Debug, Clone)]
pub struct Session {
    chat_id: i64,
    state: Option<DialogState>,
    scratch: HashMap<&'static str, Vec<String>>,
}

impl Session {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            state: None,
            scratch: HashMap::new(),
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn state(&self) -> Option<DialogState> {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_none()
    }

    pub fn scratch(&self, kind: EntityKind) -> Option<&[String]> {
        self.scratch.get(kind.scratch_key()).map(Vec::as_slice)
    }

    fn begin(&mut self, state: DialogState) {
        self.scratch.clear();
        self.state = Some(state);
    }

    fn reset(&mut self) {
        self.scratch.clear();
        self.state = None;
    }
}

pub struct ConversationEngine {
    logger: Logger,
    gateway: Arc<dyn CommandGateway>,
    store: Arc<dyn EntityStore>,
    repl_log: ReplicationLog,
}

impl ConversationEngine {
    pub fn new(
        logger: Logger,
        gateway: Arc<dyn CommandGateway>,
        store: Arc<dyn EntityStore>,
        repl_log: ReplicationLog,
    ) -> Self {
        Self {
            logger: logger.child("conversation"),
            gateway,
            store,
            repl_log,
        }
    }

    pub async fn handle(
        &self,
        session: &mut Session,
        text: &str,
        user_name: Option<&str>,
    ) -> Vec<Reply> {
        match commands::parse(text) {
            Input::Command(command) => self.handle_command(session, command, user_name).await,
            Input::Text(body) => match session.state {
                Some(state) => self.advance(session, state, body).await,
                None => vec![Reply::Text(IDLE_TEXT_HINT.to_string())],
            },
        }
    }

    async fn handle_command(
        &self,
        session: &mut Session,
        command: Command,
        user_name: Option<&str>,
    ) -> Vec<Reply> {
        self.logger.info(
            "command received",
            Some(&serde_json::json!({
                "chat_id": session.chat_id,
                "command": format!("{:?}", command),
            })),
        );
        let reply = match command {
            Command::Start => Reply::Text(commands::help_text(user_name)),
            Command::Cancel => {
                if session.is_idle() {
                    Reply::Text(NOTHING_TO_CANCEL.to_string())
                } else {
                    session.reset();
                    Reply::Text(CANCELLED.to_string())
                }
            }
            Command::FindEmail => self.enter(session, DialogState::capture(EntityKind::Email)),
            Command::FindPhone => self.enter(session, DialogState::capture(EntityKind::Phone)),
            Command::VerifyPassword => self.enter(session, DialogState::Password),
            Command::AptList => self.enter(session, DialogState::packages()),
            Command::Diagnostic(diagnostic) => {
                let result = self.gateway.run(diagnostic.remote_command).await;
                render_remote(result, &format!("{}.txt", diagnostic.name))
            }
            Command::ReplLogs => self.replication_logs().await,
            Command::ListStored(kind) => self.list_stored(kind).await,
            Command::Unknown(_) => Reply::Text(UNKNOWN_COMMAND_HINT.to_string()),
        };
        vec![reply]
    }

    fn enter(&self, session: &mut Session, state: DialogState) -> Reply {
        if let Some(previous) = session.state {
            self.logger.debug(
                "dialog restarted",
                Some(&serde_json::json!({
                    "chat_id": session.chat_id,
                    "previous": format!("{:?}", previous),
                })),
            );
        }
        session.begin(state);
        Reply::Text(state.entry_prompt().to_string())
    }

    async fn advance(&self, session: &mut Session, state: DialogState, text: &str) -> Vec<Reply> {
        let (next, effect) = dialog::transition(&state, text);
        let terminal = next == Next::Terminal;
        if let Next::Stay(following) = next {
            session.state = Some(following);
        }
        let replies = self.apply(session, effect).await;
        if terminal {
            session.reset();
        }
        replies
    }

    async fn apply(&self, session: &mut Session, effect: Effect) -> Vec<Reply> {
        let reply = match effect {
            Effect::Reply(text) => Reply::Text(text),
            Effect::Present(kind, found) => {
                let replies = present(kind, &found);
                session
                    .scratch
                    .insert(kind.scratch_key(), found.into_iter().collect());
                return replies;
            }
            Effect::Persist(kind) => {
                let values = session
                    .scratch
                    .remove(kind.scratch_key())
                    .unwrap_or_default();
                match self.store.save_all(kind, &values).await {
                    Ok(()) => Reply::Text(entity_texts(kind).saved.to_string()),
                    Err(err) => {
                        self.logger.error(
                            "failed to persist entities",
                            Some(&serde_json::json!({
                                "chat_id": session.chat_id,
                                "kind": kind.to_string(),
                                "error": err.message,
                            })),
                        );
                        Reply::Text(format!("Ошибка при сохранении в базу данных: {}", err))
                    }
                }
            }
            Effect::Discard(kind) => Reply::Text(entity_texts(kind).not_saved.to_string()),
            Effect::ListAllPackages => {
                let result = self.gateway.run("dpkg -l").await;
                render_remote(result, "apt_list.txt")
            }
            Effect::SearchPackages(name) => {
                let command = format!("dpkg -l | grep -i {}", escape_shell_value(&name));
                match self.gateway.run(&command).await {
                    RemoteCommandResult::Output(output) if output.is_empty() => Reply::Text(
                        format!("Пакет {} не найден среди установленных.", name),
                    ),
                    other => render_remote(other, "apt_search.txt"),
                }
            }
        };
        vec![reply]
    }

    async fn replication_logs(&self) -> Reply {
        match self.repl_log.tail().await {
            Ok(lines) if lines.is_empty() => Reply::Text(REPL_LOG_EMPTY.to_string()),
            Ok(lines) => deliver(
                format!("Последние репликационные логи:\n{}", lines.join("\n")),
                "repl_logs.txt",
            ),
            Err(err) => Reply::Text(format!(
                "Ошибка при получении репликационных логов: {}",
                err
            )),
        }
    }

    async fn list_stored(&self, kind: EntityKind) -> Reply {
        let texts = entity_texts(kind);
        match self.store.load_all(kind).await {
            Ok(values) if values.is_empty() => Reply::Text(texts.list_empty.to_string()),
            Ok(values) => {
                let joined = values.join("\n");
                if joined.chars().count() > limits::STORED_LIST_LIMIT {
                    Reply::Text(texts.list_too_long.to_string())
                } else {
                    Reply::Text(format!("{}\n{}", texts.list_header, joined))
                }
            }
            Err(err) => {
                self.logger.error(
                    "failed to load entities",
                    Some(&serde_json::json!({ "kind": kind.to_string(), "error": err.message })),
                );
                Reply::Text(format!("{}: {}", texts.list_failed, err))
            }
        }
    }
}

fn render_remote(result: RemoteCommandResult, file_name: &str) -> Reply {
    match result {
        RemoteCommandResult::Output(output) if output.is_empty() => {
            Reply::Text(EMPTY_OUTPUT.to_string())
        }
        RemoteCommandResult::Output(output) => deliver(output, file_name),
        RemoteCommandResult::RemoteError(error) => {
            deliver(format!("Ошибка при выполнении команды: {}", error), file_name)
        }
        RemoteCommandResult::TransportError(reason) => {
            Reply::Text(format!("Не удалось выполнить команду по SSH: {}", reason))
        }
    }
}

// The yes/no question always arrives as a message, even when the listing is attached.
fn present(kind: EntityKind, found: &BTreeSet<String>) -> Vec<Reply> {
    let text = dialog::present_text(kind, found);
    if text.chars().count() < limits::MESSAGE_TEXT_LIMIT {
        return vec![Reply::Text(text)];
    }
    let file_name = format!("{}.txt", kind.scratch_key());
    vec![
        deliver(dialog::listing(found), &file_name),
        Reply::Text(dialog::present_attached_text(kind, found.len())),
    ]
}

// Texts at or above the message limit go out as an attached file instead.
fn deliver(text: String, file_name: &str) -> Reply {
    if text.chars().count() < limits::MESSAGE_TEXT_LIMIT {
        return Reply::Text(text);
    }
    match TempArtifact::write_text(file_name, &text) {
        Ok(artifact) => Reply::Document(artifact),
        Err(err) => Reply::Text(format!("Не удалось подготовить файл для отправки: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::{deliver, present, render_remote, Reply, EMPTY_OUTPUT};
    use crate::managers::ssh::RemoteCommandResult;
    use crate::services::extraction::EntityKind;
    use std::collections::BTreeSet;

    #[test]
    fn small_presentation_is_a_single_message() {
        let found: BTreeSet<String> = ["+7 999 123-45-67".to_string()].into_iter().collect();
        let replies = present(EntityKind::Phone, &found);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].text().expect("text").starts_with("Найдены следующие номера"));
    }

    #[test]
    fn short_text_stays_inline() {
        let reply = deliver("x".repeat(4095), "out.txt");
        assert_eq!(reply.text().map(str::len), Some(4095));
    }

    #[test]
    fn text_at_limit_becomes_document() {
        match deliver("я".repeat(4096), "out.txt") {
            Reply::Document(artifact) => {
                assert_eq!(artifact.file_name(), "out.txt");
                let content = std::fs::read_to_string(artifact.path()).expect("read artifact");
                assert_eq!(content.chars().count(), 4096);
            }
            other => panic!("expected document, got {:?}", other),
        }
    }

    #[test]
    fn remote_results_render_to_user_text() {
        let empty = render_remote(RemoteCommandResult::Output(String::new()), "a.txt");
        assert_eq!(empty.text(), Some(EMPTY_OUTPUT));
        let failed = render_remote(
            RemoteCommandResult::RemoteError("mpstat: command not found".to_string()),
            "a.txt",
        );
        assert_eq!(
            failed.text(),
            Some("Ошибка при выполнении команды: mpstat: command not found")
        );
        let unreachable = render_remote(
            RemoteCommandResult::TransportError("Connection refused".to_string()),
            "a.txt",
        );
        assert_eq!(
            unreachable.text(),
            Some("Не удалось выполнить команду по SSH: Connection refused")
        );
    }
}
