use crate::services::extraction::{extract, EntityKind};
use crate::services::validation::Validation;
use std::collections::BTreeSet;

const AFFIRMATIVE: &[&str] = &["да", "д", "yes", "y"];

pub const CONFIRM_QUESTION: &str = "Хотите сохранить их в базу данных? (да/нет)";
pub const PASSWORD_PROMPT: &str = "Пожалуйста, отправьте пароль для проверки его сложности.";
pub const PASSWORD_COMPLEX: &str = "Пароль сложный";
pub const PASSWORD_SIMPLE: &str = "Пароль простой";
pub const PACKAGE_MENU: &str = "Выберите опцию:\n\
1. Вывести список всех установленных пакетов\n\
2. Поиск информации о пакете\n\
Введите 1 или 2. Для отмены введите /cancel.";
pub const PACKAGE_REPROMPT: &str = "Пожалуйста, введите 1 или 2. Для отмены введите /cancel.";
pub const PACKAGE_NAME_PROMPT: &str = "Введите название пакета для поиска:";

pub struct EntityTexts {
    pub prompt: &'static str,
    pub none_found: &'static str,
    pub found_header: &'static str,
    pub saved: &'static str,
    pub not_saved: &'static str,
    pub list_header: &'static str,
    pub list_empty: &'static str,
    pub list_too_long: &'static str,
    pub list_failed: &'static str,
}

const EMAIL_TEXTS: EntityTexts = EntityTexts {
    prompt: "Пожалуйста, отправьте текст для поиска email-адресов.",
    none_found: "В предоставленном тексте не найдено email-адресов.",
    found_header: "Найдены следующие email-адреса:",
    saved: "Email-адреса успешно сохранены в базу данных.",
    not_saved: "Операция отменена. Email-адреса не были сохранены.",
    list_header: "Список email-адресов:",
    list_empty: "Таблица email-адресов пуста.",
    list_too_long: "Слишком много email-адресов для отправки в одном сообщении.",
    list_failed: "Ошибка при получении email-адресов",
};

const PHONE_TEXTS: EntityTexts = EntityTexts {
    prompt: "Пожалуйста, отправьте текст для поиска номеров телефонов.",
    none_found: "В предоставленном тексте не найдено номеров телефонов.",
    found_header: "Найдены следующие номера телефонов:",
    saved: "Номера телефонов успешно сохранены в базу данных.",
    not_saved: "Операция отменена. Номера телефонов не были сохранены.",
    list_header: "Список номеров телефонов:",
    list_empty: "Таблица номеров телефонов пуста.",
    list_too_long: "Слишком много номеров телефонов для отправки в одном сообщении.",
    list_failed: "Ошибка при получении номеров телефонов",
};

pub fn entity_texts(kind: EntityKind) -> &'static EntityTexts {
    match kind {
        EntityKind::Email => &EMAIL_TEXTS,
        EntityKind::Phone => &PHONE_TEXTS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    AwaitingText,
    AwaitingConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStep {
    AwaitingChoice,
    AwaitingPackageName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Capture { kind: EntityKind, step: CaptureStep },
    Password,
    Packages(PackageStep),
}

impl DialogState {
    pub fn capture(kind: EntityKind) -> Self {
        DialogState::Capture {
            kind,
            step: CaptureStep::AwaitingText,
        }
    }

    pub fn packages() -> Self {
        DialogState::Packages(PackageStep::AwaitingChoice)
    }

    /// Prompt sent when a dialog is entered in this state.
    pub fn entry_prompt(&self) -> &'static str {
        match self {
            DialogState::Capture { kind, .. } => entity_texts(*kind).prompt,
            DialogState::Password => PASSWORD_PROMPT,
            DialogState::Packages(_) => PACKAGE_MENU,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Stay(DialogState),
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply(String),
    Present(EntityKind, BTreeSet<String>),
    Persist(EntityKind),
    Discard(EntityKind),
    ListAllPackages,
    SearchPackages(String),
}

pub fn transition(state: &DialogState, text: &str) -> (Next, Effect) {
    match *state {
        DialogState::Capture {
            kind,
            step: CaptureStep::AwaitingText,
        } => {
            let found = extract(text, kind);
            if found.is_empty() {
                return (
                    Next::Terminal,
                    Effect::Reply(entity_texts(kind).none_found.to_string()),
                );
            }
            (
                Next::Stay(DialogState::Capture {
                    kind,
                    step: CaptureStep::AwaitingConfirmation,
                }),
                Effect::Present(kind, found),
            )
        }
        DialogState::Capture {
            kind,
            step: CaptureStep::AwaitingConfirmation,
        } => {
            if is_affirmative(text) {
                (Next::Terminal, Effect::Persist(kind))
            } else {
                (Next::Terminal, Effect::Discard(kind))
            }
        }
        DialogState::Password => {
            let reply = if Validation::new().is_complex_password(text) {
                PASSWORD_COMPLEX
            } else {
                PASSWORD_SIMPLE
            };
            (Next::Terminal, Effect::Reply(reply.to_string()))
        }
        DialogState::Packages(PackageStep::AwaitingChoice) => match text.trim() {
            "1" => (Next::Terminal, Effect::ListAllPackages),
            "2" => (
                Next::Stay(DialogState::Packages(PackageStep::AwaitingPackageName)),
                Effect::Reply(PACKAGE_NAME_PROMPT.to_string()),
            ),
            _ => (
                Next::Stay(*state),
                Effect::Reply(PACKAGE_REPROMPT.to_string()),
            ),
        },
        DialogState::Packages(PackageStep::AwaitingPackageName) => {
            let name = text.trim();
            if name.is_empty() {
                return (
                    Next::Stay(*state),
                    Effect::Reply(PACKAGE_NAME_PROMPT.to_string()),
                );
            }
            (Next::Terminal, Effect::SearchPackages(name.to_string()))
        }
    }
}

pub fn is_affirmative(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    AFFIRMATIVE.contains(&normalized.as_str())
}

pub fn present_text(kind: EntityKind, found: &BTreeSet<String>) -> String {
    format!(
        "{}\n{}\n\n{}",
        entity_texts(kind).found_header,
        listing(found),
        CONFIRM_QUESTION
    )
}

/// Short form used when the full listing goes out as an attachment.
pub fn present_attached_text(kind: EntityKind, count: usize) -> String {
    format!(
        "{} {} (список во вложении).\n\n{}",
        entity_texts(kind).found_header.trim_end_matches(':'),
        count,
        CONFIRM_QUESTION
    )
}

pub fn listing(found: &BTreeSet<String>) -> String {
    found.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
}
