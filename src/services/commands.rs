use crate::services::extraction::EntityKind;

#[derive(Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub name: &'static str,
    pub description: &'static str,
    pub remote_command: &'static str,
}

pub const DIAGNOSTICS: &[Diagnostic] = &[
    Diagnostic {
        name: "get_release",
        description: "Информация о релизе",
        remote_command: "cat /etc/os-release",
    },
    Diagnostic {
        name: "get_uname",
        description: "Информация об архитектуре процессора, имени хоста системы и версии ядра",
        remote_command: "uname -a",
    },
    Diagnostic {
        name: "get_uptime",
        description: "Информация о времени работы",
        remote_command: "uptime -p",
    },
    Diagnostic {
        name: "get_df",
        description: "Информация о состоянии файловой системы",
        remote_command: "df -h",
    },
    Diagnostic {
        name: "get_free",
        description: "Информация о состоянии оперативной памяти",
        remote_command: "free -h",
    },
    Diagnostic {
        name: "get_mpstat",
        description: "Информация о производительности системы",
        remote_command: "mpstat -P ALL 1 1",
    },
    Diagnostic {
        name: "get_w",
        description: "Информация о работающих в данной системе пользователях",
        remote_command: "w",
    },
    Diagnostic {
        name: "get_auths",
        description: "Информация о последних 10 входах в систему",
        remote_command: "last -n 10",
    },
    Diagnostic {
        name: "get_critical",
        description: "Информация о последних 5 критических событиях",
        remote_command: "journalctl -p crit -n 5",
    },
    Diagnostic {
        name: "get_ps",
        description: "Информация о запущенных процессах",
        remote_command: "ps aux --sort=-%mem | head -n 10",
    },
    Diagnostic {
        name: "get_ss",
        description: "Информация об используемых портах",
        remote_command: "ss -tuln",
    },
    Diagnostic {
        name: "get_services",
        description: "Информация о запущенных сервисах",
        remote_command: "systemctl list-units --type=service --state=running",
    },
];

pub const UNKNOWN_COMMAND_HINT: &str =
    "Неизвестная команда. Введите /start, чтобы увидеть список доступных команд.";
pub const IDLE_TEXT_HINT: &str =
    "Сейчас нет активной операции. Введите /start, чтобы увидеть список доступных команд.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel,
    FindEmail,
    FindPhone,
    VerifyPassword,
    AptList,
    Diagnostic(&'static Diagnostic),
    ReplLogs,
    ListStored(EntityKind),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Command(Command),
    Text(&'a str),
}

pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Splits an inbound message into a command (with any `@botname` suffix and
/// trailing arguments dropped) or free text.
pub fn parse(text: &str) -> Input<'_> {
    let trimmed = text.trim_start();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Input::Text(text);
    };
    let token = rest.split_whitespace().next().unwrap_or("");
    let name = token.split('@').next().unwrap_or("").to_lowercase();
    Input::Command(resolve(&name))
}

fn resolve(name: &str) -> Command {
    match name {
        "start" => Command::Start,
        "cancel" => Command::Cancel,
        "find_email" | "find_email_address" => Command::FindEmail,
        "find_phone_number" | "find_phone_numbers" => Command::FindPhone,
        "verify_password" => Command::VerifyPassword,
        "get_apt_list" => Command::AptList,
        "get_repl_logs" => Command::ReplLogs,
        "get_emails" => Command::ListStored(EntityKind::Email),
        "get_phone_numbers" => Command::ListStored(EntityKind::Phone),
        other => match DIAGNOSTICS.iter().find(|d| d.name == other) {
            Some(diagnostic) => Command::Diagnostic(diagnostic),
            None => Command::Unknown(other.to_string()),
        },
    }
}

pub fn command_list() -> Vec<CommandInfo> {
    let mut list = vec![
        CommandInfo {
            name: "start",
            description: "Запуск Бота",
        },
        CommandInfo {
            name: "cancel",
            description: "Отмена",
        },
        CommandInfo {
            name: "find_phone_number",
            description: "Поиск телефонных номеров в тексте",
        },
        CommandInfo {
            name: "find_email",
            description: "Поиск Email адресов в тексте",
        },
        CommandInfo {
            name: "verify_password",
            description: "Проверка сложности пароля",
        },
    ];
    list.extend(DIAGNOSTICS.iter().map(|d| CommandInfo {
        name: d.name,
        description: d.description,
    }));
    list.extend([
        CommandInfo {
            name: "get_apt_list",
            description: "Информация об установленных пакетах",
        },
        CommandInfo {
            name: "get_repl_logs",
            description: "Вывод логов о репликации",
        },
        CommandInfo {
            name: "get_emails",
            description: "Вывод Email адресов из таблицы",
        },
        CommandInfo {
            name: "get_phone_numbers",
            description: "Вывод телефонных номеров из таблицы",
        },
    ]);
    list
}

pub fn help_text(user_name: Option<&str>) -> String {
    let greeting = match user_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Привет {}! Я готов помочь. Вот доступные команды:", name),
        None => "Привет! Я готов помочь. Вот доступные команды:".to_string(),
    };
    let lines: Vec<String> = command_list()
        .iter()
        .map(|c| format!("/{} - {}", c.name, c.description))
        .collect();
    format!("{}\n{}", greeting, lines.join("\n"))
}
