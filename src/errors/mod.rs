mod bot_error;

pub use bot_error::{BotError, BotErrorKind};
