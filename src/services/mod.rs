pub mod commands;
pub mod config;
pub mod conversation;
pub mod dialog;
pub mod dispatcher;
pub mod extraction;
pub mod logger;
pub mod telegram;
pub mod validation;
