use crate::constants::limits::{MAX_PORT, MIN_PORT};
use crate::errors::BotError;
use once_cell::sync::Lazy;
use regex::Regex;

const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_SPECIALS: &str = "!@#$%^&*()";

// Decimal digits only; superscripts and fractions do not count.
static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_port(
        &self,
        value: Option<&str>,
        fallback: u16,
        label: &str,
    ) -> Result<u16, BotError> {
        let Some(value) = value else {
            return Ok(fallback);
        };
        let numeric = value.trim().parse::<i64>().map_err(|_| {
            BotError::config(format!(
                "{} must be an integer between {} and {}",
                label, MIN_PORT, MAX_PORT
            ))
        })?;
        if numeric < MIN_PORT as i64 || numeric > MAX_PORT as i64 {
            return Err(BotError::config(format!(
                "{} must be an integer between {} and {}",
                label, MIN_PORT, MAX_PORT
            )));
        }
        Ok(numeric as u16)
    }

    pub fn ensure_positive(
        &self,
        value: Option<&str>,
        fallback: u64,
        label: &str,
    ) -> Result<u64, BotError> {
        let Some(value) = value else {
            return Ok(fallback);
        };
        match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(BotError::config(format!(
                "{} must be a positive integer",
                label
            ))),
        }
    }

    pub fn is_complex_password(&self, password: &str) -> bool {
        let body = password.strip_suffix('\n').unwrap_or(password);
        if body.contains('\n') || body.chars().count() < PASSWORD_MIN_CHARS {
            return false;
        }
        body.chars().any(|c| c.is_ascii_lowercase())
            && body.chars().any(|c| c.is_ascii_uppercase())
            && DIGIT_RE.is_match(body)
            && body.chars().any(|c| PASSWORD_SPECIALS.contains(c))
    }
}
