use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.\-]+@[\w.\-]+\.\w+").unwrap());

// Area code group may carry parentheses; the number itself is kept verbatim.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:\+7|8)[\s\-]?",
        r"(?:\(?\d{3}\)?|\d{3})",
        r"[\s\-]?\d{3}",
        r"[\s\-]?\d{2}",
        r"[\s\-]?\d{2}",
    ))
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Email,
    Phone,
}

impl EntityKind {
    pub fn scratch_key(self) -> &'static str {
        match self {
            EntityKind::Email => "emails",
            EntityKind::Phone => "phones",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Email => "emails",
            EntityKind::Phone => "phones",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            EntityKind::Email => "email",
            EntityKind::Phone => "phone_number",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            EntityKind::Email => &EMAIL_RE,
            EntityKind::Phone => &PHONE_RE,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Email => write!(f, "email"),
            EntityKind::Phone => write!(f, "phone"),
        }
    }
}

pub fn extract(text: &str, kind: EntityKind) -> BTreeSet<String> {
    kind.pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{extract, EntityKind};

    fn is_entity(value: &str, kind: EntityKind) -> bool {
        kind.pattern()
            .find(value)
            .map_or(false, |m| m.start() == 0 && m.end() == value.len())
    }

    #[test]
    fn emails_are_deduplicated() {
        let found = extract(
            "write to ops@example.com or ops@example.com, cc: team.lead@corp.example.org",
            EntityKind::Email,
        );
        let found: Vec<&str> = found.iter().map(String::as_str).collect();
        assert_eq!(found, vec!["ops@example.com", "team.lead@corp.example.org"]);
    }

    #[test]
    fn email_match_is_maximal() {
        let found = extract("<first-last.name@sub.domain.ru>", EntityKind::Email);
        assert!(found.contains("first-last.name@sub.domain.ru"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn text_without_entities_yields_empty_set() {
        assert!(extract("no contacts here @ all.", EntityKind::Email).is_empty());
        assert!(extract("call 12345", EntityKind::Phone).is_empty());
    }

    #[test]
    fn phone_formats_are_matched_verbatim() {
        let text = "+7 (912) 345-67-89, 89123456789, 8-912-345-67-89 and +7 912 345 67 89";
        let found = extract(text, EntityKind::Phone);
        assert!(found.contains("+7 (912) 345-67-89"));
        assert!(found.contains("89123456789"));
        assert!(found.contains("8-912-345-67-89"));
        assert!(found.contains("+7 912 345 67 89"));
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn extraction_is_idempotent_and_members_match_grammar() {
        let text = "a@b.com x a@b.com y c.d-e@f.g.h z broken@ and @nothing";
        let first = extract(text, EntityKind::Email);
        let second = extract(text, EntityKind::Email);
        assert_eq!(first, second);
        for email in &first {
            assert!(is_entity(email, EntityKind::Email), "{}", email);
        }
    }

    #[test]
    fn kinds_map_to_their_tables() {
        assert_eq!(EntityKind::Email.table(), "emails");
        assert_eq!(EntityKind::Phone.column(), "phone_number");
        assert_eq!(EntityKind::Phone.scratch_key(), "phones");
    }
}
