/// Longest prefix of `value` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::truncate_utf8_prefix;

    #[test]
    fn short_values_are_untouched() {
        assert_eq!(truncate_utf8_prefix("uname -a", 100), "uname -a");
    }

    #[test]
    fn cut_never_splits_cyrillic() {
        // Each Cyrillic letter is two bytes.
        assert_eq!(truncate_utf8_prefix("пакет", 3), "п");
        assert_eq!(truncate_utf8_prefix("пакет", 4), "па");
        assert_eq!(truncate_utf8_prefix("пакет", 0), "");
    }
}
