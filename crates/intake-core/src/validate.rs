//! Field validators
//!
//! Pure predicates over raw user text. An invalid value is a normal outcome
//! (the session re-prompts), so every validator returns `bool`.

/// Minimum number of characters in a trimmed name
pub const MIN_NAME_LEN: usize = 2;

/// Minimum number of digits in a phone number
pub const MIN_PHONE_DIGITS: usize = 10;

/// Name: at least two characters after trimming; letters, space, `-`, `'`, `.` only.
pub fn is_valid_name(text: &str) -> bool {
    let name = text.trim();
    name.chars().count() >= MIN_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
}

/// Phone: digits, space, `+`, `-`, `(`, `)` throughout, with at least ten digits.
pub fn is_valid_phone(text: &str) -> bool {
    let allowed = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = text.chars().filter(char::is_ascii_digit).count();

    allowed && digits >= MIN_PHONE_DIGITS
}

/// Email: `local@domain.tld` with exactly one `@`, a dot inside the domain
/// part and no whitespace anywhere.
pub fn is_valid_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // a dot with at least one character on either side
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Free-text fields (course, country, university): anything non-blank.
pub fn is_non_empty(text: &str) -> bool {
    !text.trim().is_empty()
}
