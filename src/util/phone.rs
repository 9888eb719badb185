//! Phone-number normalisation for instance registration.

use std::sync::OnceLock;

use regex::Regex;

static NON_DIGITS: OnceLock<Regex> = OnceLock::new();
static VALID_NUMBER: OnceLock<Regex> = OnceLock::new();

/// Strip formatting (`+`, spaces, dashes, parentheses) and validate the
/// result as an 8–15 digit international number.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let non_digits =
        NON_DIGITS.get_or_init(|| Regex::new(r"[\s+\-().]").expect("valid separator regex"));
    let valid = VALID_NUMBER.get_or_init(|| Regex::new(r"^\d{8,15}$").expect("valid number regex"));
    let digits = non_digits.replace_all(raw.trim(), "");
    valid.is_match(&digits).then(|| digits.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_common_formatting() {
        assert_eq!(
            normalize_phone_number("+51 987-654-321").as_deref(),
            Some("51987654321")
        );
        assert_eq!(
            normalize_phone_number("(51) 987.654.321").as_deref(),
            Some("51987654321")
        );
    }

    #[test]
    fn rejects_letters_and_wrong_lengths() {
        assert!(normalize_phone_number("51987abc321").is_none());
        assert!(normalize_phone_number("1234").is_none());
        assert!(normalize_phone_number("1234567890123456").is_none());
        assert!(normalize_phone_number("").is_none());
    }
}
