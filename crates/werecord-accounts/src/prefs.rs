use std::sync::LazyLock;

use regex::Regex;

/// `<string name="last_login_uin">VALUE</string>`
pub static LAST_LOGIN_UIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"last_login_uin">([^<\n]+)<"#).expect("valid regex"));

/// Any non-empty text node that does not span lines.
pub static KNOWN_UIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">([^<\n]+)<").expect("valid regex"));

/// `<string>VALUE</string>` entries of the account-switch history.
pub static SWITCH_HISTORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"string>([^<\n]+)<").expect("valid regex"));

/// First capture of `pattern` in `text`.
pub fn extract_first(text: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every capture of `pattern` in `text`, in document order.
pub fn extract_all(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
