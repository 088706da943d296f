//! Group title to directory name.

use std::sync::LazyLock;

use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("static pattern compiles"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern compiles"));

/// Turns a group title into a directory name.
///
/// Characters other than word characters, whitespace and `-` are removed,
/// then every whitespace run becomes a single `-`. Applying it twice gives
/// the same result as applying it once.
///
/// # Example
///
/// ```
/// use tgexport::export::clean_title;
///
/// assert_eq!(clean_title("Team #1"), "Team-1");
/// assert_eq!(clean_title("Team  1"), "Team-1");
/// assert_eq!(clean_title("Rust: Беседка"), "Rust-Беседка");
/// ```
pub fn clean_title(title: &str) -> String {
    let stripped = NON_WORD.replace_all(title, "");
    WHITESPACE.replace_all(&stripped, "-").into_owned()
}

/// Directory name for a group; falls back to the id when nothing is left.
pub fn group_dir_name(id: i64, title: &str) -> String {
    let cleaned = clean_title(title);
    if cleaned.is_empty() {
        id.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_spaces_and_strips_symbols() {
        assert_eq!(clean_title("Team #1"), "Team-1");
        assert_eq!(clean_title("Team  1"), "Team-1");
        assert_eq!(clean_title("  a\tb\nc "), "-a-b-c-");
    }

    #[test]
    fn test_dashes_survive() {
        assert_eq!(clean_title("Team-1"), "Team-1");
        assert_eq!(clean_title("a - b"), "a---b");
    }

    #[test]
    fn test_unicode_word_characters_kept() {
        assert_eq!(clean_title("Чат №5"), "Чат-5");
        assert_eq!(clean_title("日本語 グループ"), "日本語-グループ");
    }

    #[test]
    fn test_empty_title_falls_back_to_id() {
        assert_eq!(group_dir_name(42, "!!!"), "42");
        assert_eq!(group_dir_name(42, "ok"), "ok");
    }
}
