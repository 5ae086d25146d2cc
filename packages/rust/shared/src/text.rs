//! Text helpers used when building slugs and summaries.

use scraper::Html;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Ellipsis marker appended to truncated text.
pub const ELLIPSIS: char = '…';

/// Normalize a title into a URL-safe slug fragment.
///
/// Lowercases, strips diacritics, drops anything that is not a letter,
/// digit, whitespace or hyphen, then joins words with single hyphens.
pub fn slugify(input: &str) -> String {
    let folded: String = input
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();

    folded
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Truncate `text` to at most `max` characters, ending with [`ELLIPSIS`] when cut.
pub fn limit_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push(ELLIPSIS);
    out
}

/// Strip markup from an HTML fragment and collapse whitespace.
pub fn strip_markup(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Today's Trend: 4K"), "todays-trend-4k");
        assert_eq!(slugify("  Weekly roundup 2026-10-18 "), "weekly-roundup-2026-10-18");
        assert_eq!(slugify("a -- b"), "a-b");
    }

    #[test]
    fn slugify_strips_diacritics() {
        assert_eq!(slugify("Café Crème Brûlée"), "cafe-creme-brulee");
        assert_eq!(slugify("Ørsted"), "ørsted");
    }

    #[test]
    fn slugify_keeps_non_latin_letters() {
        assert_eq!(slugify("本日 注目"), "本日-注目");
    }

    #[test]
    fn slugify_is_deterministic() {
        let title = "Popular tag report: Limited Time";
        assert_eq!(slugify(title), slugify(title));
    }

    #[test]
    fn limit_text_truncates_with_ellipsis() {
        assert_eq!(limit_text("short", 140), "short");
        let long = "x".repeat(200);
        let cut = limit_text(&long, 140);
        assert_eq!(cut.chars().count(), 140);
        assert!(cut.ends_with(ELLIPSIS));
    }

    #[test]
    fn limit_text_counts_chars_not_bytes() {
        let text = "日本語のテキスト";
        assert_eq!(limit_text(text, 8), text);
        assert_eq!(limit_text(text, 4), "日本語…");
    }

    #[test]
    fn strip_markup_removes_tags() {
        assert_eq!(
            strip_markup("<p>Hello <b>world</b></p>\n<p>again</p>"),
            "Hello world again"
        );
        assert_eq!(strip_markup("plain   text"), "plain text");
    }
}
