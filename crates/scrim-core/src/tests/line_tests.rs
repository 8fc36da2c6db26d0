//! Tests for line directives, columns, and matching

use crate::line::{LineStyle, display_text, line_matches, strip_directives};

#[test]
fn test_plain_line_passes_through() {
    let (text, style) = strip_directives("hello world");
    assert_eq!(text, "hello world");
    assert_eq!(style, LineStyle::default());
}

#[test]
fn test_highlight_directive_stripped_and_flagged() {
    let (text, style) = strip_directives("\x1b]6366;highlight\x07urgent item");
    assert_eq!(text, "urgent item");
    assert!(style.highlight);
}

#[test]
fn test_unknown_directive_stripped_without_effect() {
    let (text, style) = strip_directives("\x1b]6366;blink\x07calm item");
    assert_eq!(text, "calm item");
    assert!(!style.highlight);
}

#[test]
fn test_stacked_directives() {
    let (text, style) = strip_directives("\x1b]6366;blink\x07\x1b]6366;highlight\x07item");
    assert_eq!(text, "item");
    assert!(style.highlight);
}

#[test]
fn test_unterminated_directive_left_in_place() {
    let raw = "\x1b]6366;highlight no terminator";
    let (text, style) = strip_directives(raw);
    assert_eq!(text, raw);
    assert!(!style.highlight);
}

#[test]
fn test_match_ignores_directives_and_case() {
    let raw = "\x1b]6366;highlight\x07Hello\tWorld";
    assert!(line_matches(raw, "hello"));
    assert!(line_matches(raw, "WORLD"));
    assert!(!line_matches(raw, "6366"));
}

#[test]
fn test_match_empty_query_always_succeeds() {
    assert!(line_matches("anything", ""));
}

#[test]
fn test_directive_roundtrip_with_columns() {
    // End to end: strip, match on the full text, render a column
    // subset with the highlight preserved.
    let raw = "\x1b]6366;highlight\x07hello\tworld";
    let (text, style) = strip_directives(raw);

    assert!(line_matches(raw, "hello"));
    assert_eq!(display_text(text, &[2]), "world");
    assert!(style.highlight);
}

#[test]
fn test_display_text_without_columns_flattens_tabs() {
    assert_eq!(display_text("a\tb\tc", &[]), "a b c");
}

#[test]
fn test_display_text_column_subset() {
    assert_eq!(display_text("a\tb\tc", &[3, 1]), "c a");
}

#[test]
fn test_display_text_out_of_range_columns_skipped() {
    assert_eq!(display_text("a\tb", &[1, 5]), "a");
    assert_eq!(display_text("a\tb", &[9]), "");
}
