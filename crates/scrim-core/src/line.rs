//! Script output lines: display directives, columns, and matching.

/// Control-sequence prefix scripts use to attach display metadata to a
/// line. The body is an option name terminated by BEL.
const DIRECTIVE_PREFIX: &str = "\x1b]6366;";
const DIRECTIVE_TERMINATOR: char = '\x07';

/// Display metadata carried by leading line directives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStyle {
    pub highlight: bool,
}

/// Strip leading directives from a raw line, returning the visible text
/// and the style they encode. An unterminated directive is left in
/// place.
#[must_use]
pub fn strip_directives(raw: &str) -> (&str, LineStyle) {
    let mut text = raw;
    let mut style = LineStyle::default();

    while let Some(rest) = text.strip_prefix(DIRECTIVE_PREFIX) {
        let Some(end) = rest.find(DIRECTIVE_TERMINATOR) else {
            break;
        };
        match &rest[..end] {
            "highlight" => style.highlight = true,
            option => tracing::debug!(option, "ignoring unknown line directive"),
        }
        text = &rest[end + DIRECTIVE_TERMINATOR.len_utf8()..];
    }

    (text, style)
}

/// Whether a line matches the query. Matching is case-insensitive and
/// operates on directive-stripped text, before any column filtering.
#[must_use]
pub fn line_matches(raw: &str, query: &str) -> bool {
    let (text, _) = strip_directives(raw);
    text.to_lowercase().contains(&query.to_lowercase())
}

/// The cell text rendered for a directive-stripped line. With a
/// 1-indexed column subset only those tab-separated columns are kept,
/// space-joined; out-of-range indices are skipped. Without a subset,
/// tabs become spaces.
#[must_use]
pub fn display_text(text: &str, columns: &[usize]) -> String {
    if columns.is_empty() {
        return text.replace('\t', " ");
    }

    let cells: Vec<&str> = text.split('\t').collect();
    let mut picked = Vec::with_capacity(columns.len());
    for &column in columns {
        if let Some(cell) = column.checked_sub(1).and_then(|i| cells.get(i)) {
            picked.push(*cell);
        }
    }
    picked.join(" ")
}
