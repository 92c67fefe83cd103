use regex::Regex;
use std::sync::LazyLock;

pub const MAX_ROUTINE_ITEMS: usize = 5;

// "1." / "12)" numbering or a single bullet glyph.
const ENUMERATION_MARKER_PATTERN: &str = r"^(?:\d+\s*[.)]|[-*•·])\s*";

static ENUMERATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ENUMERATION_MARKER_PATTERN).expect("enumeration marker regex must compile")
});

/// Best-effort decoder for a model reply that was asked for an enumerated list.
///
/// Never fails: prose still gets split into lines, and empty input yields an
/// empty vector. At most [`MAX_ROUTINE_ITEMS`] items are returned.
pub fn parse_routine(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(strip_enumeration_marker)
        .filter(|item| !item.is_empty())
        .take(MAX_ROUTINE_ITEMS)
        .collect()
}

fn strip_enumeration_marker(line: &str) -> String {
    ENUMERATION_MARKER.replace(line, "").trim().to_string()
}
