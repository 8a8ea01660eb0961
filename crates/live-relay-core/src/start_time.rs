//! Broadcast start time extraction from the monitor page.

use std::sync::LazyLock;

use regex::Regex;

static START_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2})\.(\d{2})\.(\d{2})\s+(\d{2}:\d{2}:\d{2})")
        .expect("broadcast start pattern is valid")
});

/// Find the first `YY.MM.DD HH:MM:SS` stamp in `html` and normalize it to
/// `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn extract_broadcast_start(html: &str) -> Option<String> {
    let caps = START_PATTERN.captures(html)?;
    Some(format!(
        "20{}-{}-{} {}",
        &caps[1], &caps[2], &caps[3], &caps[4]
    ))
}
