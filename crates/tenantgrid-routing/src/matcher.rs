//! Listener condition matching.
//!
//! Header names and values compare case-insensitively. Path patterns use
//! load-balancer wildcards: `*` matches any run of characters, `?` exactly
//! one. Path matching is case-sensitive.

use regex::Regex;

/// Compile a wildcard path pattern into an anchored regex.
pub fn compile_path_pattern(pattern: &str) -> Regex {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).expect("escaped wildcard pattern")
}

/// Header value comparison used by listener rules.
pub fn header_matches(expected: &str, actual: Option<&str>) -> bool {
    actual.is_some_and(|v| v.eq_ignore_ascii_case(expected))
}
