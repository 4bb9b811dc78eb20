//! Static table of EDGAR form-type groups and request expansion.
//!
//! Group names follow the long-standing `f_10k` convention; the variant lists
//! cover the small-business and transition-period flavors EDGAR has used over
//! the years, so a group keeps matching old quarters without the caller having
//! to know the history.

use std::collections::HashSet;

pub const FORM_GROUPS: &[(&str, &[&str])] = &[
    (
        "f_10k",
        &["10-K", "10-K405", "10KSB", "10-KSB", "10KSB40"],
    ),
    (
        "f_10ka",
        &["10-K/A", "10-K405/A", "10KSB/A", "10-KSB/A", "10KSB40/A"],
    ),
    ("f_10kt", &["10-KT", "10KT405", "10-KT/A", "10KT405/A"]),
    ("f_10q", &["10-Q", "10QSB", "10-QSB"]),
    ("f_10qa", &["10-Q/A", "10QSB/A", "10-QSB/A"]),
    ("f_10qt", &["10-QT", "10-QT/A"]),
    (
        "f_10x",
        &[
            "10-K", "10-K405", "10KSB", "10-KSB", "10KSB40", "10-K/A", "10-K405/A", "10KSB/A",
            "10-KSB/A", "10KSB40/A", "10-KT", "10KT405", "10-KT/A", "10KT405/A", "10-Q", "10QSB",
            "10-QSB", "10-Q/A", "10QSB/A", "10-QSB/A", "10-QT", "10-QT/A",
        ],
    ),
];

/// Shorthand names that all mean "every 10-K/10-Q variant".
const EVERYTHING_ALIASES: &[&str] = &["10k", "all", "everything"];

/// Resolve a group name (case-insensitive) to its member form types.
pub fn lookup_group(name: &str) -> Option<&'static [&'static str]> {
    let lowered = name.trim().to_ascii_lowercase();
    let key = if EVERYTHING_ALIASES.contains(&lowered.as_str()) {
        "f_10x"
    } else {
        lowered.as_str()
    };
    FORM_GROUPS
        .iter()
        .find(|(group, _)| *group == key)
        .map(|(_, members)| *members)
}

/// Expand group names into concrete form types and pass literals through.
///
/// Order follows first mention; duplicates are removed case-insensitively so
/// `f_10k,10-K` targets 10-K once.
pub fn expand_forms(requested: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut effective = Vec::new();
    for token in requested {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match lookup_group(token) {
            Some(members) => {
                for member in members {
                    push_unique(&mut effective, &mut seen, member);
                }
            }
            None => push_unique(&mut effective, &mut seen, token),
        }
    }
    effective
}

fn push_unique(effective: &mut Vec<String>, seen: &mut HashSet<String>, form: &str) {
    if seen.insert(form.to_ascii_lowercase()) {
        effective.push(form.to_string());
    }
}
