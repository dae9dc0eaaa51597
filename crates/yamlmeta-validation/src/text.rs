//! Text helpers for typo suggestions and naming conventions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

fn is_separator(c: char) -> bool {
    c == '_' || c == '-'
}

fn indel_cost(c: char) -> usize {
    if is_separator(c) { 1 } else { 10 }
}

fn substitution_cost(a: char, b: char) -> usize {
    if a == b {
        0
    } else if is_separator(a) && is_separator(b) {
        1
    } else if a.to_lowercase().eq(b.to_lowercase()) {
        1
    } else if a.is_ascii_digit() && b.is_ascii_digit() {
        1
    } else {
        10
    }
}

/// Weighted Levenshtein distance.
///
/// Inserting or deleting `_`/`-` costs 1 and any other character 10.
/// Substitutions cost 1 between `_` and `-`, between the two cases of a
/// letter and between two digits, and 10 otherwise. Naming-convention
/// slips therefore score far below real misspellings.
///
/// ```
/// use yamlmeta_validation::text::edit_distance;
///
/// assert_eq!(edit_distance("code-fold", "code_fold"), 1);
/// assert_eq!(edit_distance("toc", "tic"), 10);
/// ```
pub fn edit_distance(w1: &str, w2: &str) -> usize {
    let a: Vec<char> = w1.chars().collect();
    let b: Vec<char> = w2.chars().collect();

    let mut prev: Vec<usize> = Vec::with_capacity(b.len() + 1);
    prev.push(0);
    for &c in &b {
        let last = prev[prev.len() - 1];
        prev.push(last + indel_cost(c));
    }

    let mut cur = vec![0; b.len() + 1];
    for &ca in &a {
        cur[0] = prev[0] + indel_cost(ca);
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = (prev[j] + substitution_cost(ca, cb))
                .min(prev[j + 1] + indel_cost(ca))
                .min(cur[j] + indel_cost(cb));
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Candidates tied for the smallest edit distance to `word`, if that
/// distance is within `threshold` (see [`crate::LocalizerConfig`]).
pub fn closest_matches<'a, I>(word: &str, candidates: I, threshold: f64) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Vec<&str> = Vec::new();
    let mut best_distance = usize::MAX;
    for candidate in candidates {
        let d = edit_distance(candidate, word);
        if d < best_distance {
            best_distance = d;
            best.clear();
            best.push(candidate);
        } else if d == best_distance {
            best.push(candidate);
        }
    }
    let limit = word.chars().count() as f64 * 10.0 * threshold;
    if best.is_empty() || best_distance as f64 > limit {
        return Vec::new();
    }
    best
}

/// `a`, `a or b`, `a, b, or c`.
pub(crate) fn join_alternatives(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} or {}", a, b),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

/// Naming convention of object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseConvention {
    #[serde(rename = "capitalizationCase")]
    CapitalizationCase,
    #[serde(rename = "underscore_case")]
    UnderscoreCase,
    #[serde(rename = "dash-case")]
    DashCase,
}

impl CaseConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseConvention::CapitalizationCase => "capitalizationCase",
            CaseConvention::UnderscoreCase => "underscore_case",
            CaseConvention::DashCase => "dash-case",
        }
    }

    /// Parse any accepted spelling, e.g. `camelCase`, `snake-case` or
    /// `kebab_case`.
    pub fn from_name(name: &str) -> Option<CaseConvention> {
        match name {
            "capitalizationCase" | "capitalization-case" | "capitalization_case" | "camelCase"
            | "camel-case" | "camel_case" => Some(CaseConvention::CapitalizationCase),
            "underscoreCase" | "underscore-case" | "underscore_case" | "snakeCase"
            | "snake-case" | "snake_case" => Some(CaseConvention::UnderscoreCase),
            "dashCase" | "dash-case" | "dash_case" | "kebabCase" | "kebab-case" | "kebab_case" => {
                Some(CaseConvention::DashCase)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CaseConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_interior(key: &str, c: char) -> bool {
    match key.find(c) {
        Some(i) => i != 0 && i != key.len() - 1,
        None => false,
    }
}

/// Guess the naming convention of a single key.
///
/// Any uppercase letter means `capitalizationCase`; otherwise an interior
/// `_` or `-` decides. Keys like `toc` carry no evidence.
pub fn detect_case_convention(key: &str) -> Option<CaseConvention> {
    if key.to_lowercase() != key {
        Some(CaseConvention::CapitalizationCase)
    } else if has_interior(key, '_') {
        Some(CaseConvention::UnderscoreCase)
    } else if has_interior(key, '-') {
        Some(CaseConvention::DashCase)
    } else {
        None
    }
}

static UPPER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z]+)").unwrap());
static UNDERSCORE_NEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(.)").unwrap());

pub fn to_underscore_case(key: &str) -> String {
    let marked = UPPER_RUN.replace_all(key, "-$1").replace('-', "_");
    marked
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

pub fn to_dash_case(key: &str) -> String {
    to_underscore_case(key).replace('_', "-")
}

pub fn to_capitalization_case(key: &str) -> String {
    UNDERSCORE_NEXT
        .replace_all(&to_underscore_case(key), |caps: &regex::Captures| {
            caps[1].to_uppercase()
        })
        .into_owned()
}

/// Result of sniffing the keys of an object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectedConventions {
    /// Conventions seen among the keys, in first-seen order.
    pub conventions: Vec<CaseConvention>,
    /// Spellings that are one convention away from a declared key and are
    /// not keys themselves.
    pub near_misses: Vec<String>,
}

/// Sniff `keys` for naming conventions and collect near-miss spellings.
///
/// Returns `None` when no key carries evidence of a convention.
pub fn detect_conventions<'a, I>(keys: I) -> Option<DetectedConventions>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let key_set: std::collections::HashSet<&str> = keys.clone().into_iter().collect();
    let mut detected = DetectedConventions::default();
    let add = |detected: &mut DetectedConventions, candidate: String| {
        if !key_set.contains(candidate.as_str()) && !detected.near_misses.contains(&candidate) {
            detected.near_misses.push(candidate);
        }
    };

    for key in keys {
        let Some(found) = detect_case_convention(key) else {
            continue;
        };
        if !detected.conventions.contains(&found) {
            detected.conventions.push(found);
        }
        match found {
            CaseConvention::CapitalizationCase => {
                add(&mut detected, to_underscore_case(key));
                add(&mut detected, to_dash_case(key));
            }
            CaseConvention::DashCase => {
                add(&mut detected, to_underscore_case(key));
                add(&mut detected, to_capitalization_case(key));
            }
            CaseConvention::UnderscoreCase => {
                add(&mut detected, to_dash_case(key));
                add(&mut detected, to_capitalization_case(key));
            }
        }
    }

    if detected.conventions.is_empty() {
        None
    } else {
        Some(detected)
    }
}
