//! Free-text parsing of a generated code review.
//!
//! The reviewer model answers in prose.  The score is the first `N/100`,
//! `N out of 100` or `N out 100` it mentions (75 when there is none);
//! issues and suggestions are the bullet lines under the matching headings.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Score reported when the review names none.
pub const DEFAULT_REVIEW_SCORE: u8 = 75;

/// Parsed review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeReview {
    /// Full generated text.
    pub review: String,
    /// 0..=100.
    pub score: u8,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

impl CodeReview {
    /// ```
    /// use interview_voice::llm::CodeReview;
    ///
    /// let review = CodeReview::parse("Overall: 88 out of 100.\n\nSuggestions:\n- add tests");
    /// assert_eq!(review.score, 88);
    /// assert_eq!(review.suggestions, vec!["add tests"]);
    /// ```
    pub fn parse(text: &str) -> Self {
        Self {
            review: text.to_string(),
            score: extract_score(text),
            issues: bullets_in_section(issues_pattern(), text),
            suggestions: bullets_in_section(suggestions_pattern(), text),
        }
    }
}

/// `None` when the pattern fails to compile; parsing then falls back to the
/// defaults.
fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            log::error!("review: invalid pattern {pattern:?}: {e}");
            None
        }
    })
    .as_ref()
}

fn score_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"([0-9]+)\s*(?:/|out of|out)\s*100")
}

fn issues_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &CELL,
        r"(?i)(?:issue|problem|bug|error)s?:?\s*\n?([\s\S]*?)(?:\n\n|suggestions?:|$)",
    )
}

fn suggestions_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&CELL, r"(?i)suggestions?:?\s*\n?([\s\S]*?)(?:\n\n|$)")
}

fn extract_score(text: &str) -> u8 {
    score_pattern()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        // ASCII digits only, so a failed parse is an overflow.
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .map(|n| n.min(100) as u8)
        .unwrap_or(DEFAULT_REVIEW_SCORE)
}

/// Lines starting with `-` or `•` in the first section `pattern` captures.
fn bullets_in_section(pattern: Option<&Regex>, text: &str) -> Vec<String> {
    let Some(section) = pattern
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
    else {
        return Vec::new();
    };
    section
        .as_str()
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-').or_else(|| line.strip_prefix('•')))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
