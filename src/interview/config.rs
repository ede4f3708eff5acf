//! Interview shape: per-category question counts and difficulty.
//!
//! An [`InterviewConfig`] is always normalized before a session uses it:
//! every count is clamped into the configured [`QuestionLimits`], and
//! non-positive counts fall back to the category default.  The derived
//! [`question_goal`] is the number of turns a session aims for, and
//! [`QuestionBucket::for_index`] maps a running question index to the
//! category the next question should come from.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Interview difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Lowercase name used in prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// One-sentence instruction that steers the interviewer's question level.
    pub fn guidance(&self) -> &'static str {
        match self {
            Difficulty::Easy => {
                "Ask beginner-friendly questions focusing on fundamentals and basic concepts."
            }
            Difficulty::Medium => {
                "Ask intermediate-level questions that require solid understanding and some problem-solving."
            }
            Difficulty::Hard => {
                "Ask challenging questions that require deep expertise, optimization thinking, and advanced concepts."
            }
        }
    }
}

// ---------------------------------------------------------------------------
// QuestionLimits
// ---------------------------------------------------------------------------

/// Closed range every per-category count is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionLimits {
    pub min_per_category: u32,
    pub max_per_category: u32,
}

impl Default for QuestionLimits {
    fn default() -> Self {
        Self {
            min_per_category: 1,
            max_per_category: 20,
        }
    }
}

impl QuestionLimits {
    /// Clamp `value` into `[min, max]`; `0` is replaced by `fallback` first.
    ///
    /// The fallback itself is clamped too, so the result always lies in the
    /// range even when the defaults do not.
    fn clamp_count(&self, value: u32, fallback: u32) -> u32 {
        let lo = self.min_per_category.min(self.max_per_category);
        let hi = self.max_per_category.max(lo);
        let raw = if value == 0 { fallback } else { value };
        raw.clamp(lo, hi)
    }
}

// ---------------------------------------------------------------------------
// InterviewConfig
// ---------------------------------------------------------------------------

/// User-chosen session shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewConfig {
    pub technical_count: u32,
    pub behavioral_count: u32,
    pub roles_count: u32,
    pub system_design_count: u32,
    pub difficulty: Difficulty,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            technical_count: 3,
            behavioral_count: 3,
            roles_count: 2,
            system_design_count: 1,
            difficulty: Difficulty::Medium,
        }
    }
}

impl InterviewConfig {
    /// Return a copy with every count inside `limits`.
    ///
    /// A zero count is treated as "unset" and replaced by the matching count
    /// from `defaults`.  Normalizing an already-normalized config is a no-op.
    ///
    /// ```
    /// use interview_voice::interview::{InterviewConfig, QuestionLimits};
    ///
    /// let limits = QuestionLimits::default();
    /// let raw = InterviewConfig { technical_count: 99, roles_count: 0, ..InterviewConfig::default() };
    /// let n = raw.normalized(&limits, &InterviewConfig::default());
    /// assert_eq!(n.technical_count, 20);
    /// assert_eq!(n.roles_count, 2);
    /// ```
    pub fn normalized(&self, limits: &QuestionLimits, defaults: &InterviewConfig) -> Self {
        Self {
            technical_count: limits.clamp_count(self.technical_count, defaults.technical_count),
            behavioral_count: limits.clamp_count(self.behavioral_count, defaults.behavioral_count),
            roles_count: limits.clamp_count(self.roles_count, defaults.roles_count),
            system_design_count: limits
                .clamp_count(self.system_design_count, defaults.system_design_count),
            difficulty: self.difficulty,
        }
    }

    /// Sum of the four category counts.
    pub fn total_questions(&self) -> u32 {
        self.technical_count + self.behavioral_count + self.roles_count + self.system_design_count
    }
}

/// Number of turns a session targets: the category total, but never fewer
/// than `minimum`.
pub fn question_goal(config: &InterviewConfig, minimum: u32) -> u32 {
    config.total_questions().max(minimum)
}

// ---------------------------------------------------------------------------
// QuestionBucket
// ---------------------------------------------------------------------------

/// The four ordered question categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionBucket {
    Technical,
    Behavioral,
    Roles,
    SystemDesign,
}

impl QuestionBucket {
    /// Prefix-sum lookup of the bucket for the question at `index` (0-based).
    ///
    /// Indices at or past the total land in [`QuestionBucket::SystemDesign`].
    ///
    /// ```
    /// use interview_voice::interview::{InterviewConfig, QuestionBucket};
    ///
    /// let cfg = InterviewConfig::default(); // 3 / 3 / 2 / 1
    /// assert_eq!(QuestionBucket::for_index(&cfg, 0), QuestionBucket::Technical);
    /// assert_eq!(QuestionBucket::for_index(&cfg, 3), QuestionBucket::Behavioral);
    /// assert_eq!(QuestionBucket::for_index(&cfg, 6), QuestionBucket::Roles);
    /// assert_eq!(QuestionBucket::for_index(&cfg, 9), QuestionBucket::SystemDesign);
    /// ```
    pub fn for_index(config: &InterviewConfig, index: u32) -> Self {
        let technical = config.technical_count;
        let behavioral = technical + config.behavioral_count;
        let roles = behavioral + config.roles_count;

        if index < technical {
            QuestionBucket::Technical
        } else if index < behavioral {
            QuestionBucket::Behavioral
        } else if index < roles {
            QuestionBucket::Roles
        } else {
            QuestionBucket::SystemDesign
        }
    }

    /// Prompt instruction for this category.
    pub fn guidance(&self) -> &'static str {
        match self {
            QuestionBucket::Technical => {
                "Ask a TECHNICAL question about coding, algorithms, or problem-solving skills."
            }
            QuestionBucket::Behavioral => {
                "Ask a BEHAVIORAL question using the STAR method (Situation, Task, Action, Result). Focus on soft skills, teamwork, and past experiences."
            }
            QuestionBucket::Roles => {
                "Ask a ROLE-SPECIFIC question directly related to the job posting requirements and the candidate's CV alignment."
            }
            QuestionBucket::SystemDesign => {
                "Ask a SYSTEM DESIGN question about architecture, scalability, or design patterns."
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(t: u32, b: u32, r: u32, s: u32) -> InterviewConfig {
        InterviewConfig {
            technical_count: t,
            behavioral_count: b,
            roles_count: r,
            system_design_count: s,
            difficulty: Difficulty::Hard,
        }
    }

    #[test]
    fn normalization_clamps_into_limits() {
        let limits = QuestionLimits::default();
        let n = cfg(0, 500, 1, 20).normalized(&limits, &InterviewConfig::default());
        assert_eq!(n.technical_count, 3); // zero → default
        assert_eq!(n.behavioral_count, 20);
        assert_eq!(n.roles_count, 1);
        assert_eq!(n.system_design_count, 20);
        assert_eq!(n.difficulty, Difficulty::Hard);
    }

    #[test]
    fn normalization_is_idempotent_over_many_inputs() {
        let limits = QuestionLimits {
            min_per_category: 2,
            max_per_category: 7,
        };
        // Defaults deliberately outside the limits.
        let defaults = cfg(0, 1, 30, 4);
        for t in [0, 1, 2, 5, 7, 8, 100] {
            for s in [0, 3, 9] {
                let once = cfg(t, s, 0, t).normalized(&limits, &defaults);
                let twice = once.normalized(&limits, &defaults);
                assert_eq!(once, twice);
                for count in [
                    once.technical_count,
                    once.behavioral_count,
                    once.roles_count,
                    once.system_design_count,
                ] {
                    assert!((2..=7).contains(&count), "count {count} out of range");
                }
            }
        }
    }

    #[test]
    fn goal_respects_minimum_floor() {
        assert_eq!(question_goal(&cfg(3, 3, 2, 1), 6), 9);
        assert_eq!(question_goal(&cfg(1, 1, 1, 1), 6), 6);
    }

    #[test]
    fn bucket_lookup_scenario() {
        let c = cfg(3, 3, 2, 1);
        assert_eq!(QuestionBucket::for_index(&c, 0), QuestionBucket::Technical);
        assert_eq!(QuestionBucket::for_index(&c, 2), QuestionBucket::Technical);
        assert_eq!(QuestionBucket::for_index(&c, 3), QuestionBucket::Behavioral);
        assert_eq!(QuestionBucket::for_index(&c, 6), QuestionBucket::Roles);
        assert_eq!(QuestionBucket::for_index(&c, 8), QuestionBucket::SystemDesign);
        assert_eq!(QuestionBucket::for_index(&c, 9), QuestionBucket::SystemDesign);
        assert_eq!(QuestionBucket::for_index(&c, 40), QuestionBucket::SystemDesign);
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        let json = serde_json::to_string(&Difficulty::Hard).unwrap();
        assert_eq!(json, "\"hard\"");
        let back: Difficulty = serde_json::from_str("\"easy\"").unwrap();
        assert_eq!(back, Difficulty::Easy);
    }
}
