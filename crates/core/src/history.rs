//! Submission history: a user's attempts and their error annotations.
//!
//! Read-only from the engine's perspective.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::corpus::{Difficulty, Exercise};

/// One error annotation attached to a failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Error family, e.g. "syntax", "runtime", "logic"
    pub error_type: String,

    #[serde(default)]
    pub error_message: String,

    pub timestamp: DateTime<Utc>,
}

/// Grading status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Accepted,
    WrongAnswer,
    RuntimeError,
    CompileError,
    TimeLimitExceeded,
    Pending,
}

impl SubmissionStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A single submission attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    /// The exercise that was attempted, if it still resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise: Option<Exercise>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub errors: Vec<ErrorEvent>,
    pub submitted_at: DateTime<Utc>,
}

/// Experience level derived from accepted submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    /// Classify by accepted count against two thresholds.
    pub fn classify(accepted: usize, intermediate_at: usize, advanced_at: usize) -> Self {
        if accepted < intermediate_at {
            Self::Beginner
        } else if accepted < advanced_at {
            Self::Intermediate
        } else {
            Self::Advanced
        }
    }

    /// Difficulty band suited to this level.
    pub fn target_band(&self) -> &'static [Difficulty] {
        match self {
            Self::Beginner => &[Difficulty::Easy],
            Self::Intermediate => &[Difficulty::Easy, Difficulty::Medium],
            Self::Advanced => &[Difficulty::Medium, Difficulty::Hard],
        }
    }

    /// Ordinal rank, used for closeness scoring.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Beginner => 0,
            Self::Intermediate => 1,
            Self::Advanced => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}
