use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const QUESTIONS: &str = "quizQuestions";
pub const RESULTS: &str = "quizResults";
pub const USERS: &str = "users";

pub const VOTES_FIELD: &str = "approvalVotes";
pub const VOTERS_FIELD: &str = "votedUserIds";
pub const APPROVED_FIELD: &str = "isApproved";
pub const CREATED_FIELD: &str = "createdAt";
pub const POINTS_FIELD: &str = "points";

/// Distinct approving voters required before a question enters the quiz pool.
pub const APPROVAL_THRESHOLD: u32 = 3;

/// Points awarded per correct answer. No partial credit, no weighting.
pub const POINTS_PER_CORRECT: u32 = 10;

/// Question count for a quiz session when the caller does not say otherwise.
pub const DEFAULT_QUIZ_SIZE: usize = 10;

/// The eight genres quiz content is partitioned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Genre {
    Fantasy,
    Romance,
    Thriller,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Mystery,
    Historical,
    Contemporary,
    #[serde(rename = "Young Adult")]
    YoungAdult,
}

/// A community-submitted quiz question tied to a book.
///
/// Created unapproved, mutated only by voting, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub book_id: String,
    pub book_title: String,
    pub user_id: String,
    pub username: String,
    pub genre: Genre,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
    pub approval_votes: u32,
    pub is_approved: bool,
    pub voted_user_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one completed quiz session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub genre: Genre,
    pub score: u32,
    pub total_questions: u32,
    pub points_earned: u32,
    pub completed_at: DateTime<Utc>,
}
