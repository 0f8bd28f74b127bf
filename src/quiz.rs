//! Quiz question lifecycle: submission, peer approval, session scoring.
//!
//! A question enters the pool unapproved. Each distinct user may endorse it
//! once; at three endorsements it becomes eligible for quizzes and stays
//! eligible. Completed sessions award ten points per correct answer to the
//! player's profile.

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        APPROVAL_THRESHOLD, APPROVED_FIELD, CREATED_FIELD, Genre, POINTS_FIELD, POINTS_PER_CORRECT,
        QUESTIONS, QuizQuestion, QuizResult, RESULTS, USERS, VOTERS_FIELD, VOTES_FIELD,
    },
    store::{DocumentStore, FieldUpdate, Fields, Order},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub book_id: String,
    pub book_title: String,
    pub user_id: String,
    pub username: String,
    pub genre: Genre,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u8,
}

/// One finished session: the question ids in the order they were shown and
/// the option index the player picked for each.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedQuiz {
    pub user_id: String,
    pub genre: Genre,
    pub question_ids: Vec<String>,
    pub answers: Vec<u8>,
}

#[derive(Clone)]
pub struct QuizService {
    store: Arc<dyn DocumentStore>,
}

impl QuizService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn submit_question(&self, new: NewQuestion) -> Result<QuizQuestion, AppError> {
        if new.options.len() != 2 {
            return Err(AppError::Validation(
                "exactly two answer options required".to_string(),
            ));
        }
        if new.options.iter().any(|option| option.trim().is_empty()) {
            return Err(AppError::Validation(
                "answer options must not be empty".to_string(),
            ));
        }
        if new.correct_answer > 1 {
            return Err(AppError::Validation(
                "correct answer index must be 0 or 1".to_string(),
            ));
        }

        let question = QuizQuestion {
            id: Uuid::new_v4().to_string(),
            book_id: new.book_id,
            book_title: new.book_title,
            user_id: new.user_id,
            username: new.username,
            genre: new.genre,
            question: new.question,
            options: new.options,
            correct_answer: new.correct_answer,
            approval_votes: 0,
            is_approved: false,
            voted_user_ids: Vec::new(),
            created_at: Utc::now(),
        };

        self.store
            .create(QUESTIONS, &question.id, encode(&question)?)
            .await?;

        Ok(question)
    }

    pub async fn vote_to_approve(
        &self,
        question_id: &str,
        voter_user_id: &str,
    ) -> Result<QuizQuestion, AppError> {
        let fields = self
            .store
            .get(QUESTIONS, question_id)
            .await?
            .ok_or(AppError::NotFound("question"))?;
        let question: QuizQuestion = decode(fields)?;

        if question.voted_user_ids.iter().any(|id| id == voter_user_id) {
            return Err(AppError::AlreadyVoted);
        }

        // Conditional write settles concurrent duplicates, not the read above.
        let added = self
            .store
            .add_to_set(QUESTIONS, question_id, VOTERS_FIELD, voter_user_id)
            .await?;
        if !added {
            return Err(AppError::AlreadyVoted);
        }

        self.store
            .update(QUESTIONS, question_id, &[(VOTES_FIELD, FieldUpdate::Increment(1))])
            .await?;

        let fields = self
            .store
            .get(QUESTIONS, question_id)
            .await?
            .ok_or(AppError::NotFound("question"))?;
        let mut question: QuizQuestion = decode(fields)?;

        // The flag is monotonic: votes only grow, so it never reverts.
        if question.approval_votes >= APPROVAL_THRESHOLD && !question.is_approved {
            self.store
                .update(
                    QUESTIONS,
                    question_id,
                    &[(APPROVED_FIELD, FieldUpdate::Set(Value::Bool(true)))],
                )
                .await?;
            question.is_approved = true;

            info!(
                "question {} approved after {} votes",
                question.id, question.approval_votes
            );
        }

        Ok(question)
    }

    pub async fn fetch_approved_questions(
        &self,
        genre: Genre,
        limit: usize,
    ) -> Result<Vec<QuizQuestion>, AppError> {
        let filters = [("genre", json!(genre)), (APPROVED_FIELD, Value::Bool(true))];
        let documents = self.store.query(QUESTIONS, &filters, None, Some(limit)).await?;

        let mut questions = documents
            .into_iter()
            .map(decode::<QuizQuestion>)
            .collect::<Result<Vec<_>, _>>()?;
        questions.shuffle(&mut rand::thread_rng());

        Ok(questions)
    }

    /// The review queue: questions still short of the threshold, newest
    /// submissions first.
    pub async fn fetch_pending_questions(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<QuizQuestion>, AppError> {
        let filters = [(APPROVED_FIELD, Value::Bool(false))];
        let documents = self
            .store
            .query(
                QUESTIONS,
                &filters,
                Some((CREATED_FIELD, Order::Descending)),
                limit,
            )
            .await?;

        documents
            .into_iter()
            .map(decode::<QuizQuestion>)
            .collect::<Result<Vec<_>, _>>()
    }

    pub async fn submit_quiz_result(&self, completed: CompletedQuiz) -> Result<QuizResult, AppError> {
        if completed.answers.len() != completed.question_ids.len() {
            return Err(AppError::Validation(
                "one answer per question required".to_string(),
            ));
        }

        // a session presents each question once
        let mut seen = HashSet::with_capacity(completed.question_ids.len());
        if !completed.question_ids.iter().all(|id| seen.insert(id)) {
            return Err(AppError::Validation(
                "questions in a session must be distinct".to_string(),
            ));
        }

        let total_questions = session_size(completed.question_ids.len())?;

        let mut score = 0u32;
        for (question_id, answer) in completed.question_ids.iter().zip(&completed.answers) {
            let fields = self
                .store
                .get(QUESTIONS, question_id)
                .await?
                .ok_or(AppError::NotFound("question"))?;
            let question: QuizQuestion = decode(fields)?;

            if *answer == question.correct_answer {
                score += 1;
            }
        }

        let points_earned = score * POINTS_PER_CORRECT;
        let result = QuizResult {
            id: Uuid::new_v4().to_string(),
            user_id: completed.user_id,
            quiz_id: Uuid::new_v4().to_string(),
            genre: completed.genre,
            score,
            total_questions,
            points_earned,
            completed_at: Utc::now(),
        };

        self.store.create(RESULTS, &result.id, encode(&result)?).await?;

        // Not transactional with the result write: if this fails, a result
        // exists without its point award.
        self.store
            .update(
                USERS,
                &result.user_id,
                &[(POINTS_FIELD, FieldUpdate::Increment(points_earned as i64))],
            )
            .await?;

        info!(
            "user {} scored {}/{} for {} points",
            result.user_id, result.score, result.total_questions, result.points_earned
        );

        Ok(result)
    }
}

fn session_size(count: usize) -> Result<u32, AppError> {
    u32::try_from(count)
        .map_err(|_| AppError::Validation("session has too many questions".to_string()))
}

fn encode<T: Serialize>(record: &T) -> Result<Fields, AppError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        _ => Err(AppError::Validation(
            "record did not serialize to a document".to_string(),
        )),
    }
}

fn decode<T: DeserializeOwned>(fields: Fields) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|error| AppError::Validation(format!("stored document has unexpected shape: {error}")))
}
