use crate::error::{CoreError, CoreResult};
use crate::metrics::QUIZ_ATTEMPTS_TOTAL;
use crate::models::attempt::{
    AttemptResult, QuestionAnswer, QuizAttempt, SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::utils::time::Clock;
use anyhow::Context;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::Database;
use std::sync::Arc;

use super::catalog_service::CatalogService;

/// Quiz attempt lifecycle: start under the attempt cap, record answers,
/// complete and score.
pub struct QuizService {
    mongo: Database,
    clock: Arc<dyn Clock>,
}

impl QuizService {
    pub fn new(mongo: Database, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    /// Starts a new attempt with the next attempt number. Rejected once
    /// the user has used up quiz.max_attempts.
    pub async fn start_attempt(&self, user_id: &str, quiz_id: &str) -> CoreResult<QuizAttempt> {
        let catalog = CatalogService::new(self.mongo.clone());
        let quiz = catalog.get_quiz(quiz_id).await?;
        let questions = catalog.list_questions(&quiz.id).await?;

        let attempts = self.mongo.collection::<QuizAttempt>("quiz_attempts");
        let used = attempts
            .count_documents(doc! { "user_id": user_id, "quiz_id": quiz_id })
            .await
            .context("Failed to count attempts")?;
        if used >= quiz.max_attempts as u64 {
            return Err(CoreError::validation(format!(
                "Attempt limit of {} reached for this quiz",
                quiz.max_attempts
            )));
        }

        let attempt = QuizAttempt::new_for(
            user_id,
            quiz_id,
            (used + 1) as i32,
            questions.len() as i32,
            self.clock.now(),
        );

        // The composite _id carries the attempt number, so two concurrent
        // starts collide instead of both getting the same slot.
        attempts
            .insert_one(&attempt)
            .await
            .map_err(|err| CoreError::from_mongo(err, "quiz attempt"))?;

        tracing::info!(
            user_id = %user_id,
            quiz_id = %quiz_id,
            attempt_number = attempt.attempt_number,
            "Quiz attempt started"
        );

        Ok(attempt)
    }

    /// Records one answer for (attempt, question). Answering the same
    /// question twice within an attempt is a uniqueness violation.
    pub async fn submit_answer(
        &self,
        user_id: &str,
        attempt_id: &str,
        req: &SubmitAnswerRequest,
    ) -> CoreResult<SubmitAnswerResponse> {
        let attempt = self.get_attempt(user_id, attempt_id).await?;
        if attempt.is_completed() {
            return Err(CoreError::validation("Attempt is already completed"));
        }

        let catalog = CatalogService::new(self.mongo.clone());
        let question = catalog.get_question(&req.question_id).await?;
        if question.quiz_id.to_hex() != attempt.quiz_id {
            return Err(CoreError::validation(
                "Question does not belong to this quiz",
            ));
        }
        if !question.options.iter().any(|opt| opt.id == req.option_id) {
            return Err(CoreError::validation("Unknown answer option"));
        }

        let is_correct = question.correct_option_id == req.option_id;
        let answer = QuestionAnswer {
            id: QuestionAnswer::answer_id(attempt_id, &req.question_id),
            attempt_id: attempt_id.to_string(),
            question_id: req.question_id.clone(),
            selected_option_id: req.option_id.clone(),
            is_correct,
            answered_at: self.clock.now(),
        };

        let answers = self.mongo.collection::<QuestionAnswer>("question_answers");
        answers
            .insert_one(&answer)
            .await
            .map_err(|err| CoreError::from_mongo(err, "answer"))?;

        if is_correct {
            let attempts = self.mongo.collection::<QuizAttempt>("quiz_attempts");
            attempts
                .update_one(
                    doc! { "_id": attempt_id },
                    doc! { "$inc": { "correct_answers": 1 } },
                )
                .await
                .context("Failed to record correct answer")?;
        }

        let answered = answers
            .count_documents(doc! { "attempt_id": attempt_id })
            .await
            .context("Failed to count answers")?;

        tracing::debug!(
            user_id = %user_id,
            attempt_id = %attempt_id,
            question_id = %req.question_id,
            is_correct,
            "Answer recorded"
        );

        Ok(SubmitAnswerResponse {
            is_correct,
            answered_questions: answered as i32,
            total_questions: attempt.total_questions,
        })
    }

    /// Scores and closes the attempt. Completing twice is rejected.
    pub async fn complete_attempt(
        &self,
        user_id: &str,
        attempt_id: &str,
    ) -> CoreResult<AttemptResult> {
        let mut attempt = self.get_attempt(user_id, attempt_id).await?;
        if attempt.is_completed() {
            return Err(CoreError::validation("Attempt is already completed"));
        }

        let catalog = CatalogService::new(self.mongo.clone());
        let quiz = catalog.get_quiz(&attempt.quiz_id).await?;

        let answers = self.mongo.collection::<QuestionAnswer>("question_answers");
        let correct = answers
            .count_documents(doc! { "attempt_id": attempt_id, "is_correct": true })
            .await
            .context("Failed to count correct answers")?;

        let now = self.clock.now();
        attempt.correct_answers = correct as i32;
        attempt.calculate_score(quiz.passing_score);
        attempt.completed_at = Some(now);

        let attempts = self.mongo.collection::<QuizAttempt>("quiz_attempts");
        attempts
            .replace_one(doc! { "_id": attempt_id }, &attempt)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to save attempt")?;

        let passed_label = if attempt.passed { "true" } else { "false" };
        QUIZ_ATTEMPTS_TOTAL.with_label_values(&[passed_label]).inc();

        let used = attempts
            .count_documents(doc! { "user_id": user_id, "quiz_id": &attempt.quiz_id })
            .await
            .context("Failed to count attempts")?;
        let attempts_remaining = (i64::from(quiz.max_attempts) - used as i64).max(0) as i32;

        tracing::info!(
            user_id = %user_id,
            attempt_id = %attempt_id,
            score = attempt.score,
            passed = attempt.passed,
            "Quiz attempt completed"
        );

        Ok(AttemptResult {
            attempt_id: attempt.id.clone(),
            attempt_number: attempt.attempt_number,
            total_questions: attempt.total_questions,
            correct_answers: attempt.correct_answers,
            score: attempt.score,
            passed: attempt.passed,
            attempts_remaining,
        })
    }

    pub async fn list_attempts(&self, user_id: &str, quiz_id: &str) -> CoreResult<Vec<QuizAttempt>> {
        use futures::TryStreamExt;
        use mongodb::options::FindOptions;

        let attempts = self.mongo.collection::<QuizAttempt>("quiz_attempts");
        let cursor = attempts
            .find(doc! { "user_id": user_id, "quiz_id": quiz_id })
            .with_options(
                FindOptions::builder()
                    .sort(doc! { "attempt_number": 1 })
                    .build(),
            )
            .await
            .context("Failed to query attempts")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read attempts")?)
    }

    async fn get_attempt(&self, user_id: &str, attempt_id: &str) -> CoreResult<QuizAttempt> {
        let attempts = self.mongo.collection::<QuizAttempt>("quiz_attempts");
        let attempt = attempts
            .find_one(doc! { "_id": attempt_id })
            .await
            .context("Failed to query attempt")?
            .ok_or_else(|| CoreError::not_found("Attempt not found"))?;
        // Another user's attempt id reads as absent, not as forbidden.
        if attempt.user_id != user_id {
            return Err(CoreError::not_found("Attempt not found"));
        }
        Ok(attempt)
    }
}
