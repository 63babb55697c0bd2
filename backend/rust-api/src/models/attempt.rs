use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Quiz attempt row, keyed "{user_id}:{quiz_id}:{attempt_number}"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub attempt_number: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score: f64,
    pub passed: bool,
    #[serde(rename = "startedAt", with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizAttempt {
    pub fn attempt_id(user_id: &str, quiz_id: &str, attempt_number: i32) -> String {
        format!("{}:{}:{}", user_id, quiz_id, attempt_number)
    }

    pub fn new_for(
        user_id: &str,
        quiz_id: &str,
        attempt_number: i32,
        total_questions: i32,
        now: DateTime<Utc>,
    ) -> Self {
        QuizAttempt {
            id: Self::attempt_id(user_id, quiz_id, attempt_number),
            user_id: user_id.to_string(),
            quiz_id: quiz_id.to_string(),
            attempt_number,
            total_questions,
            correct_answers: 0,
            score: 0.0,
            passed: false,
            started_at: now,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Derives score and pass flag from the stored counters. Pure: no
    /// side effects beyond the two derived fields.
    pub fn calculate_score(&mut self, passing_score: i32) {
        if self.total_questions == 0 {
            self.score = 0.0;
            self.passed = false;
            return;
        }
        self.score = 100.0 * f64::from(self.correct_answers) / f64::from(self.total_questions);
        self.passed = self.score >= f64::from(passing_score);
    }
}

/// One selected answer per (attempt, question), keyed
/// "{attempt_id}:{question_id}"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    #[serde(rename = "_id")]
    pub id: String,
    pub attempt_id: String,
    pub question_id: String,
    pub selected_option_id: String,
    pub is_correct: bool,
    #[serde(rename = "answeredAt", with = "bson_datetime_as_chrono")]
    pub answered_at: DateTime<Utc>,
}

impl QuestionAnswer {
    pub fn answer_id(attempt_id: &str, question_id: &str) -> String {
        format!("{}:{}", attempt_id, question_id)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, message = "question_id is required"))]
    pub question_id: String,

    #[validate(length(min = 1, message = "option_id is required"))]
    pub option_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub is_correct: bool,
    pub answered_questions: i32,
    pub total_questions: i32,
}

#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub attempt_id: String,
    pub attempt_number: i32,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score: f64,
    pub passed: bool,
    pub attempts_remaining: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn seven_of_ten_passes_at_seventy() {
        let mut attempt = QuizAttempt::new_for("u1", "q1", 1, 10, ts());
        attempt.correct_answers = 7;
        attempt.calculate_score(70);
        assert_eq!(attempt.score, 70.0);
        assert!(attempt.passed);
    }

    #[test]
    fn six_of_ten_fails_at_seventy() {
        let mut attempt = QuizAttempt::new_for("u1", "q1", 1, 10, ts());
        attempt.correct_answers = 6;
        attempt.calculate_score(70);
        assert_eq!(attempt.score, 60.0);
        assert!(!attempt.passed);
    }

    #[test]
    fn empty_quiz_scores_zero_and_fails() {
        let mut attempt = QuizAttempt::new_for("u1", "q1", 1, 0, ts());
        attempt.calculate_score(70);
        assert_eq!(attempt.score, 0.0);
        assert!(!attempt.passed);
    }

    #[test]
    fn perfect_attempt_passes_any_threshold() {
        let mut attempt = QuizAttempt::new_for("u1", "q1", 2, 5, ts());
        attempt.correct_answers = 5;
        attempt.calculate_score(100);
        assert_eq!(attempt.score, 100.0);
        assert!(attempt.passed);
    }

    #[test]
    fn attempt_id_embeds_attempt_number() {
        assert_eq!(QuizAttempt::attempt_id("u1", "quiz9", 3), "u1:quiz9:3");
    }
}
