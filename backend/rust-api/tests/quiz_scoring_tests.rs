//! Quiz attempt lifecycle scenarios: numbering, answer keying, scoring
//! and the retake cap.

use chrono::{DateTime, Duration, TimeZone, Utc};

use mylightway_api::models::attempt::{QuestionAnswer, QuizAttempt};

const PASSING_SCORE: i32 = 70;
const MAX_ATTEMPTS: i32 = 3;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 11, 0, 0).unwrap()
}

fn answer(attempt: &QuizAttempt, question_id: &str, correct: bool) -> QuestionAnswer {
    QuestionAnswer {
        id: QuestionAnswer::answer_id(&attempt.id, question_id),
        attempt_id: attempt.id.clone(),
        question_id: question_id.to_string(),
        selected_option_id: if correct { "opt-right" } else { "opt-wrong" }.to_string(),
        is_correct: correct,
        answered_at: ts(),
    }
}

#[test]
fn full_attempt_answers_all_questions_and_passes() {
    let mut attempt = QuizAttempt::new_for("child1", "quiz1", 1, 5, ts());
    assert!(!attempt.is_completed());
    assert_eq!(attempt.id, "child1:quiz1:1");

    let verdicts = [true, true, false, true, true];
    let answers: Vec<QuestionAnswer> = verdicts
        .iter()
        .enumerate()
        .map(|(i, &ok)| answer(&attempt, &format!("q{}", i + 1), ok))
        .collect();

    // Completion recounts from the stored answers, as the service does.
    attempt.correct_answers = answers.iter().filter(|a| a.is_correct).count() as i32;
    attempt.calculate_score(PASSING_SCORE);
    attempt.completed_at = Some(ts() + Duration::minutes(6));

    assert_eq!(attempt.correct_answers, 4);
    assert_eq!(attempt.score, 80.0);
    assert!(attempt.passed);
    assert!(attempt.is_completed());
}

#[test]
fn resubmitted_answer_collides_instead_of_double_counting() {
    let attempt = QuizAttempt::new_for("child1", "quiz1", 1, 3, ts());

    // A second submission for the same question derives the same key, so
    // it is rejected by the unique _id rather than counted twice. Only
    // the first verdict stands.
    let first = answer(&attempt, "q1", false);
    let resubmission = answer(&attempt, "q1", true);
    assert_eq!(first.id, resubmission.id);
    assert_eq!(first.id, "child1:quiz1:1:q1");

    let stored = vec![first, answer(&attempt, "q2", true)];
    let mut attempt = attempt;
    attempt.correct_answers = stored.iter().filter(|a| a.is_correct).count() as i32;
    attempt.calculate_score(PASSING_SCORE);

    // 1 of 3 correct: the wrong first answer stands and q3 was never
    // answered.
    assert_eq!(attempt.correct_answers, 1);
    assert!((attempt.score - 33.333).abs() < 0.01);
    assert!(!attempt.passed);
}

#[test]
fn failed_attempt_then_passing_retake() {
    let mut first = QuizAttempt::new_for("child1", "quiz1", 1, 4, ts());
    first.correct_answers = 2;
    first.calculate_score(PASSING_SCORE);
    first.completed_at = Some(ts());
    assert_eq!(first.score, 50.0);
    assert!(!first.passed);

    // The retake gets the next attempt number and its own answer keys.
    let retake_start = ts() + Duration::hours(1);
    let mut second = QuizAttempt::new_for("child1", "quiz1", 2, 4, retake_start);
    assert_eq!(second.id, "child1:quiz1:2");
    assert_ne!(
        QuestionAnswer::answer_id(&first.id, "q1"),
        QuestionAnswer::answer_id(&second.id, "q1")
    );

    second.correct_answers = 3;
    second.calculate_score(PASSING_SCORE);
    second.completed_at = Some(retake_start + Duration::minutes(5));
    assert_eq!(second.score, 75.0);
    assert!(second.passed);

    // The first attempt's record is untouched by the retake.
    assert_eq!(first.score, 50.0);
    assert!(!first.passed);
}

#[test]
fn attempts_remaining_counts_down_to_zero() {
    let mut remaining = Vec::new();
    for n in 1..=MAX_ATTEMPTS {
        let attempt = QuizAttempt::new_for("child1", "quiz1", n, 4, ts());
        remaining.push(MAX_ATTEMPTS - attempt.attempt_number);
    }
    assert_eq!(remaining, vec![2, 1, 0]);
}

#[test]
fn exact_threshold_passes_and_one_below_fails() {
    let mut at_threshold = QuizAttempt::new_for("child1", "quiz1", 1, 10, ts());
    at_threshold.correct_answers = 7;
    at_threshold.calculate_score(PASSING_SCORE);
    assert_eq!(at_threshold.score, 70.0);
    assert!(at_threshold.passed);

    let mut below = QuizAttempt::new_for("child1", "quiz1", 2, 10, ts());
    below.correct_answers = 6;
    below.calculate_score(PASSING_SCORE);
    assert!(!below.passed);
}

#[test]
fn completing_with_no_answers_scores_zero() {
    let mut attempt = QuizAttempt::new_for("child1", "quiz1", 1, 5, ts());
    attempt.calculate_score(PASSING_SCORE);
    attempt.completed_at = Some(ts());

    assert_eq!(attempt.score, 0.0);
    assert!(!attempt.passed);
    assert!(attempt.is_completed());
}

#[test]
fn attempts_by_different_users_never_collide() {
    let a = QuizAttempt::new_for("child1", "quiz1", 1, 5, ts());
    let b = QuizAttempt::new_for("child2", "quiz1", 1, 5, ts());
    assert_ne!(a.id, b.id);
    assert_ne!(
        QuestionAnswer::answer_id(&a.id, "q1"),
        QuestionAnswer::answer_id(&b.id, "q1")
    );
}
