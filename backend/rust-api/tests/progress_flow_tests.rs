//! Learner journey scenarios across lesson rows and the path aggregate.
//!
//! These exercise the same transition sequences the progress service runs
//! against storage: activity reports, completions, and recomputes, in the
//! order a real client produces them.

use chrono::{DateTime, Duration, TimeZone, Utc};

use mylightway_api::models::progress::{
    completion_percentage, LearningPathProgress, LessonProgress, LessonStatus, PathStatus,
};

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

#[test]
fn four_lesson_path_from_first_activity_to_completion() {
    let start = ts();
    let mut lessons: Vec<LessonProgress> = (1..=4)
        .map(|n| LessonProgress::new_for("child1", &format!("lesson{}", n), "path1", start))
        .collect();
    let mut path = LearningPathProgress::new_for("child1", "path1", start);

    // Day 1: the learner works through lesson 1 in two sittings.
    lessons[0].apply_activity(40, 8, start);
    path.add_time_spent(8, start);
    lessons[0].apply_activity(90, 7, start);
    path.add_time_spent(7, start);
    assert_eq!(lessons[0].status, LessonStatus::InProgress);
    assert_eq!(lessons[0].time_spent_minutes, 15);
    assert_eq!(path.total_time_spent_minutes, 15);

    // Completing lesson 1 drives the first recompute.
    assert!(lessons[0].apply_completion(start));
    let completed = lessons.iter().filter(|l| l.completed_at.is_some()).count() as u64;
    path.apply_recompute(completed, 4, start);
    assert_eq!(path.progress_percentage, 25);
    assert_eq!(path.status, PathStatus::InProgress);
    assert_eq!(path.started_at, Some(start));

    // Days 2 through 4: one lesson per day.
    for (offset, idx) in [(1, 1), (2, 2), (3, 3)] {
        let when = start + Duration::days(offset);
        lessons[idx].apply_activity(100, 12, when);
        path.add_time_spent(12, when);
        assert!(lessons[idx].apply_completion(when));
        let completed = lessons.iter().filter(|l| l.completed_at.is_some()).count() as u64;
        path.apply_recompute(completed, 4, when);
    }

    assert_eq!(path.progress_percentage, 100);
    assert_eq!(path.status, PathStatus::Completed);
    assert_eq!(path.completed_at, Some(start + Duration::days(3)));
    // started_at still reflects the first completion, not the last.
    assert_eq!(path.started_at, Some(start));
    assert_eq!(path.total_time_spent_minutes, 15 + 3 * 12);
}

#[test]
fn replayed_completion_does_not_move_the_aggregate() {
    let start = ts();
    let later = start + Duration::days(5);

    let mut lesson = LessonProgress::new_for("child1", "lesson1", "path1", start);
    let mut path = LearningPathProgress::new_for("child1", "path1", start);

    assert!(lesson.apply_completion(start));
    path.apply_recompute(1, 2, start);
    let snapshot = (path.progress_percentage, path.status, path.started_at);

    // A duplicate completion request replays the whole sequence. The
    // lesson reports no new transition and the recompute sees the same
    // counts, so nothing moves.
    assert!(!lesson.apply_completion(later));
    path.apply_recompute(1, 2, later);
    assert_eq!(
        snapshot,
        (path.progress_percentage, path.status, path.started_at)
    );
    assert_eq!(lesson.completed_at, Some(start));
}

#[test]
fn review_after_path_completion_keeps_terminal_state() {
    let start = ts();
    let review = start + Duration::days(10);

    let mut lesson = LessonProgress::new_for("child1", "lesson1", "path1", start);
    let mut path = LearningPathProgress::new_for("child1", "path1", start);

    lesson.apply_completion(start);
    path.apply_recompute(1, 1, start);
    assert_eq!(path.status, PathStatus::Completed);

    // Re-reading a finished lesson still accumulates time but cannot pull
    // the percentage back down or reopen the path.
    lesson.apply_activity(30, 6, review);
    path.add_time_spent(6, review);
    path.apply_recompute(1, 1, review);

    assert_eq!(lesson.status, LessonStatus::Completed);
    assert_eq!(lesson.progress_percentage, 100);
    assert_eq!(lesson.time_spent_minutes, 6);
    assert_eq!(path.status, PathStatus::Completed);
    assert_eq!(path.completed_at, Some(start));
    assert_eq!(path.total_time_spent_minutes, 6);
}

#[test]
fn publishing_a_lesson_mid_path_lowers_the_percentage() {
    let start = ts();
    let mut path = LearningPathProgress::new_for("child1", "path1", start);

    path.apply_recompute(3, 3, start);
    assert_eq!(path.progress_percentage, 100);
    assert_eq!(path.status, PathStatus::Completed);

    // A fourth lesson is published afterwards. The percentage drops but
    // the completion stamp from the earlier full pass is preserved.
    path.apply_recompute(3, 4, start + Duration::days(1));
    assert_eq!(path.progress_percentage, 75);
    assert_eq!(path.status, PathStatus::InProgress);
    assert_eq!(path.completed_at, Some(start));
}

#[test]
fn direct_completion_without_prior_activity_stamps_both_dates() {
    let when = ts();
    let mut lesson = LessonProgress::new_for("child1", "lesson1", "path1", when);

    // Completing straight from not_started (no activity report first)
    // still records when the lesson was started.
    assert!(lesson.apply_completion(when));
    assert_eq!(lesson.started_at, Some(when));
    assert_eq!(lesson.completed_at, Some(when));
    assert_eq!(lesson.progress_percentage, 100);
}

#[test]
fn aggregate_percentage_tracks_floor_of_lesson_counts() {
    // Seven lessons completed one at a time; the aggregate never rounds up.
    let expected = [14, 28, 42, 57, 71, 85, 100];
    for (completed, want) in (1..=7).zip(expected) {
        assert_eq!(completion_percentage(completed, 7), want);
    }
}
