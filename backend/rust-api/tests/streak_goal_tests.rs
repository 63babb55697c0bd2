//! Goal and streak interplay across days.
//!
//! The goal service records minutes and completions into the day's goal
//! row, and a goal achievement feeds the streak. These scenarios walk
//! that chain over multi-day schedules.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use mylightway_api::models::progress::{
    DailyGoal, StreakTransition, StudyStreak, DAILY_GOAL_BONUS_POINTS,
};

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 16, 30, 0).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// Runs one day of study against a fresh goal row and, when the goal is
// achieved, advances the streak the way the goal service does.
fn study_day(
    streak: &mut StudyStreak,
    date: NaiveDate,
    minutes: i32,
    lessons: i32,
) -> (DailyGoal, Option<StreakTransition>) {
    let mut goal = DailyGoal::new_for("child1", date, 15, 1, ts());
    goal.add_minutes(minutes, ts());
    for _ in 0..lessons {
        goal.add_lesson(ts());
    }
    let transition = if goal.evaluate_achievement(ts()) {
        Some(streak.apply_activity(date, ts()))
    } else {
        None
    };
    (goal, transition)
}

#[test]
fn a_week_of_achieved_goals_builds_a_seven_day_streak() {
    let mut streak = StudyStreak::new_for_user("child1", ts());

    for d in 1..=7 {
        let (goal, transition) = study_day(&mut streak, day(2024, 3, d), 20, 1);
        assert!(goal.achieved);
        assert_eq!(goal.bonus_points, DAILY_GOAL_BONUS_POINTS);
        let expected = if d == 1 {
            StreakTransition::Started
        } else {
            StreakTransition::Extended
        };
        assert_eq!(transition, Some(expected));
    }

    assert_eq!(streak.current_streak, 7);
    assert_eq!(streak.longest_streak, 7);
    assert_eq!(streak.total_study_days, 7);
}

#[test]
fn missed_goal_day_breaks_the_chain_on_the_next_achievement() {
    let mut streak = StudyStreak::new_for_user("child1", ts());

    study_day(&mut streak, day(2024, 3, 1), 20, 1);
    study_day(&mut streak, day(2024, 3, 2), 25, 2);
    assert_eq!(streak.current_streak, 2);

    // March 3rd: some study, but under the minutes goal. The streak row
    // is never touched for that day.
    let (goal, transition) = study_day(&mut streak, day(2024, 3, 3), 10, 1);
    assert!(!goal.achieved);
    assert_eq!(goal.bonus_points, 0);
    assert_eq!(transition, None);
    assert_eq!(streak.last_activity_date, Some(day(2024, 3, 2)));

    // March 4th: back on track, but the one-day hole resets the count.
    let (_, transition) = study_day(&mut streak, day(2024, 3, 4), 30, 1);
    assert_eq!(transition, Some(StreakTransition::Reset));
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.longest_streak, 2);
    assert_eq!(streak.total_study_days, 3);
}

#[test]
fn second_achievement_event_same_day_moves_nothing() {
    let mut streak = StudyStreak::new_for_user("child1", ts());
    let today = day(2024, 3, 4);

    let mut goal = DailyGoal::new_for("child1", today, 15, 1, ts());
    goal.add_minutes(15, ts());
    goal.add_lesson(ts());
    assert!(goal.evaluate_achievement(ts()));
    assert_eq!(streak.apply_activity(today, ts()), StreakTransition::Started);

    // More study after the goal is met: the goal row keeps counting but
    // pays no second bonus, and the streak refuses the duplicate day.
    goal.add_minutes(10, ts());
    goal.add_lesson(ts());
    assert!(!goal.evaluate_achievement(ts()));
    assert_eq!(goal.completed_minutes, 25);
    assert_eq!(goal.lessons_completed, 2);
    assert_eq!(goal.bonus_points, DAILY_GOAL_BONUS_POINTS);

    assert_eq!(
        streak.apply_activity(today, ts()),
        StreakTransition::AlreadyCountedToday
    );
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.total_study_days, 1);
}

#[test]
fn minutes_alone_never_achieve_a_lesson_goal() {
    let mut streak = StudyStreak::new_for_user("child1", ts());

    // A long reading session with no completed lesson leaves the goal
    // short of its second axis.
    let (goal, transition) = study_day(&mut streak, day(2024, 3, 4), 90, 0);
    assert!(!goal.achieved);
    assert_eq!(transition, None);
    assert_eq!(streak.current_streak, 0);
    assert!(streak.last_activity_date.is_none());
}

#[test]
fn goal_rows_are_keyed_per_user_and_day() {
    assert_eq!(
        DailyGoal::goal_id("child1", day(2024, 3, 4)),
        "child1:2024-03-04"
    );
    assert_ne!(
        DailyGoal::goal_id("child1", day(2024, 3, 4)),
        DailyGoal::goal_id("child2", day(2024, 3, 4))
    );
    assert_ne!(
        DailyGoal::goal_id("child1", day(2024, 3, 4)),
        DailyGoal::goal_id("child1", day(2024, 3, 5))
    );
}

#[test]
fn comeback_after_long_break_restarts_from_one() {
    let mut streak = StudyStreak::new_for_user("child1", ts());

    for d in 1..=10 {
        study_day(&mut streak, day(2024, 3, d), 20, 1);
    }
    assert_eq!(streak.current_streak, 10);

    // Three weeks off, then one good day.
    let (_, transition) = study_day(&mut streak, day(2024, 4, 1), 20, 1);
    assert_eq!(transition, Some(StreakTransition::Reset));
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.longest_streak, 10);
    assert_eq!(streak.total_study_days, 11);
}
