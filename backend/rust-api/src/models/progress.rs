use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::NotStarted => "not_started",
            LessonStatus::InProgress => "in_progress",
            LessonStatus::Completed => "completed",
            LessonStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    NotStarted,
    InProgress,
    Completed,
    Paused,
}

impl PathStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathStatus::NotStarted => "not_started",
            PathStatus::InProgress => "in_progress",
            PathStatus::Completed => "completed",
            PathStatus::Paused => "paused",
        }
    }
}

/// Per-lesson progress row, keyed "{user_id}:{lesson_id}"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub lesson_id: String,
    /// Owning path, denormalized so completion can recompute path
    /// progress without an extra lesson lookup
    pub path_id: String,
    pub status: LessonStatus,
    pub progress_percentage: i32,
    pub time_spent_minutes: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(
        rename = "startedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl LessonProgress {
    pub fn progress_id(user_id: &str, lesson_id: &str) -> String {
        format!("{}:{}", user_id, lesson_id)
    }

    pub fn new_for(user_id: &str, lesson_id: &str, path_id: &str, now: DateTime<Utc>) -> Self {
        LessonProgress {
            id: Self::progress_id(user_id, lesson_id),
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            path_id: path_id.to_string(),
            status: LessonStatus::NotStarted,
            progress_percentage: 0,
            time_spent_minutes: 0,
            score: None,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Records learner activity: clamps the reported percentage, adds the
    /// minutes delta and stamps started_at on the first transition out of
    /// not_started. Completed rows keep their terminal state but still
    /// accumulate review time.
    pub fn apply_activity(&mut self, percentage: i32, minutes_delta: i32, now: DateTime<Utc>) {
        self.time_spent_minutes += minutes_delta;
        if self.status == LessonStatus::NotStarted {
            self.status = LessonStatus::InProgress;
            if self.started_at.is_none() {
                self.started_at = Some(now);
            }
        }
        if self.status != LessonStatus::Completed {
            self.progress_percentage = percentage.clamp(0, 100);
        }
        self.updated_at = now;
    }

    /// Terminal, idempotent completion. Returns true only when the row
    /// newly transitioned, so callers can decide whether cascades fire.
    pub fn apply_completion(&mut self, now: DateTime<Utc>) -> bool {
        let newly_completed = self.completed_at.is_none();
        self.status = LessonStatus::Completed;
        self.progress_percentage = 100;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if newly_completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        newly_completed
    }
}

/// Integer completion ratio. Floor division, 0 when the path has no
/// published lessons.
pub fn completion_percentage(completed_lessons: u64, total_published: u64) -> i32 {
    if total_published == 0 {
        return 0;
    }
    ((completed_lessons * 100) / total_published) as i32
}

/// Path-level aggregate, keyed "{user_id}:{path_id}"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPathProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub path_id: String,
    pub status: PathStatus,
    pub progress_percentage: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_lesson_id: Option<String>,
    pub total_time_spent_minutes: i32,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(
        rename = "startedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "completedAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl LearningPathProgress {
    pub fn progress_id(user_id: &str, path_id: &str) -> String {
        format!("{}:{}", user_id, path_id)
    }

    pub fn new_for(user_id: &str, path_id: &str, now: DateTime<Utc>) -> Self {
        LearningPathProgress {
            id: Self::progress_id(user_id, path_id),
            user_id: user_id.to_string(),
            path_id: path_id.to_string(),
            status: PathStatus::NotStarted,
            progress_percentage: 0,
            current_lesson_id: None,
            total_time_spent_minutes: 0,
            is_favorite: false,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Recomputes the aggregate from the underlying lesson counts.
    /// Idempotent: the same counts always produce the same state, and
    /// started_at/completed_at are stamped once and never overwritten.
    pub fn apply_recompute(
        &mut self,
        completed_lessons: u64,
        total_published: u64,
        now: DateTime<Utc>,
    ) {
        self.progress_percentage = completion_percentage(completed_lessons, total_published);
        if self.progress_percentage == 100 {
            self.status = PathStatus::Completed;
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else if self.progress_percentage > 0 {
            self.status = PathStatus::InProgress;
            if self.started_at.is_none() {
                self.started_at = Some(now);
            }
        }
        self.updated_at = now;
    }

    pub fn add_time_spent(&mut self, minutes_delta: i32, now: DateTime<Utc>) {
        self.total_time_spent_minutes += minutes_delta;
        self.updated_at = now;
    }
}

/// Outcome of a streak update, used for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    Started,
    Extended,
    Reset,
    AlreadyCountedToday,
}

/// Consecutive-day study counter, one row per user (keyed by user id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyStreak {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_date: Option<NaiveDate>,
    pub total_study_days: i32,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl StudyStreak {
    pub fn new_for_user(user_id: &str, now: DateTime<Utc>) -> Self {
        StudyStreak {
            id: user_id.to_string(),
            user_id: user_id.to_string(),
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            total_study_days: 0,
            updated_at: now,
        }
    }

    /// Advances the streak for activity on `today`. A second call on the
    /// same day (or a date behind the recorded one) leaves every counter
    /// untouched, so redundant invocations cannot inflate
    /// total_study_days.
    pub fn apply_activity(&mut self, today: NaiveDate, now: DateTime<Utc>) -> StreakTransition {
        let transition = match self.last_activity_date {
            None => {
                self.current_streak = 1;
                StreakTransition::Started
            }
            Some(last) => {
                let gap = (today - last).num_days();
                if gap <= 0 {
                    return StreakTransition::AlreadyCountedToday;
                }
                if gap == 1 {
                    self.current_streak += 1;
                    StreakTransition::Extended
                } else {
                    self.current_streak = 1;
                    StreakTransition::Reset
                }
            }
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_activity_date = Some(today);
        self.total_study_days += 1;
        self.updated_at = now;
        transition
    }
}

pub const DAILY_GOAL_BONUS_POINTS: i32 = 50;

/// Per-day goal row, keyed "{user_id}:{date}" with the date in
/// YYYY-MM-DD form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyGoal {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub goal_minutes: i32,
    pub lessons_goal: i32,
    pub completed_minutes: i32,
    pub lessons_completed: i32,
    #[serde(default)]
    pub achieved: bool,
    #[serde(default)]
    pub bonus_points: i32,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl DailyGoal {
    pub fn goal_id(user_id: &str, date: NaiveDate) -> String {
        format!("{}:{}", user_id, date.format("%Y-%m-%d"))
    }

    pub fn new_for(
        user_id: &str,
        date: NaiveDate,
        goal_minutes: i32,
        lessons_goal: i32,
        now: DateTime<Utc>,
    ) -> Self {
        DailyGoal {
            id: Self::goal_id(user_id, date),
            user_id: user_id.to_string(),
            date,
            goal_minutes,
            lessons_goal,
            completed_minutes: 0,
            lessons_completed: 0,
            achieved: false,
            bonus_points: 0,
            updated_at: now,
        }
    }

    pub fn add_minutes(&mut self, minutes: i32, now: DateTime<Utc>) {
        self.completed_minutes += minutes;
        self.updated_at = now;
    }

    pub fn add_lesson(&mut self, now: DateTime<Utc>) {
        self.lessons_completed += 1;
        self.updated_at = now;
    }

    /// One-way achievement check. Returns true only on the transition;
    /// once achieved, repeated calls return false and the bonus is never
    /// granted twice.
    pub fn evaluate_achievement(&mut self, now: DateTime<Utc>) -> bool {
        if self.achieved {
            return false;
        }
        if self.completed_minutes >= self.goal_minutes
            && self.lessons_completed >= self.lessons_goal
        {
            self.achieved = true;
            self.bonus_points = DAILY_GOAL_BONUS_POINTS;
            self.updated_at = now;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn completion_percentage_uses_floor_division() {
        assert_eq!(completion_percentage(1, 4), 25);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 66);
        assert_eq!(completion_percentage(3, 3), 100);
    }

    #[test]
    fn completion_percentage_handles_empty_path() {
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(5, 0), 0);
    }

    #[test]
    fn activity_clamps_percentage_and_accumulates_minutes() {
        let mut row = LessonProgress::new_for("u1", "l1", "p1", ts());
        row.apply_activity(150, 10, ts());
        assert_eq!(row.progress_percentage, 100);
        assert_eq!(row.time_spent_minutes, 10);

        row.apply_activity(-20, 5, ts());
        assert_eq!(row.progress_percentage, 0);
        assert_eq!(row.time_spent_minutes, 15);
    }

    #[test]
    fn activity_stamps_started_at_once() {
        let first = ts();
        let later = first + chrono::Duration::hours(2);

        let mut row = LessonProgress::new_for("u1", "l1", "p1", first);
        assert!(row.started_at.is_none());

        row.apply_activity(10, 1, first);
        assert_eq!(row.status, LessonStatus::InProgress);
        assert_eq!(row.started_at, Some(first));

        row.apply_activity(20, 1, later);
        assert_eq!(row.started_at, Some(first));
    }

    #[test]
    fn completion_is_idempotent() {
        let first = ts();
        let later = first + chrono::Duration::days(1);

        let mut row = LessonProgress::new_for("u1", "l1", "p1", first);
        assert!(row.apply_completion(first));
        assert_eq!(row.status, LessonStatus::Completed);
        assert_eq!(row.progress_percentage, 100);
        assert_eq!(row.completed_at, Some(first));

        assert!(!row.apply_completion(later));
        assert_eq!(row.completed_at, Some(first));
    }

    #[test]
    fn completed_lesson_keeps_terminal_state_on_later_activity() {
        let mut row = LessonProgress::new_for("u1", "l1", "p1", ts());
        row.apply_completion(ts());
        row.apply_activity(40, 3, ts());
        assert_eq!(row.status, LessonStatus::Completed);
        assert_eq!(row.progress_percentage, 100);
        assert_eq!(row.time_spent_minutes, 3);
    }

    #[test]
    fn recompute_quarter_path_marks_in_progress() {
        let mut agg = LearningPathProgress::new_for("u1", "p1", ts());
        agg.apply_recompute(1, 4, ts());
        assert_eq!(agg.progress_percentage, 25);
        assert_eq!(agg.status, PathStatus::InProgress);
        assert_eq!(agg.started_at, Some(ts()));
        assert!(agg.completed_at.is_none());
    }

    #[test]
    fn recompute_full_path_marks_completed_once() {
        let first = ts();
        let later = first + chrono::Duration::days(2);

        let mut agg = LearningPathProgress::new_for("u1", "p1", first);
        agg.apply_recompute(4, 4, first);
        assert_eq!(agg.progress_percentage, 100);
        assert_eq!(agg.status, PathStatus::Completed);
        assert_eq!(agg.completed_at, Some(first));

        agg.apply_recompute(4, 4, later);
        assert_eq!(agg.completed_at, Some(first));
    }

    #[test]
    fn recompute_zero_counts_leaves_status_unchanged() {
        let mut agg = LearningPathProgress::new_for("u1", "p1", ts());
        agg.apply_recompute(0, 4, ts());
        assert_eq!(agg.progress_percentage, 0);
        assert_eq!(agg.status, PathStatus::NotStarted);
        assert!(agg.started_at.is_none());

        agg.status = PathStatus::Paused;
        agg.apply_recompute(0, 0, ts());
        assert_eq!(agg.status, PathStatus::Paused);
    }

    #[test]
    fn recompute_is_idempotent_for_same_counts() {
        let mut agg = LearningPathProgress::new_for("u1", "p1", ts());
        agg.apply_recompute(2, 4, ts());
        let snapshot = (agg.progress_percentage, agg.status, agg.started_at);
        agg.apply_recompute(2, 4, ts());
        assert_eq!(
            snapshot,
            (agg.progress_percentage, agg.status, agg.started_at)
        );
    }

    #[test]
    fn first_streak_activity_starts_at_one() {
        let mut streak = StudyStreak::new_for_user("u1", ts());
        let outcome = streak.apply_activity(day(2024, 1, 1), ts());
        assert_eq!(outcome, StreakTransition::Started);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 1);
        assert_eq!(streak.total_study_days, 1);
        assert_eq!(streak.last_activity_date, Some(day(2024, 1, 1)));
    }

    #[test]
    fn next_day_extends_streak() {
        let mut streak = StudyStreak::new_for_user("u1", ts());
        streak.apply_activity(day(2024, 1, 1), ts());
        let outcome = streak.apply_activity(day(2024, 1, 2), ts());
        assert_eq!(outcome, StreakTransition::Extended);
        assert_eq!(streak.current_streak, 2);
        assert_eq!(streak.longest_streak, 2);
        assert_eq!(streak.total_study_days, 2);
    }

    #[test]
    fn multi_day_gap_resets_current_but_not_longest() {
        let mut streak = StudyStreak::new_for_user("u1", ts());
        streak.apply_activity(day(2024, 1, 1), ts());
        streak.apply_activity(day(2024, 1, 2), ts());
        let outcome = streak.apply_activity(day(2024, 1, 5), ts());
        assert_eq!(outcome, StreakTransition::Reset);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 2);
        assert_eq!(streak.total_study_days, 3);
    }

    #[test]
    fn same_day_activity_is_a_no_op() {
        let mut streak = StudyStreak::new_for_user("u1", ts());
        streak.apply_activity(day(2024, 1, 1), ts());
        let outcome = streak.apply_activity(day(2024, 1, 1), ts());
        assert_eq!(outcome, StreakTransition::AlreadyCountedToday);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.total_study_days, 1);
        assert_eq!(streak.last_activity_date, Some(day(2024, 1, 1)));
    }

    #[test]
    fn longest_streak_never_decreases() {
        let mut streak = StudyStreak::new_for_user("u1", ts());
        for d in 1..=5 {
            streak.apply_activity(day(2024, 1, d), ts());
        }
        assert_eq!(streak.longest_streak, 5);
        streak.apply_activity(day(2024, 2, 1), ts());
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 5);
    }

    #[test]
    fn goal_achievement_fires_exactly_once() {
        let mut goal = DailyGoal::new_for("u1", day(2024, 1, 1), 15, 1, ts());
        goal.add_minutes(10, ts());
        assert!(!goal.evaluate_achievement(ts()));

        goal.add_minutes(5, ts());
        assert!(!goal.evaluate_achievement(ts()));

        goal.add_lesson(ts());
        assert!(goal.evaluate_achievement(ts()));
        assert!(goal.achieved);
        assert_eq!(goal.bonus_points, DAILY_GOAL_BONUS_POINTS);

        goal.add_minutes(30, ts());
        assert!(!goal.evaluate_achievement(ts()));
        assert_eq!(goal.bonus_points, DAILY_GOAL_BONUS_POINTS);
    }

    #[test]
    fn goal_requires_both_axes() {
        let mut goal = DailyGoal::new_for("u1", day(2024, 1, 1), 15, 2, ts());
        goal.add_minutes(20, ts());
        goal.add_lesson(ts());
        assert!(!goal.evaluate_achievement(ts()));
        goal.add_lesson(ts());
        assert!(goal.evaluate_achievement(ts()));
    }

    #[test]
    fn goal_id_embeds_iso_date() {
        assert_eq!(DailyGoal::goal_id("u1", day(2024, 3, 7)), "u1:2024-03-07");
    }
}
