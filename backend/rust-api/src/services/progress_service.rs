use crate::error::{CoreError, CoreResult};
use crate::metrics::{LESSONS_COMPLETED_TOTAL, PATHS_COMPLETED_TOTAL, STREAK_TRANSITIONS_TOTAL};
use crate::models::catalog::LearningPath;
use crate::models::progress::{
    LearningPathProgress, LessonProgress, PathStatus, StreakTransition, StudyStreak,
};
use crate::utils::time::{chrono_to_bson, Clock};
use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::ReplaceOptions;
use mongodb::Database;
use std::sync::Arc;

use super::catalog_service::CatalogService;
use super::goal_service::GoalService;

/// Per-lesson progress tracking plus the path-level aggregate it feeds.
pub struct ProgressService {
    mongo: Database,
    clock: Arc<dyn Clock>,
}

impl ProgressService {
    pub fn new(mongo: Database, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    /// Records learner activity on a lesson: clamps the reported
    /// percentage, accumulates the minutes delta and lazily creates the
    /// progress row. Path time is bumped with `$inc` so concurrent
    /// activity reports do not lose minutes.
    pub async fn record_activity(
        &self,
        user_id: &str,
        lesson_id: &str,
        percentage: i32,
        minutes_delta: i32,
    ) -> CoreResult<LessonProgress> {
        if minutes_delta < 0 {
            return Err(CoreError::validation("minutes must not be negative"));
        }

        let catalog = CatalogService::new(self.mongo.clone());
        let lesson = catalog.get_lesson(lesson_id).await?;
        let path = catalog.get_path(&lesson.path_id.to_hex()).await?;
        let now = self.clock.now();

        let mut row = self
            .ensure_lesson_progress(user_id, lesson_id, &path.id.to_hex())
            .await?;
        row.apply_activity(percentage, minutes_delta, now);
        self.save_lesson_progress(&row).await?;

        if minutes_delta > 0 {
            self.ensure_path_progress(user_id, &path.id.to_hex()).await?;
            let collection = self
                .mongo
                .collection::<LearningPathProgress>("learning_path_progress");
            collection
                .update_one(
                    doc! { "_id": LearningPathProgress::progress_id(user_id, &path.id.to_hex()) },
                    doc! {
                        "$inc": { "total_time_spent_minutes": minutes_delta },
                        "$set": { "updatedAt": chrono_to_bson(now) },
                    },
                )
                .await
                .context("Failed to accumulate path time")?;

            let goals = GoalService::new(self.mongo.clone(), self.clock.clone());
            goals.record_minutes(user_id, minutes_delta).await?;
        }

        tracing::debug!(
            user_id = %user_id,
            lesson_id = %lesson_id,
            percentage = row.progress_percentage,
            "Lesson activity recorded"
        );

        Ok(row)
    }

    /// Marks a lesson completed (terminal, idempotent) and synchronously
    /// recomputes the owning path's aggregate. Returns both updated rows.
    pub async fn mark_completed(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> CoreResult<(LessonProgress, LearningPathProgress)> {
        let catalog = CatalogService::new(self.mongo.clone());
        let lesson = catalog.get_lesson(lesson_id).await?;
        let path = catalog.get_path(&lesson.path_id.to_hex()).await?;
        let now = self.clock.now();

        let mut row = self
            .ensure_lesson_progress(user_id, lesson_id, &path.id.to_hex())
            .await?;
        let newly_completed = row.apply_completion(now);
        self.save_lesson_progress(&row).await?;

        let result = if newly_completed { "new" } else { "repeat" };
        LESSONS_COMPLETED_TOTAL.with_label_values(&[result]).inc();

        // Only a first completion counts toward the daily goal; replays
        // of a finished lesson do not.
        if newly_completed {
            let goals = GoalService::new(self.mongo.clone(), self.clock.clone());
            goals.record_lesson_completion(user_id).await?;
        }

        tracing::info!(
            user_id = %user_id,
            lesson_id = %lesson_id,
            newly_completed,
            "Lesson marked completed"
        );

        let aggregate = self.recompute_for_path(user_id, &path).await?;

        Ok((row, aggregate))
    }

    /// Recomputes the path aggregate from the lesson counts. Idempotent
    /// and callable on demand.
    pub async fn recompute_path(
        &self,
        user_id: &str,
        path_id: &str,
    ) -> CoreResult<LearningPathProgress> {
        let catalog = CatalogService::new(self.mongo.clone());
        let path = catalog.get_path(path_id).await?;
        self.recompute_for_path(user_id, &path).await
    }

    async fn recompute_for_path(
        &self,
        user_id: &str,
        path: &LearningPath,
    ) -> CoreResult<LearningPathProgress> {
        let path_id = path.id.to_hex();
        let now = self.clock.now();

        let total_published = self
            .mongo
            .collection::<mongodb::bson::Document>("lessons")
            .count_documents(doc! { "path_id": path.id, "is_published": true })
            .await
            .context("Failed to count published lessons")?;

        let completed = self
            .mongo
            .collection::<mongodb::bson::Document>("lesson_progress")
            .count_documents(doc! {
                "user_id": user_id,
                "path_id": &path_id,
                "status": "completed",
            })
            .await
            .context("Failed to count completed lessons")?;

        let mut aggregate = self.ensure_path_progress(user_id, &path_id).await?;
        let was_completed = aggregate.status == PathStatus::Completed;
        aggregate.apply_recompute(completed, total_published, now);
        self.save_path_progress(&aggregate).await?;

        if !was_completed && aggregate.status == PathStatus::Completed {
            PATHS_COMPLETED_TOTAL
                .with_label_values(&[path.age_group.as_str()])
                .inc();
            tracing::info!(user_id = %user_id, path_id = %path_id, "Learning path completed");
        }

        Ok(aggregate)
    }

    pub async fn get_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> CoreResult<LessonProgress> {
        let collection = self.mongo.collection::<LessonProgress>("lesson_progress");
        collection
            .find_one(doc! { "_id": LessonProgress::progress_id(user_id, lesson_id) })
            .await
            .context("Failed to query lesson progress")?
            .ok_or_else(|| CoreError::not_found("Lesson progress not found"))
    }

    pub async fn get_path_progress(
        &self,
        user_id: &str,
        path_id: &str,
    ) -> CoreResult<LearningPathProgress> {
        let collection = self
            .mongo
            .collection::<LearningPathProgress>("learning_path_progress");
        collection
            .find_one(doc! { "_id": LearningPathProgress::progress_id(user_id, path_id) })
            .await
            .context("Failed to query path progress")?
            .ok_or_else(|| CoreError::not_found("Path progress not found"))
    }

    pub async fn list_path_progress(&self, user_id: &str) -> CoreResult<Vec<LearningPathProgress>> {
        let collection = self
            .mongo
            .collection::<LearningPathProgress>("learning_path_progress");
        let cursor = collection
            .find(doc! { "user_id": user_id })
            .await
            .context("Failed to query path progress")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read path progress")?)
    }

    /// Current streak state; a zeroed row when the user has never studied.
    pub async fn get_streak(&self, user_id: &str) -> CoreResult<StudyStreak> {
        let collection = self.mongo.collection::<StudyStreak>("study_streaks");
        let existing = collection
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query streak")?;
        Ok(existing.unwrap_or_else(|| StudyStreak::new_for_user(user_id, self.clock.now())))
    }

    /// Advances the streak for activity today. A repeated call on the same
    /// day changes nothing and skips the write entirely.
    pub async fn record_streak_activity(
        &self,
        user_id: &str,
    ) -> CoreResult<(StudyStreak, StreakTransition)> {
        let mut streak = self.get_streak(user_id).await?;
        let transition = streak.apply_activity(self.clock.today(), self.clock.now());

        STREAK_TRANSITIONS_TOTAL
            .with_label_values(&[transition_label(transition)])
            .inc();

        if transition == StreakTransition::AlreadyCountedToday {
            return Ok((streak, transition));
        }

        let collection = self.mongo.collection::<StudyStreak>("study_streaks");
        collection
            .replace_one(doc! { "_id": user_id }, &streak)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to save streak")?;

        tracing::info!(
            user_id = %user_id,
            current = streak.current_streak,
            longest = streak.longest_streak,
            "Streak updated"
        );

        Ok((streak, transition))
    }

    pub async fn count_completed_lessons(&self, user_id: &str) -> CoreResult<u64> {
        Ok(self
            .mongo
            .collection::<mongodb::bson::Document>("lesson_progress")
            .count_documents(doc! { "user_id": user_id, "status": "completed" })
            .await
            .context("Failed to count completed lessons")?)
    }

    pub async fn count_paths_by_status(&self, user_id: &str, status: &str) -> CoreResult<u64> {
        Ok(self
            .mongo
            .collection::<mongodb::bson::Document>("learning_path_progress")
            .count_documents(doc! { "user_id": user_id, "status": status })
            .await
            .context("Failed to count path progress")?)
    }

    async fn ensure_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        path_id: &str,
    ) -> CoreResult<LessonProgress> {
        let collection = self.mongo.collection::<LessonProgress>("lesson_progress");
        let existing = collection
            .find_one(doc! { "_id": LessonProgress::progress_id(user_id, lesson_id) })
            .await
            .context("Failed to query lesson progress")?;
        Ok(existing
            .unwrap_or_else(|| LessonProgress::new_for(user_id, lesson_id, path_id, self.clock.now())))
    }

    async fn ensure_path_progress(
        &self,
        user_id: &str,
        path_id: &str,
    ) -> CoreResult<LearningPathProgress> {
        let collection = self
            .mongo
            .collection::<LearningPathProgress>("learning_path_progress");
        let id = LearningPathProgress::progress_id(user_id, path_id);
        let existing = collection
            .find_one(doc! { "_id": &id })
            .await
            .context("Failed to query path progress")?;
        if let Some(row) = existing {
            return Ok(row);
        }

        let row = LearningPathProgress::new_for(user_id, path_id, self.clock.now());
        collection
            .replace_one(doc! { "_id": &id }, &row)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to create path progress")?;
        Ok(row)
    }

    async fn save_lesson_progress(&self, row: &LessonProgress) -> CoreResult<()> {
        let collection = self.mongo.collection::<LessonProgress>("lesson_progress");
        collection
            .replace_one(doc! { "_id": &row.id }, row)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to save lesson progress")?;
        Ok(())
    }

    async fn save_path_progress(&self, row: &LearningPathProgress) -> CoreResult<()> {
        let collection = self
            .mongo
            .collection::<LearningPathProgress>("learning_path_progress");
        collection
            .replace_one(doc! { "_id": &row.id }, row)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to save path progress")?;
        Ok(())
    }
}

fn transition_label(transition: StreakTransition) -> &'static str {
    match transition {
        StreakTransition::Started => "started",
        StreakTransition::Extended => "extended",
        StreakTransition::Reset => "reset",
        StreakTransition::AlreadyCountedToday => "already_counted",
    }
}
