use crate::error::{CoreError, CoreResult};
use crate::metrics::GOALS_ACHIEVED_TOTAL;
use crate::models::progress::DailyGoal;
use crate::utils::time::{chrono_to_bson, Clock};
use anyhow::Context;
use chrono::NaiveDate;
use mongodb::bson::doc;
use mongodb::Database;
use std::sync::Arc;

use super::account_service::AccountService;
use super::progress_service::ProgressService;

/// Daily study goal: per-day accumulator rows whose targets are copied
/// from the user's settings at creation, with a one-way achievement flag.
pub struct GoalService {
    mongo: Database,
    clock: Arc<dyn Clock>,
}

impl GoalService {
    pub fn new(mongo: Database, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    /// The goal row for (user, date), created with the user's current
    /// targets when absent. Target changes in settings only affect rows
    /// created afterwards.
    pub async fn ensure_goal(&self, user_id: &str, date: NaiveDate) -> CoreResult<DailyGoal> {
        let collection = self.mongo.collection::<DailyGoal>("daily_goals");
        let id = DailyGoal::goal_id(user_id, date);

        if let Some(existing) = collection
            .find_one(doc! { "_id": &id })
            .await
            .context("Failed to query daily goal")?
        {
            return Ok(existing);
        }

        let accounts = AccountService::new(self.mongo.clone(), self.clock.clone());
        let settings = accounts.ensure_settings(user_id).await?;
        let goal = DailyGoal::new_for(
            user_id,
            date,
            settings.daily_goal_minutes,
            settings.daily_lessons_goal,
            self.clock.now(),
        );

        match collection.insert_one(&goal).await {
            Ok(_) => Ok(goal),
            // A concurrent request created the row first; read theirs.
            Err(err) if crate::error::is_duplicate_key(&err) => collection
                .find_one(doc! { "_id": &id })
                .await
                .context("Failed to re-read daily goal")?
                .ok_or_else(|| CoreError::not_found("Daily goal not found")),
            Err(err) => Err(CoreError::from_mongo(err, "daily goal")),
        }
    }

    pub async fn get_goal(&self, user_id: &str, date: NaiveDate) -> CoreResult<DailyGoal> {
        self.ensure_goal(user_id, date).await
    }

    /// Adds study minutes to today's goal and re-evaluates achievement.
    pub async fn record_minutes(&self, user_id: &str, minutes: i32) -> CoreResult<DailyGoal> {
        if minutes < 0 {
            return Err(CoreError::validation("minutes must not be negative"));
        }
        let today = self.clock.today();
        self.ensure_goal(user_id, today).await?;

        let collection = self.mongo.collection::<DailyGoal>("daily_goals");
        collection
            .update_one(
                doc! { "_id": DailyGoal::goal_id(user_id, today) },
                doc! {
                    "$inc": { "completed_minutes": minutes },
                    "$set": { "updatedAt": chrono_to_bson(self.clock.now()) },
                },
            )
            .await
            .context("Failed to accumulate goal minutes")?;

        self.check_achievement(user_id).await?;
        self.ensure_goal(user_id, today).await
    }

    /// Counts one completed lesson toward today's goal and re-evaluates
    /// achievement.
    pub async fn record_lesson_completion(&self, user_id: &str) -> CoreResult<DailyGoal> {
        let today = self.clock.today();
        self.ensure_goal(user_id, today).await?;

        let collection = self.mongo.collection::<DailyGoal>("daily_goals");
        collection
            .update_one(
                doc! { "_id": DailyGoal::goal_id(user_id, today) },
                doc! {
                    "$inc": { "lessons_completed": 1 },
                    "$set": { "updatedAt": chrono_to_bson(self.clock.now()) },
                },
            )
            .await
            .context("Failed to accumulate goal lessons")?;

        self.check_achievement(user_id).await?;
        self.ensure_goal(user_id, today).await
    }

    /// Evaluates today's goal. On the transition into achieved the bonus
    /// is credited to the profile, the streak advances and true is
    /// returned; every other call returns false.
    pub async fn check_achievement(&self, user_id: &str) -> CoreResult<bool> {
        let today = self.clock.today();
        let mut goal = self.ensure_goal(user_id, today).await?;
        let now = self.clock.now();

        if !goal.evaluate_achievement(now) {
            return Ok(false);
        }

        // Guarded write: a concurrent evaluation that already flipped the
        // flag matches nothing, and the bonus is not granted twice.
        let collection = self.mongo.collection::<DailyGoal>("daily_goals");
        let update = collection
            .update_one(
                doc! { "_id": &goal.id, "achieved": false },
                doc! {
                    "$set": {
                        "achieved": true,
                        "bonus_points": goal.bonus_points,
                        "updatedAt": chrono_to_bson(now),
                    },
                },
            )
            .await
            .context("Failed to mark goal achieved")?;
        if update.modified_count == 0 {
            return Ok(false);
        }

        let accounts = AccountService::new(self.mongo.clone(), self.clock.clone());
        accounts
            .credit_points(user_id, i64::from(goal.bonus_points))
            .await?;

        let progress = ProgressService::new(self.mongo.clone(), self.clock.clone());
        progress.record_streak_activity(user_id).await?;

        GOALS_ACHIEVED_TOTAL.with_label_values(&["achieved"]).inc();
        tracing::info!(
            user_id = %user_id,
            date = %today,
            bonus = goal.bonus_points,
            "Daily goal achieved"
        );

        Ok(true)
    }
}
