use crate::error::CoreResult;
use crate::models::user::{UserRole, UserView};
use crate::utils::time::Clock;
use anyhow::Context;
use mongodb::bson::doc;
use mongodb::Database;
use serde::Serialize;
use std::sync::Arc;

use super::account_service::AccountService;
use super::catalog_service::CatalogService;
use super::goal_service::GoalService;
use super::progress_service::ProgressService;

#[derive(Debug, Serialize)]
pub struct GoalSnapshot {
    pub goal_minutes: i32,
    pub lessons_goal: i32,
    pub completed_minutes: i32,
    pub lessons_completed: i32,
    pub achieved: bool,
}

#[derive(Debug, Serialize)]
pub struct ChildDashboard {
    pub lessons_completed: u64,
    pub paths_in_progress: u64,
    pub paths_completed: u64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_study_days: i32,
    pub today_goal: GoalSnapshot,
    pub points_balance: i64,
    pub achievements_earned: u64,
}

#[derive(Debug, Serialize)]
pub struct ChildSummary {
    pub child: UserView,
    pub stats: ChildDashboard,
}

#[derive(Debug, Serialize)]
pub struct ParentDashboard {
    pub children_count: usize,
    pub children: Vec<ChildSummary>,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub published_paths: u64,
    pub published_lessons: u64,
    pub active_quizzes: u64,
    pub total_users: u64,
    pub children: u64,
    pub parents: u64,
}

/// Role-branched dashboard aggregation.
pub struct DashboardService {
    mongo: Database,
    clock: Arc<dyn Clock>,
}

impl DashboardService {
    pub fn new(mongo: Database, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    pub async fn child_stats(&self, user_id: &str) -> CoreResult<ChildDashboard> {
        let progress = ProgressService::new(self.mongo.clone(), self.clock.clone());
        let goals = GoalService::new(self.mongo.clone(), self.clock.clone());
        let accounts = AccountService::new(self.mongo.clone(), self.clock.clone());

        let lessons_completed = progress.count_completed_lessons(user_id).await?;
        let paths_in_progress = progress.count_paths_by_status(user_id, "in_progress").await?;
        let paths_completed = progress.count_paths_by_status(user_id, "completed").await?;
        let streak = progress.get_streak(user_id).await?;
        let goal = goals.get_goal(user_id, self.clock.today()).await?;
        let profile = accounts.ensure_profile(user_id).await?;
        let achievements_earned = accounts.count_user_achievements(user_id).await?;

        Ok(ChildDashboard {
            lessons_completed,
            paths_in_progress,
            paths_completed,
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            total_study_days: streak.total_study_days,
            today_goal: GoalSnapshot {
                goal_minutes: goal.goal_minutes,
                lessons_goal: goal.lessons_goal,
                completed_minutes: goal.completed_minutes,
                lessons_completed: goal.lessons_completed,
                achieved: goal.achieved,
            },
            points_balance: profile.points_balance,
            achievements_earned,
        })
    }

    pub async fn parent_stats(&self, parent_id: &str) -> CoreResult<ParentDashboard> {
        let accounts = AccountService::new(self.mongo.clone(), self.clock.clone());
        let children = accounts.list_children(parent_id).await?;

        let mut summaries = Vec::with_capacity(children.len());
        for child in children {
            let stats = self.child_stats(&child.id).await?;
            summaries.push(ChildSummary { child, stats });
        }

        Ok(ParentDashboard {
            children_count: summaries.len(),
            children: summaries,
        })
    }

    pub async fn admin_stats(&self) -> CoreResult<AdminDashboard> {
        let catalog = CatalogService::new(self.mongo.clone());
        let users = self.mongo.collection::<mongodb::bson::Document>("users");

        let total_users = users
            .count_documents(doc! { "is_active": true })
            .await
            .context("Failed to count users")?;
        let children = users
            .count_documents(doc! { "is_active": true, "role": UserRole::Child.as_str() })
            .await
            .context("Failed to count children")?;
        let parents = users
            .count_documents(doc! { "is_active": true, "role": UserRole::Parent.as_str() })
            .await
            .context("Failed to count parents")?;

        Ok(AdminDashboard {
            published_paths: catalog.count_published_paths().await?,
            published_lessons: catalog.count_published_lessons().await?,
            active_quizzes: catalog.count_active_quizzes().await?,
            total_users,
            children,
            parents,
        })
    }
}
