use crate::error::{CoreError, CoreResult};
use crate::metrics::ACHIEVEMENTS_AWARDED_TOTAL;
use crate::models::catalog::UserAchievement;
use crate::models::user::{
    LinkChildRequest, ParentChildRelationship, Profile, UpdateProfileRequest,
    UpdateSettingsRequest, User, UserRole, UserSettings, UserView,
};
use crate::utils::time::{chrono_to_bson, Clock};
use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::ReplaceOptions;
use mongodb::Database;
use std::sync::Arc;

use super::catalog_service::CatalogService;

/// Profiles, settings, parent-child links and earned achievements.
pub struct AccountService {
    mongo: Database,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(mongo: Database, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    pub async fn get_user(&self, user_id: &str) -> CoreResult<User> {
        let oid = ObjectId::parse_str(user_id)
            .map_err(|_| CoreError::validation("Invalid user id"))?;
        let collection = self.mongo.collection::<User>("users");
        collection
            .find_one(doc! { "_id": oid, "is_active": true })
            .await
            .context("Failed to query user")?
            .ok_or_else(|| CoreError::not_found("User not found"))
    }

    pub async fn ensure_profile(&self, user_id: &str) -> CoreResult<Profile> {
        let collection = self.mongo.collection::<Profile>("profiles");
        if let Some(existing) = collection
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query profile")?
        {
            return Ok(existing);
        }

        let profile = Profile::new_for_user(user_id, self.clock.now());
        collection
            .replace_one(doc! { "_id": user_id }, &profile)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to create profile")?;
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> CoreResult<Profile> {
        let mut profile = self.ensure_profile(user_id).await?;
        if let Some(avatar_url) = req.avatar_url {
            profile.avatar_url = Some(avatar_url);
        }
        if let Some(favorite_verse) = req.favorite_verse {
            profile.favorite_verse = Some(favorite_verse);
        }
        if let Some(bio) = req.bio {
            profile.bio = Some(bio);
        }
        profile.updated_at = self.clock.now();

        let collection = self.mongo.collection::<Profile>("profiles");
        collection
            .replace_one(doc! { "_id": user_id }, &profile)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to save profile")?;
        Ok(profile)
    }

    /// Adds points to the profile balance with `$inc` so concurrent
    /// credits are never lost.
    pub async fn credit_points(&self, user_id: &str, points: i64) -> CoreResult<()> {
        self.ensure_profile(user_id).await?;
        let collection = self.mongo.collection::<Profile>("profiles");
        collection
            .update_one(
                doc! { "_id": user_id },
                doc! {
                    "$inc": { "points_balance": points },
                    "$set": { "updatedAt": chrono_to_bson(self.clock.now()) },
                },
            )
            .await
            .context("Failed to credit points")?;
        Ok(())
    }

    pub async fn ensure_settings(&self, user_id: &str) -> CoreResult<UserSettings> {
        let collection = self.mongo.collection::<UserSettings>("user_settings");
        if let Some(existing) = collection
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to query settings")?
        {
            return Ok(existing);
        }

        let settings = UserSettings::defaults_for_user(user_id, self.clock.now());
        collection
            .replace_one(doc! { "_id": user_id }, &settings)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to create settings")?;
        Ok(settings)
    }

    /// Updates goal targets and preferences. Only daily goal rows created
    /// after this call pick up the new targets.
    pub async fn update_settings(
        &self,
        user_id: &str,
        req: UpdateSettingsRequest,
    ) -> CoreResult<UserSettings> {
        let mut settings = self.ensure_settings(user_id).await?;
        if let Some(minutes) = req.daily_goal_minutes {
            settings.daily_goal_minutes = minutes;
        }
        if let Some(lessons) = req.daily_lessons_goal {
            settings.daily_lessons_goal = lessons;
        }
        if let Some(enabled) = req.notifications_enabled {
            settings.notifications_enabled = enabled;
        }
        if let Some(language) = req.language {
            settings.language = language;
        }
        settings.updated_at = self.clock.now();

        let collection = self.mongo.collection::<UserSettings>("user_settings");
        collection
            .replace_one(doc! { "_id": user_id }, &settings)
            .with_options(ReplaceOptions::builder().upsert(true).build())
            .await
            .context("Failed to save settings")?;
        Ok(settings)
    }

    /// Links a child account to a parent. Parent or admin only; linking
    /// the same pair twice is a uniqueness violation.
    pub async fn link_child(
        &self,
        parent_id: &str,
        parent_role: UserRole,
        req: LinkChildRequest,
    ) -> CoreResult<ParentChildRelationship> {
        if !parent_role.can_monitor_children() {
            return Err(CoreError::validation(
                "Only parent or admin accounts can link children",
            ));
        }

        let child = self.get_user(&req.child_id).await?;
        if child.role != UserRole::Child {
            return Err(CoreError::validation("Linked account must be a child"));
        }

        let link = ParentChildRelationship {
            id: ParentChildRelationship::link_id(parent_id, &req.child_id),
            parent_id: parent_id.to_string(),
            child_id: req.child_id.clone(),
            can_monitor_progress: req.can_monitor_progress.unwrap_or(true),
            can_set_goals: req.can_set_goals.unwrap_or(false),
            created_at: self.clock.now(),
        };

        let collection = self
            .mongo
            .collection::<ParentChildRelationship>("parent_child_relationships");
        collection
            .insert_one(&link)
            .await
            .map_err(|err| CoreError::from_mongo(err, "parent-child link"))?;

        tracing::info!(parent_id = %parent_id, child_id = %req.child_id, "Child linked");
        Ok(link)
    }

    pub async fn unlink_child(&self, parent_id: &str, child_id: &str) -> CoreResult<()> {
        let collection = self
            .mongo
            .collection::<ParentChildRelationship>("parent_child_relationships");
        let result = collection
            .delete_one(doc! { "_id": ParentChildRelationship::link_id(parent_id, child_id) })
            .await
            .context("Failed to delete link")?;
        if result.deleted_count == 0 {
            return Err(CoreError::not_found("Link not found"));
        }
        tracing::info!(parent_id = %parent_id, child_id = %child_id, "Child unlinked");
        Ok(())
    }

    /// Children the parent is allowed to monitor.
    pub async fn list_children(&self, parent_id: &str) -> CoreResult<Vec<UserView>> {
        let links = self
            .mongo
            .collection::<ParentChildRelationship>("parent_child_relationships");
        let cursor = links
            .find(doc! { "parent_id": parent_id, "can_monitor_progress": true })
            .await
            .context("Failed to query links")?;
        let links: Vec<ParentChildRelationship> =
            cursor.try_collect().await.context("Failed to read links")?;

        let mut children = Vec::with_capacity(links.len());
        for link in links {
            match self.get_user(&link.child_id).await {
                Ok(child) => children.push(UserView::from(child)),
                Err(CoreError::NotFound(_)) => {
                    tracing::warn!(child_id = %link.child_id, "Linked child no longer active");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(children)
    }

    /// The linked child, provided the parent may monitor it. Admins see
    /// every child.
    pub async fn monitored_child(
        &self,
        parent_id: &str,
        parent_role: UserRole,
        child_id: &str,
    ) -> CoreResult<User> {
        if parent_role != UserRole::Admin {
            let links = self
                .mongo
                .collection::<ParentChildRelationship>("parent_child_relationships");
            let link = links
                .find_one(doc! {
                    "_id": ParentChildRelationship::link_id(parent_id, child_id),
                    "can_monitor_progress": true,
                })
                .await
                .context("Failed to query link")?;
            if link.is_none() {
                return Err(CoreError::not_found("Child not found"));
            }
        }
        self.get_user(child_id).await
    }

    pub async fn list_user_achievements(&self, user_id: &str) -> CoreResult<Vec<UserAchievement>> {
        let collection = self
            .mongo
            .collection::<UserAchievement>("user_achievements");
        let cursor = collection
            .find(doc! { "user_id": user_id })
            .await
            .context("Failed to query user achievements")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read user achievements")?)
    }

    pub async fn count_user_achievements(&self, user_id: &str) -> CoreResult<u64> {
        Ok(self
            .mongo
            .collection::<mongodb::bson::Document>("user_achievements")
            .count_documents(doc! { "user_id": user_id })
            .await
            .context("Failed to count user achievements")?)
    }

    /// Awards an achievement to a user and credits its points. Awarding
    /// the same achievement twice is a uniqueness violation (the earned
    /// set is append-only).
    pub async fn award_achievement(
        &self,
        user_id: &str,
        achievement_id: &str,
    ) -> CoreResult<UserAchievement> {
        let catalog = CatalogService::new(self.mongo.clone());
        let achievement = catalog.get_achievement(achievement_id).await?;
        self.get_user(user_id).await?;

        let award = UserAchievement {
            id: UserAchievement::award_id(user_id, achievement_id),
            user_id: user_id.to_string(),
            achievement_id: achievement_id.to_string(),
            earned_at: self.clock.now(),
        };

        let collection = self
            .mongo
            .collection::<UserAchievement>("user_achievements");
        match collection.insert_one(&award).await {
            Ok(_) => {}
            Err(err) if crate::error::is_duplicate_key(&err) => {
                ACHIEVEMENTS_AWARDED_TOTAL
                    .with_label_values(&["duplicate"])
                    .inc();
                return Err(CoreError::validation("achievement already awarded"));
            }
            Err(err) => return Err(CoreError::from_mongo(err, "achievement award")),
        }

        if achievement.points > 0 {
            self.credit_points(user_id, i64::from(achievement.points))
                .await?;
        }

        ACHIEVEMENTS_AWARDED_TOTAL
            .with_label_values(&["awarded"])
            .inc();
        tracing::info!(
            user_id = %user_id,
            achievement = %achievement.slug,
            points = achievement.points,
            "Achievement awarded"
        );

        Ok(award)
    }
}
