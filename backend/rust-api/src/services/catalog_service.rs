use crate::error::{CoreError, CoreResult};
use crate::models::catalog::{
    Achievement, AgeGroup, Category, LearningPath, Lesson, Question, Quiz,
};
use crate::models::library::{Activity, Prayer, Song, Story};
use crate::models::progress::LearningPathProgress;
use crate::models::user::User;
use anyhow::Context;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::FindOptions;
use mongodb::Database;

const FEATURED_LIMIT: i64 = 6;

/// Read side of the content catalog: categories, learning paths, lessons,
/// quizzes and the supplemental library collections.
pub struct CatalogService {
    mongo: Database,
}

impl CatalogService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn parse_id(id: &str, what: &str) -> CoreResult<ObjectId> {
        ObjectId::parse_str(id).map_err(|_| CoreError::validation(format!("Invalid {} id", what)))
    }

    pub async fn list_categories(&self) -> CoreResult<Vec<Category>> {
        let collection = self.mongo.collection::<Category>("categories");
        let cursor = collection
            .find(doc! { "is_active": true })
            .with_options(FindOptions::builder().sort(doc! { "order": 1 }).build())
            .await
            .context("Failed to query categories")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read categories")?)
    }

    pub async fn list_paths(
        &self,
        category_id: Option<&str>,
        age_group: Option<AgeGroup>,
    ) -> CoreResult<Vec<LearningPath>> {
        let mut filter = doc! { "is_published": true };
        if let Some(category_id) = category_id {
            filter.insert("category_id", Self::parse_id(category_id, "category")?);
        }
        if let Some(age_group) = age_group {
            filter.insert("age_group", age_group.as_str());
        }

        let collection = self.mongo.collection::<LearningPath>("learning_paths");
        let cursor = collection
            .find(filter)
            .with_options(FindOptions::builder().sort(doc! { "order": 1 }).build())
            .await
            .context("Failed to query learning paths")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read learning paths")?)
    }

    pub async fn get_path(&self, path_id: &str) -> CoreResult<LearningPath> {
        let oid = Self::parse_id(path_id, "path")?;
        let collection = self.mongo.collection::<LearningPath>("learning_paths");
        collection
            .find_one(doc! { "_id": oid, "is_published": true })
            .await
            .context("Failed to query learning path")?
            .ok_or_else(|| CoreError::not_found("Learning path not found"))
    }

    pub async fn list_lessons(&self, path_id: &str) -> CoreResult<Vec<Lesson>> {
        let path = self.get_path(path_id).await?;
        let collection = self.mongo.collection::<Lesson>("lessons");
        let cursor = collection
            .find(doc! { "path_id": path.id, "is_published": true })
            .with_options(FindOptions::builder().sort(doc! { "order": 1 }).build())
            .await
            .context("Failed to query lessons")?;
        Ok(cursor.try_collect().await.context("Failed to read lessons")?)
    }

    pub async fn get_lesson(&self, lesson_id: &str) -> CoreResult<Lesson> {
        let oid = Self::parse_id(lesson_id, "lesson")?;
        let collection = self.mongo.collection::<Lesson>("lessons");
        collection
            .find_one(doc! { "_id": oid, "is_published": true })
            .await
            .context("Failed to query lesson")?
            .ok_or_else(|| CoreError::not_found("Lesson not found"))
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> CoreResult<Quiz> {
        let oid = Self::parse_id(quiz_id, "quiz")?;
        let collection = self.mongo.collection::<Quiz>("quizzes");
        collection
            .find_one(doc! { "_id": oid, "is_active": true })
            .await
            .context("Failed to query quiz")?
            .ok_or_else(|| CoreError::not_found("Quiz not found"))
    }

    pub async fn get_quiz_for_lesson(&self, lesson_id: &str) -> CoreResult<Quiz> {
        let lesson = self.get_lesson(lesson_id).await?;
        let collection = self.mongo.collection::<Quiz>("quizzes");
        collection
            .find_one(doc! { "lesson_id": lesson.id, "is_active": true })
            .await
            .context("Failed to query quiz")?
            .ok_or_else(|| CoreError::not_found("Quiz not found"))
    }

    pub async fn list_questions(&self, quiz_id: &ObjectId) -> CoreResult<Vec<Question>> {
        let collection = self.mongo.collection::<Question>("questions");
        let cursor = collection
            .find(doc! { "quiz_id": quiz_id })
            .with_options(FindOptions::builder().sort(doc! { "order": 1 }).build())
            .await
            .context("Failed to query questions")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read questions")?)
    }

    pub async fn get_question(&self, question_id: &str) -> CoreResult<Question> {
        let oid = Self::parse_id(question_id, "question")?;
        let collection = self.mongo.collection::<Question>("questions");
        collection
            .find_one(doc! { "_id": oid })
            .await
            .context("Failed to query question")?
            .ok_or_else(|| CoreError::not_found("Question not found"))
    }

    /// Storefront strip: published paths flagged as featured, in display
    /// order.
    pub async fn featured_paths(&self) -> CoreResult<Vec<LearningPath>> {
        let collection = self.mongo.collection::<LearningPath>("learning_paths");
        let cursor = collection
            .find(doc! { "is_published": true, "is_featured": true })
            .with_options(
                FindOptions::builder()
                    .sort(doc! { "order": 1 })
                    .limit(FEATURED_LIMIT)
                    .build(),
            )
            .await
            .context("Failed to query featured paths")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read featured paths")?)
    }

    /// Published paths the user has not completed, narrowed to the user's
    /// age bucket when a birth date is on file.
    pub async fn recommended_paths(
        &self,
        user: &User,
        today: chrono::NaiveDate,
    ) -> CoreResult<Vec<LearningPath>> {
        let user_id = user
            .id
            .map(|id| id.to_hex())
            .ok_or_else(|| CoreError::not_found("User not found"))?;

        let mut filter = doc! { "is_published": true };
        if let Some(birth_date) = user.birth_date {
            let age = today.years_since(birth_date).unwrap_or(0);
            filter.insert("age_group", AgeGroup::for_age(age).as_str());
        }

        let completed: Vec<String> = {
            let collection = self
                .mongo
                .collection::<LearningPathProgress>("learning_path_progress");
            let cursor = collection
                .find(doc! { "user_id": &user_id, "status": "completed" })
                .await
                .context("Failed to query path progress")?;
            let rows: Vec<LearningPathProgress> = cursor
                .try_collect()
                .await
                .context("Failed to read path progress")?;
            rows.into_iter().map(|row| row.path_id).collect()
        };

        let completed_oids: Vec<ObjectId> = completed
            .iter()
            .filter_map(|id| ObjectId::parse_str(id).ok())
            .collect();
        if !completed_oids.is_empty() {
            filter.insert("_id", doc! { "$nin": completed_oids });
        }

        let collection = self.mongo.collection::<LearningPath>("learning_paths");
        let cursor = collection
            .find(filter)
            .with_options(FindOptions::builder().sort(doc! { "order": 1 }).build())
            .await
            .context("Failed to query recommended paths")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read recommended paths")?)
    }

    pub async fn list_stories(&self) -> CoreResult<Vec<Story>> {
        self.list_published("stories").await
    }

    pub async fn get_story(&self, story_id: &str) -> CoreResult<Story> {
        self.get_published("stories", story_id, "Story").await
    }

    pub async fn list_prayers(&self) -> CoreResult<Vec<Prayer>> {
        self.list_published("prayers").await
    }

    pub async fn get_prayer(&self, prayer_id: &str) -> CoreResult<Prayer> {
        self.get_published("prayers", prayer_id, "Prayer").await
    }

    pub async fn list_songs(&self) -> CoreResult<Vec<Song>> {
        self.list_published("songs").await
    }

    pub async fn get_song(&self, song_id: &str) -> CoreResult<Song> {
        self.get_published("songs", song_id, "Song").await
    }

    pub async fn list_activities(&self) -> CoreResult<Vec<Activity>> {
        self.list_published("activities").await
    }

    pub async fn get_activity(&self, activity_id: &str) -> CoreResult<Activity> {
        self.get_published("activities", activity_id, "Activity")
            .await
    }

    async fn list_published<T>(&self, collection_name: &str) -> CoreResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        let collection = self.mongo.collection::<T>(collection_name);
        let cursor = collection
            .find(doc! { "is_published": true })
            .with_options(FindOptions::builder().sort(doc! { "title": 1 }).build())
            .await
            .with_context(|| format!("Failed to query {}", collection_name))?;
        Ok(cursor
            .try_collect()
            .await
            .with_context(|| format!("Failed to read {}", collection_name))?)
    }

    async fn get_published<T>(&self, collection_name: &str, id: &str, what: &str) -> CoreResult<T>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        let oid = Self::parse_id(id, collection_name)?;
        let collection = self.mongo.collection::<T>(collection_name);
        collection
            .find_one(doc! { "_id": oid, "is_published": true })
            .await
            .with_context(|| format!("Failed to query {}", collection_name))?
            .ok_or_else(|| CoreError::not_found(format!("{} not found", what)))
    }

    pub async fn list_achievements(&self) -> CoreResult<Vec<Achievement>> {
        let collection = self.mongo.collection::<Achievement>("achievements");
        let cursor = collection
            .find(doc! { "is_active": true })
            .with_options(FindOptions::builder().sort(doc! { "name": 1 }).build())
            .await
            .context("Failed to query achievements")?;
        Ok(cursor
            .try_collect()
            .await
            .context("Failed to read achievements")?)
    }

    pub async fn get_achievement(&self, achievement_id: &str) -> CoreResult<Achievement> {
        let oid = Self::parse_id(achievement_id, "achievement")?;
        let collection = self.mongo.collection::<Achievement>("achievements");
        collection
            .find_one(doc! { "_id": oid, "is_active": true })
            .await
            .context("Failed to query achievement")?
            .ok_or_else(|| CoreError::not_found("Achievement not found"))
    }

    pub async fn count_published_paths(&self) -> CoreResult<u64> {
        self.count("learning_paths", doc! { "is_published": true })
            .await
    }

    pub async fn count_published_lessons(&self) -> CoreResult<u64> {
        self.count("lessons", doc! { "is_published": true }).await
    }

    pub async fn count_active_quizzes(&self) -> CoreResult<u64> {
        self.count("quizzes", doc! { "is_active": true }).await
    }

    async fn count(&self, collection_name: &str, filter: Document) -> CoreResult<u64> {
        let collection = self.mongo.collection::<Document>(collection_name);
        Ok(collection
            .count_documents(filter)
            .await
            .with_context(|| format!("Failed to count {}", collection_name))?)
    }
}
