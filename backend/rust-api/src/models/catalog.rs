use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Age buckets used for recommendations and content labelling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgeGroup {
    #[serde(rename = "4-6")]
    Ages4To6,
    #[serde(rename = "7-9")]
    Ages7To9,
    #[serde(rename = "10-12")]
    Ages10To12,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Ages4To6 => "4-6",
            AgeGroup::Ages7To9 => "7-9",
            AgeGroup::Ages10To12 => "10-12",
        }
    }

    /// Bucket for a child of the given age, clamped to the nearest bucket
    /// outside the 4-12 range.
    pub fn for_age(age: u32) -> AgeGroup {
        match age {
            0..=6 => AgeGroup::Ages4To6,
            7..=9 => AgeGroup::Ages7To9,
            _ => AgeGroup::Ages10To12,
        }
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "4-6" => Ok(AgeGroup::Ages4To6),
            "7-9" => Ok(AgeGroup::Ages7To9),
            "10-12" => Ok(AgeGroup::Ages10To12),
            _ => Err(format!("Invalid age group: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub category_id: ObjectId,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub age_group: AgeGroup,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub estimated_duration_minutes: i32,
    #[serde(default)]
    pub lessons_count: i32,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub path_id: ObjectId,
    pub title: String,
    pub slug: String,
    /// Opaque lesson body (rich content assembled by the authoring tool)
    #[serde(default)]
    pub body: Document,
    #[serde(default)]
    pub duration_minutes: i32,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub is_published: bool,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_PASSING_SCORE: i32 = 70;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub lesson_id: ObjectId,
    pub title: String,
    #[serde(default = "default_passing_score")]
    pub passing_score: i32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_passing_score() -> i32 {
    DEFAULT_PASSING_SCORE
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub quiz_id: ObjectId,
    pub text: String,
    #[serde(default)]
    pub order: i32,
    pub options: Vec<AnswerOption>,
    pub correct_option_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub points: i32,
    /// Opaque unlock criteria; the core passes this through untouched
    #[serde(default)]
    pub requirements: Document,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Append-only join row, keyed "{user_id}:{achievement_id}"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAchievement {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub achievement_id: String,
    #[serde(rename = "earnedAt", with = "bson_datetime_as_chrono")]
    pub earned_at: DateTime<Utc>,
}

impl UserAchievement {
    pub fn award_id(user_id: &str, achievement_id: &str) -> String {
        format!("{}:{}", user_id, achievement_id)
    }
}

/// Path summary returned to clients in listings
#[derive(Debug, Serialize)]
pub struct LearningPathSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub age_group: AgeGroup,
    pub difficulty: Difficulty,
    pub category_id: String,
    pub lessons_count: i32,
    pub estimated_duration_minutes: i32,
}

impl From<&LearningPath> for LearningPathSummary {
    fn from(path: &LearningPath) -> Self {
        LearningPathSummary {
            id: path.id.to_hex(),
            title: path.title.clone(),
            slug: path.slug.clone(),
            description: path.description.clone(),
            age_group: path.age_group,
            difficulty: path.difficulty,
            category_id: path.category_id.to_hex(),
            lessons_count: path.lessons_count,
            estimated_duration_minutes: path.estimated_duration_minutes,
        }
    }
}

/// Lesson summary without the body blob
#[derive(Debug, Serialize)]
pub struct LessonSummary {
    pub id: String,
    pub path_id: String,
    pub title: String,
    pub slug: String,
    pub duration_minutes: i32,
    pub order: i32,
}

impl From<&Lesson> for LessonSummary {
    fn from(lesson: &Lesson) -> Self {
        LessonSummary {
            id: lesson.id.to_hex(),
            path_id: lesson.path_id.to_hex(),
            title: lesson.title.clone(),
            slug: lesson.slug.clone(),
            duration_minutes: lesson.duration_minutes,
            order: lesson.order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_buckets_cover_boundaries() {
        assert_eq!(AgeGroup::for_age(4), AgeGroup::Ages4To6);
        assert_eq!(AgeGroup::for_age(6), AgeGroup::Ages4To6);
        assert_eq!(AgeGroup::for_age(7), AgeGroup::Ages7To9);
        assert_eq!(AgeGroup::for_age(9), AgeGroup::Ages7To9);
        assert_eq!(AgeGroup::for_age(10), AgeGroup::Ages10To12);
        assert_eq!(AgeGroup::for_age(12), AgeGroup::Ages10To12);
    }

    #[test]
    fn age_buckets_clamp_out_of_range() {
        assert_eq!(AgeGroup::for_age(3), AgeGroup::Ages4To6);
        assert_eq!(AgeGroup::for_age(14), AgeGroup::Ages10To12);
    }

    #[test]
    fn age_group_round_trips_through_label() {
        for group in [
            AgeGroup::Ages4To6,
            AgeGroup::Ages7To9,
            AgeGroup::Ages10To12,
        ] {
            assert_eq!(group.as_str().parse::<AgeGroup>().unwrap(), group);
        }
        assert!("5-8".parse::<AgeGroup>().is_err());
    }
}
