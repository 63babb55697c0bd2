use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use super::catalog::AgeGroup;

/// Illustrated Bible story
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub slug: String,
    pub age_group: AgeGroup,
    #[serde(default)]
    pub summary: String,
    /// Opaque page/media content
    #[serde(default)]
    pub body: Document,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prayer {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub slug: String,
    pub age_group: AgeGroup,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub slug: String,
    pub age_group: AgeGroup,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Printable craft or coloring activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub slug: String,
    pub age_group: AgeGroup,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub material_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Unified summary used by library listings
#[derive(Debug, Serialize)]
pub struct LibraryItemSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub age_group: AgeGroup,
}

impl From<&Story> for LibraryItemSummary {
    fn from(story: &Story) -> Self {
        LibraryItemSummary {
            id: story.id.to_hex(),
            title: story.title.clone(),
            slug: story.slug.clone(),
            age_group: story.age_group,
        }
    }
}

impl From<&Prayer> for LibraryItemSummary {
    fn from(prayer: &Prayer) -> Self {
        LibraryItemSummary {
            id: prayer.id.to_hex(),
            title: prayer.title.clone(),
            slug: prayer.slug.clone(),
            age_group: prayer.age_group,
        }
    }
}

impl From<&Song> for LibraryItemSummary {
    fn from(song: &Song) -> Self {
        LibraryItemSummary {
            id: song.id.to_hex(),
            title: song.title.clone(),
            slug: song.slug.clone(),
            age_group: song.age_group,
        }
    }
}

impl From<&Activity> for LibraryItemSummary {
    fn from(activity: &Activity) -> Self {
        LibraryItemSummary {
            id: activity.id.to_hex(),
            title: activity.title.clone(),
            slug: activity.slug.clone(),
            age_group: activity.age_group,
        }
    }
}
