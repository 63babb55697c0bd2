use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        rename = "lastLoginAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_login_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        Ok(DateTime::from_timestamp_millis(bson_dt.timestamp_millis()).unwrap())
    }
}

pub(crate) mod bson_datetime_as_chrono_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let bson_dt = bson::DateTime::from_millis(d.timestamp_millis());
                serializer.serialize_some(&bson_dt)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_bson_dt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt_bson_dt
            .map(|bson_dt| DateTime::from_timestamp_millis(bson_dt.timestamp_millis()).unwrap()))
    }
}

/// Account roles. Children study, parents monitor linked children,
/// admins manage the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Child,
    Parent,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Child => "child",
            UserRole::Parent => "parent",
            UserRole::Admin => "admin",
        }
    }

    pub fn can_monitor_children(&self) -> bool {
        matches!(self, UserRole::Parent | UserRole::Admin)
    }
}

/// Extended per-user profile, keyed by the owning user's id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub favorite_verse: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub points_balance: i64,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new_for_user(user_id: &str, now: DateTime<Utc>) -> Self {
        Profile {
            id: user_id.to_string(),
            user_id: user_id.to_string(),
            avatar_url: None,
            favorite_verse: None,
            bio: None,
            points_balance: 0,
            updated_at: now,
        }
    }
}

/// Parent-child link, keyed "{parent_id}:{child_id}" so duplicates hit
/// the unique index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentChildRelationship {
    #[serde(rename = "_id")]
    pub id: String,
    pub parent_id: String,
    pub child_id: String,
    #[serde(default = "default_true")]
    pub can_monitor_progress: bool,
    #[serde(default)]
    pub can_set_goals: bool,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl ParentChildRelationship {
    pub fn link_id(parent_id: &str, child_id: &str) -> String {
        format!("{}:{}", parent_id, child_id)
    }
}

pub const DEFAULT_DAILY_GOAL_MINUTES: i32 = 15;
pub const DEFAULT_DAILY_LESSONS_GOAL: i32 = 1;

/// Per-user preferences, keyed by user id; created on first read with
/// defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub daily_goal_minutes: i32,
    pub daily_lessons_goal: i32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

fn default_language() -> String {
    "en".to_string()
}

impl UserSettings {
    pub fn defaults_for_user(user_id: &str, now: DateTime<Utc>) -> Self {
        UserSettings {
            id: user_id.to_string(),
            user_id: user_id.to_string(),
            daily_goal_minutes: DEFAULT_DAILY_GOAL_MINUTES,
            daily_lessons_goal: DEFAULT_DAILY_LESSONS_GOAL,
            notifications_enabled: true,
            language: default_language(),
            updated_at: now,
        }
    }
}

/// User view returned to clients (no sensitive fields)
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            birth_date: user.birth_date,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Request to register a new user
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3 and 50 characters"
    ))]
    pub username: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    /// Optional role (defaults to child). Only admins can create non-child users.
    pub role: Option<UserRole>,

    pub birth_date: Option<NaiveDate>,
}

/// Request to login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Response after successful login or registration (token also set as an
/// HTTP-only cookie)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserView,
}

/// Request to update user settings
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    #[validate(range(min = 1, max = 480, message = "Daily goal must be 1-480 minutes"))]
    pub daily_goal_minutes: Option<i32>,

    #[validate(range(min = 1, max = 50, message = "Daily lessons goal must be 1-50"))]
    pub daily_lessons_goal: Option<i32>,

    pub notifications_enabled: Option<bool>,

    #[validate(length(min = 2, max = 8, message = "Invalid language code"))]
    pub language: Option<String>,
}

/// Request to update the profile
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: Option<String>,

    #[validate(length(max = 300, message = "Favorite verse must be at most 300 characters"))]
    pub favorite_verse: Option<String>,

    #[validate(length(max = 1000, message = "Bio must be at most 1000 characters"))]
    pub bio: Option<String>,
}

/// Request to link a child account to the calling parent
#[derive(Debug, Deserialize, Validate)]
pub struct LinkChildRequest {
    #[validate(length(min = 1, message = "child_id is required"))]
    pub child_id: String,

    pub can_monitor_progress: Option<bool>,
    pub can_set_goals: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Parent).unwrap();
        assert_eq!(json, "\"parent\"");
        let back: UserRole = serde_json::from_str("\"child\"").unwrap();
        assert_eq!(back, UserRole::Child);
    }

    #[test]
    fn monitor_capability_follows_role() {
        assert!(!UserRole::Child.can_monitor_children());
        assert!(UserRole::Parent.can_monitor_children());
        assert!(UserRole::Admin.can_monitor_children());
    }

    #[test]
    fn link_id_is_parent_then_child() {
        assert_eq!(
            ParentChildRelationship::link_id("p1", "c1"),
            "p1:c1".to_string()
        );
    }

    #[test]
    fn settings_defaults_match_configured_targets() {
        let settings = UserSettings::defaults_for_user("u1", Utc::now());
        assert_eq!(settings.daily_goal_minutes, 15);
        assert_eq!(settings.daily_lessons_goal, 1);
        assert!(settings.notifications_enabled);
    }
}
