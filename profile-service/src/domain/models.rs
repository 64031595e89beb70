use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, Type};
use std::collections::HashMap;
use uuid::Uuid;

/// Account role matching database account_role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "account_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    User,
    Admin,
}

/// Account model - top-level credentialed identity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub handle: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile kind matching database profile_kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "profile_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Public,
    Anonymous,
}

/// Profile visibility matching database visibility_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "visibility_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisibilityStatus {
    Public,
    Private,
}

/// Who can see a profile's activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyLevel {
    Public,
    FollowersOnly,
    Private,
}

/// Per-channel notification toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub email: bool,
    pub push: bool,
    pub in_app: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            in_app: true,
        }
    }
}

/// Nested profile settings, stored verbatim as JSONB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub privacy: PrivacyLevel,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            privacy: PrivacyLevel::Public,
            notifications: NotificationSettings::default(),
        }
    }
}

/// Profile model - a persona belonging to an account, the unit of
/// authorship and engagement
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Unique within the owning account only, not globally
    pub profile_name: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub kind: ProfileKind,
    pub visibility: VisibilityStatus,
    pub is_active: bool,
    pub is_default: bool,
    pub settings: Json<ProfileSettings>,
    /// Opaque string-keyed map; no operation inspects its contents
    pub metadata: Json<HashMap<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Content kind matching database content_kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "content_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Question,
}

/// Reaction kind matching database reaction_kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "reaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

/// Content item model - a post or question owned by a profile and a category.
/// Counters mirror the cardinality of the corresponding membership tables and
/// only move inside the same transaction as the membership change.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentItem {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub category_id: Uuid,
    pub kind: ContentKind,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub save_count: i64,
    pub share_count: i64,
    pub answer_count: i32,
    pub is_answered: bool,
    pub accepted_answer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Derived on read, never stored
    pub fn engagement_score(&self) -> i64 {
        self.like_count + self.save_count + self.share_count
    }

    pub fn is_question(&self) -> bool {
        self.kind == ContentKind::Question
    }
}

/// A profile's engagement state against one content item.
/// `reaction` covers the mutually exclusive like/dislike axis; save and
/// share are independent axes (share is one-way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementState {
    pub reaction: Option<ReactionKind>,
    pub saved: bool,
    pub shared: bool,
}

/// Engagement counters for one content item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct EngagementCounts {
    pub like_count: i64,
    pub dislike_count: i64,
    pub save_count: i64,
    pub share_count: i64,
}
