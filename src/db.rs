mod ads;
mod catalog;
mod reading;
mod schema;
mod search;
mod users;

pub use ads::{AdPlacementChanges, NewAdPlacement};
pub use catalog::{
    AuthorChanges, ChapterChanges, GenreChanges, NewAuthor, NewChapter, NewGenre, NewNovel,
    NovelChanges,
};
pub use schema::Database;
pub use search::{DEFAULT_SEARCH_LIMIT, NovelFilter};
pub use users::{NewUser, UserChanges};

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Email address (unique).
    pub email: String,
    /// Username (unique).
    pub username: String,
    /// Argon2 password hash.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Whether the user may use administrative procedures.
    pub is_admin: bool,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: i64,
    /// Expiration timestamp (ms).
    pub expires_at: i64,
}

/// Novel author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    /// Author ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Short biography.
    pub bio: Option<String>,
    /// Portrait URL.
    pub image_url: Option<String>,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// Genre a novel can be tagged with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    /// Genre ID.
    pub id: i64,
    /// Genre name (unique).
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Creation timestamp (ms).
    pub created_at: i64,
}

/// Publication status of a novel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NovelStatus {
    /// Still receiving chapters.
    Ongoing,
    /// Finished.
    Completed,
    /// Paused by the author.
    Hiatus,
    /// Not yet public.
    Draft,
}

impl NovelStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            NovelStatus::Ongoing => "ongoing",
            NovelStatus::Completed => "completed",
            NovelStatus::Hiatus => "hiatus",
            NovelStatus::Draft => "draft",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(NovelStatus::Ongoing),
            "completed" => Some(NovelStatus::Completed),
            "hiatus" => Some(NovelStatus::Hiatus),
            "draft" => Some(NovelStatus::Draft),
            _ => None,
        }
    }
}

/// Novel with its derived counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Novel {
    /// Novel ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Synopsis.
    pub description: String,
    /// Owning author.
    pub author_id: i64,
    /// Cover image URL.
    pub cover_image_url: Option<String>,
    /// Publication status.
    pub status: NovelStatus,
    /// Shown on the front page.
    pub is_featured: bool,
    /// Number of published chapters (derived).
    pub total_chapters: i64,
    /// Number of chapter reads (derived).
    pub total_views: i64,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// Chapter of a novel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter ID.
    pub id: i64,
    /// Owning novel.
    pub novel_id: i64,
    /// Chapter title.
    pub title: String,
    /// Full chapter text.
    pub content: String,
    /// Author-assigned ordering key (not unique).
    pub chapter_number: i64,
    /// Visible to readers.
    pub is_published: bool,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

/// Last reading position of a user within a novel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingHistory {
    /// Row ID, stable across progress updates.
    pub id: i64,
    /// Reader.
    pub user_id: i64,
    /// Novel being read.
    pub novel_id: i64,
    /// Chapter last opened.
    pub chapter_id: i64,
    /// Reading percentage (0.0 - 100.0).
    pub progress_percentage: f64,
    /// Last update timestamp (ms).
    pub last_read_at: i64,
}

/// Kind of ad slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementType {
    /// Inline banner.
    Banner,
    /// Full-screen between chapters.
    Interstitial,
    /// Blended into content lists.
    Native,
}

impl PlacementType {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementType::Banner => "banner",
            PlacementType::Interstitial => "interstitial",
            PlacementType::Native => "native",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "banner" => Some(PlacementType::Banner),
            "interstitial" => Some(PlacementType::Interstitial),
            "native" => Some(PlacementType::Native),
            _ => None,
        }
    }
}

/// Ad script slot. The script is stored opaquely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdPlacement {
    /// Placement ID.
    pub id: i64,
    /// Admin-facing name.
    pub name: String,
    /// Slot kind.
    pub placement_type: PlacementType,
    /// Raw ad script.
    pub ad_script: String,
    /// Served to readers.
    pub is_active: bool,
    /// Creation timestamp (ms).
    pub created_at: i64,
    /// Last update timestamp (ms).
    pub updated_at: i64,
}

impl ToSql for NovelStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for NovelStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        NovelStatus::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("invalid novel status: {}", s).into()))
    }
}

impl ToSql for PlacementType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PlacementType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        PlacementType::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("invalid placement type: {}", s).into()))
    }
}

/// Current time in epoch milliseconds.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a millisecond timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts).unwrap_or_else(Utc::now)
}
