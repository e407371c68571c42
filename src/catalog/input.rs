//! Typed procedure inputs and their presence/range checks.
//!
//! Fields are snake_case on the wire. Nullable columns use
//! `Option<Option<T>>` so that an omitted field and an explicit `null`
//! stay distinguishable in updates.

use crate::db::{NovelStatus, PlacementType};
use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer};

/// Input checks run after deserialization and before any handler logic.
pub trait Validate {
    /// Reject input that is well-typed but out of range.
    fn validate(&self) -> Result<()>;
}

/// Deserialize a present field (including `null`) as `Some(..)`.
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_min_len(field: &str, value: &str, min: usize) -> Result<()> {
    if value.chars().count() < min {
        return Err(AppError::Validation(format!(
            "{} must contain at least {} characters",
            field, min
        )));
    }
    Ok(())
}

fn require_positive(field: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(AppError::Validation(format!("{} must be positive", field)));
    }
    Ok(())
}

/// Loose syntactic email check: `local@domain.tld`, no whitespace.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn require_email(value: &str) -> Result<()> {
    if !is_valid_email(value) {
        return Err(AppError::Validation(format!("Invalid email: {}", value)));
    }
    Ok(())
}

/// `createUser` input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    /// Email address.
    pub email: String,
    /// Username, at least 3 characters.
    pub username: String,
    /// Plain password, at least 6 characters.
    pub password: String,
    /// Defaults to `false`.
    pub is_admin: Option<bool>,
}

impl Validate for CreateUserInput {
    fn validate(&self) -> Result<()> {
        require_email(&self.email)?;
        require_min_len("username", &self.username, 3)?;
        require_min_len("password", &self.password, 6)
    }
}

/// `updateUser` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserInput {
    /// User to update.
    pub id: i64,
    /// New email.
    pub email: Option<String>,
    /// New username.
    pub username: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New admin flag.
    pub is_admin: Option<bool>,
}

impl Validate for UpdateUserInput {
    fn validate(&self) -> Result<()> {
        if let Some(email) = &self.email {
            require_email(email)?;
        }
        if let Some(username) = &self.username {
            require_min_len("username", username, 3)?;
        }
        if let Some(password) = &self.password {
            require_min_len("password", password, 6)?;
        }
        Ok(())
    }
}

/// `createAuthor` input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAuthorInput {
    /// Display name.
    pub name: String,
    /// Biography.
    pub bio: Option<String>,
    /// Portrait URL.
    pub image_url: Option<String>,
}

impl Validate for CreateAuthorInput {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

/// `updateAuthor` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAuthorInput {
    /// Author to update.
    pub id: i64,
    /// New name.
    pub name: Option<String>,
    /// New biography; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    /// New portrait URL; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
}

impl Validate for UpdateAuthorInput {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }
}

/// `createGenre` input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGenreInput {
    /// Unique name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

impl Validate for CreateGenreInput {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)
    }
}

/// `updateGenre` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGenreInput {
    /// Genre to update.
    pub id: i64,
    /// New name.
    pub name: Option<String>,
    /// New description; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

impl Validate for UpdateGenreInput {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        Ok(())
    }
}

/// `createNovel` input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNovelInput {
    /// Title.
    pub title: String,
    /// Synopsis.
    pub description: String,
    /// Existing author.
    pub author_id: i64,
    /// Cover image URL.
    pub cover_image_url: Option<String>,
    /// Publication status.
    pub status: NovelStatus,
    /// Defaults to `false`.
    pub is_featured: Option<bool>,
    /// Genres to tag the novel with.
    pub genre_ids: Option<Vec<i64>>,
}

impl Validate for CreateNovelInput {
    fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_non_empty("description", &self.description)
    }
}

/// `updateNovel` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNovelInput {
    /// Novel to update.
    pub id: i64,
    /// New title.
    pub title: Option<String>,
    /// New synopsis.
    pub description: Option<String>,
    /// New author.
    pub author_id: Option<i64>,
    /// New cover; `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image_url: Option<Option<String>>,
    /// New status.
    pub status: Option<NovelStatus>,
    /// New featured flag.
    pub is_featured: Option<bool>,
    /// Full replacement genre set; omit to keep the current one.
    pub genre_ids: Option<Vec<i64>>,
}

impl Validate for UpdateNovelInput {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        if let Some(description) = &self.description {
            require_non_empty("description", description)?;
        }
        Ok(())
    }
}

/// `searchNovels` input. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchNovelsInput {
    /// Substring of the title or author name.
    pub query: Option<String>,
    /// Match any of these genres.
    pub genre_ids: Option<Vec<i64>>,
    /// Exact status.
    pub status: Option<NovelStatus>,
    /// Exact author.
    pub author_id: Option<i64>,
    /// Page size, defaults to 20.
    pub limit: Option<i64>,
    /// Rows to skip, defaults to 0.
    pub offset: Option<i64>,
}

impl Validate for SearchNovelsInput {
    fn validate(&self) -> Result<()> {
        if let Some(limit) = self.limit {
            require_positive("limit", limit)?;
        }
        if let Some(offset) = self.offset
            && offset < 0
        {
            return Err(AppError::Validation(
                "offset must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// `createChapter` input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChapterInput {
    /// Owning novel.
    pub novel_id: i64,
    /// Title.
    pub title: String,
    /// Full text.
    pub content: String,
    /// Ordering key, at least 1.
    pub chapter_number: i64,
    /// Defaults to `false`.
    pub is_published: Option<bool>,
}

impl Validate for CreateChapterInput {
    fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_non_empty("content", &self.content)?;
        require_positive("chapter_number", self.chapter_number)
    }
}

/// `updateChapter` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChapterInput {
    /// Chapter to update.
    pub id: i64,
    /// New title.
    pub title: Option<String>,
    /// New text.
    pub content: Option<String>,
    /// New ordering key.
    pub chapter_number: Option<i64>,
    /// New publication state.
    pub is_published: Option<bool>,
}

impl Validate for UpdateChapterInput {
    fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        if let Some(content) = &self.content {
            require_non_empty("content", content)?;
        }
        if let Some(number) = self.chapter_number {
            require_positive("chapter_number", number)?;
        }
        Ok(())
    }
}

/// `getChapters` input.
#[derive(Debug, Clone, Deserialize)]
pub struct GetChaptersInput {
    /// Novel whose chapters to list.
    pub novel_id: i64,
    /// Only published chapters.
    pub published_only: Option<bool>,
}

impl Validate for GetChaptersInput {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// `updateReadingProgress` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReadingProgressInput {
    /// Reader.
    pub user_id: i64,
    /// Novel being read.
    pub novel_id: i64,
    /// Chapter of that novel.
    pub chapter_id: i64,
    /// 0 to 100.
    pub progress_percentage: f64,
}

impl Validate for UpdateReadingProgressInput {
    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.progress_percentage) {
            return Err(AppError::Validation(
                "progress_percentage must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// `getUserReadingHistory` input.
#[derive(Debug, Clone, Deserialize)]
pub struct GetUserReadingHistoryInput {
    /// Reader.
    pub user_id: i64,
    /// Maximum number of rows.
    pub limit: Option<i64>,
}

impl Validate for GetUserReadingHistoryInput {
    fn validate(&self) -> Result<()> {
        if let Some(limit) = self.limit {
            require_positive("limit", limit)?;
        }
        Ok(())
    }
}

/// `createAdPlacement` input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdPlacementInput {
    /// Admin-facing name.
    pub name: String,
    /// Slot kind.
    pub placement_type: PlacementType,
    /// Raw script.
    pub ad_script: String,
    /// Defaults to `true`.
    pub is_active: Option<bool>,
}

impl Validate for CreateAdPlacementInput {
    fn validate(&self) -> Result<()> {
        require_non_empty("name", &self.name)?;
        require_non_empty("ad_script", &self.ad_script)
    }
}

/// `updateAdPlacement` input.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAdPlacementInput {
    /// Placement to update.
    pub id: i64,
    /// New name.
    pub name: Option<String>,
    /// New slot kind.
    pub placement_type: Option<PlacementType>,
    /// New script.
    pub ad_script: Option<String>,
    /// New active flag.
    pub is_active: Option<bool>,
}

impl Validate for UpdateAdPlacementInput {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_non_empty("name", name)?;
        }
        if let Some(script) = &self.ad_script {
            require_non_empty("ad_script", script)?;
        }
        Ok(())
    }
}

/// `login` input.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    /// Username or email.
    pub identifier: String,
    /// Plain password.
    pub password: String,
}

impl Validate for LoginInput {
    fn validate(&self) -> Result<()> {
        require_non_empty("identifier", &self.identifier)?;
        require_non_empty("password", &self.password)
    }
}

/// Bare numeric ID, as taken by the by-id and delete procedures.
impl Validate for i64 {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
