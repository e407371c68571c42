use super::{CatalogService, CreateNovelInput, SearchNovelsInput, Success, UpdateNovelInput};
use crate::db::{DEFAULT_SEARCH_LIMIT, NewNovel, Novel, NovelChanges, NovelFilter};
use crate::error::{AppError, Result};

impl CatalogService {
    fn ensure_author(&self, author_id: i64) -> Result<()> {
        if self.db.get_author(author_id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "Author with id {} does not exist",
                author_id
            )));
        }
        Ok(())
    }

    fn ensure_genres(&self, genre_ids: &[i64]) -> Result<()> {
        if let Some(missing) = self.db.missing_genre_ids(genre_ids)?.first() {
            return Err(AppError::NotFound(format!(
                "Genre with id {} does not exist",
                missing
            )));
        }
        Ok(())
    }

    /// Create a novel with zeroed counters and its genre links.
    pub fn create_novel(&self, input: CreateNovelInput) -> Result<Novel> {
        self.ensure_author(input.author_id)?;
        let genre_ids = input.genre_ids.unwrap_or_default();
        self.ensure_genres(&genre_ids)?;

        let novel = self.db.create_novel(&NewNovel {
            title: input.title,
            description: input.description,
            author_id: input.author_id,
            cover_image_url: input.cover_image_url,
            status: input.status,
            is_featured: input.is_featured.unwrap_or(false),
            genre_ids,
        })?;

        tracing::info!(novel_id = novel.id, title = %novel.title, "Novel created");
        Ok(novel)
    }

    /// All novels with an existing author.
    pub fn get_novels_list(&self) -> Result<Vec<Novel>> {
        self.db.list_novels(false)
    }

    /// Featured novels.
    pub fn get_featured_novels(&self) -> Result<Vec<Novel>> {
        self.db.list_novels(true)
    }

    /// Novel by ID, `None` when absent.
    pub fn get_novel_by_id(&self, id: i64) -> Result<Option<Novel>> {
        tracing::debug!(novel_id = id, "Fetching novel");
        self.db.get_novel(id)
    }

    /// Update the supplied fields of a novel.
    ///
    /// A present `genre_ids` replaces the whole association set; an empty
    /// list clears it. References are checked before anything is written.
    pub fn update_novel(&self, input: UpdateNovelInput) -> Result<Novel> {
        if self.db.get_novel(input.id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "Novel with id {} not found",
                input.id
            )));
        }
        if let Some(author_id) = input.author_id {
            self.ensure_author(author_id)?;
        }
        if let Some(genre_ids) = &input.genre_ids {
            self.ensure_genres(genre_ids)?;
        }

        let changes = NovelChanges {
            title: input.title,
            description: input.description,
            author_id: input.author_id,
            cover_image_url: input.cover_image_url,
            status: input.status,
            is_featured: input.is_featured,
        };
        let novel = self.db.update_novel(input.id, &changes)?.ok_or_else(|| {
            AppError::NotFound(format!("Novel with id {} not found", input.id))
        })?;

        if let Some(genre_ids) = input.genre_ids {
            self.db.replace_novel_genres(novel.id, &genre_ids)?;
            tracing::debug!(novel_id = novel.id, ?genre_ids, "Replaced novel genres");
        }

        Ok(novel)
    }

    /// Delete a novel with its chapters, genre links and reading history.
    /// Reports `success: false` when the novel did not exist.
    pub fn delete_novel(&self, id: i64) -> Result<Success> {
        let deleted = self.db.delete_novel(id)?;
        if deleted {
            tracing::info!(novel_id = id, "Novel deleted");
        }
        Ok(Success::from(deleted))
    }

    /// Filtered, paginated novel search.
    pub fn search_novels(&self, input: SearchNovelsInput) -> Result<Vec<Novel>> {
        let filter = NovelFilter {
            query: input.query,
            genre_ids: input.genre_ids,
            status: input.status,
            author_id: input.author_id,
            limit: input.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            offset: input.offset.unwrap_or(0),
        };

        let novels = self.db.search_novels(&filter)?;
        tracing::debug!(results = novels.len(), "Novel search");
        Ok(novels)
    }
}
