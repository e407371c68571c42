use super::{CatalogService, CreateChapterInput, GetChaptersInput, Success, UpdateChapterInput};
use crate::db::{Chapter, ChapterChanges, NewChapter};
use crate::error::{AppError, Result};

impl CatalogService {
    /// Create a chapter. Publishing it recounts the novel's chapters.
    pub fn create_chapter(&self, input: CreateChapterInput) -> Result<Chapter> {
        if self.db.get_novel(input.novel_id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "Novel with id {} not found",
                input.novel_id
            )));
        }

        let chapter = self.db.create_chapter(&NewChapter {
            novel_id: input.novel_id,
            title: input.title,
            content: input.content,
            chapter_number: input.chapter_number,
            is_published: input.is_published.unwrap_or(false),
        })?;

        tracing::info!(
            chapter_id = chapter.id,
            novel_id = chapter.novel_id,
            number = chapter.chapter_number,
            "Chapter created"
        );

        if chapter.is_published {
            let total = self.db.recount_novel_chapters(chapter.novel_id, true)?;
            tracing::info!(novel_id = chapter.novel_id, total, "Recounted chapters");
        }

        Ok(chapter)
    }

    /// Chapters of a novel by chapter number.
    pub fn get_chapters(&self, input: GetChaptersInput) -> Result<Vec<Chapter>> {
        self.db
            .list_chapters(input.novel_id, input.published_only.unwrap_or(false))
    }

    /// Chapter for the reading view. A hit adds one view to its novel.
    pub fn get_chapter_by_id(&self, id: i64) -> Result<Option<Chapter>> {
        let Some(chapter) = self.db.get_chapter(id)? else {
            return Ok(None);
        };

        self.db.increment_novel_views(chapter.novel_id)?;
        tracing::debug!(chapter_id = id, novel_id = chapter.novel_id, "Chapter viewed");
        Ok(Some(chapter))
    }

    /// Update the supplied fields of a chapter. The novel is only recounted
    /// when the publication state flips.
    pub fn update_chapter(&self, input: UpdateChapterInput) -> Result<Chapter> {
        let existing = self
            .db
            .get_chapter(input.id)?
            .ok_or_else(|| AppError::NotFound("Chapter not found".to_string()))?;

        let was_published = existing.is_published;
        let changes = ChapterChanges {
            title: input.title,
            content: input.content,
            chapter_number: input.chapter_number,
            is_published: input.is_published,
        };
        let chapter = self
            .db
            .update_chapter(input.id, &changes)?
            .ok_or_else(|| AppError::NotFound("Chapter not found".to_string()))?;

        if chapter.is_published != was_published {
            let total = self.db.recount_novel_chapters(chapter.novel_id, true)?;
            tracing::info!(
                novel_id = chapter.novel_id,
                chapter_id = chapter.id,
                published = chapter.is_published,
                total,
                "Recounted chapters"
            );
        }

        Ok(chapter)
    }

    /// Delete a chapter and the reading history pointing at it, then
    /// recount the novel under the configured policy.
    pub fn delete_chapter(&self, id: i64) -> Result<Success> {
        let chapter = self
            .db
            .get_chapter(id)?
            .ok_or_else(|| AppError::NotFound("Chapter not found".to_string()))?;

        self.db.delete_chapter(id)?;
        let total = self
            .db
            .recount_novel_chapters(chapter.novel_id, self.delete_recount.published_only())?;

        tracing::info!(
            chapter_id = id,
            novel_id = chapter.novel_id,
            policy = ?self.delete_recount,
            total,
            "Chapter deleted"
        );
        Ok(Success::from(true))
    }
}
