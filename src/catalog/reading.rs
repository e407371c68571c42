use super::{CatalogService, GetUserReadingHistoryInput, UpdateReadingProgressInput};
use crate::db::ReadingHistory;
use crate::error::{AppError, Result};

impl CatalogService {
    /// Record where a user is in a novel.
    ///
    /// Keeps a single row per (user, novel): a repeat visit overwrites the
    /// chapter and progress of the existing row.
    pub fn update_reading_progress(
        &self,
        input: UpdateReadingProgressInput,
    ) -> Result<ReadingHistory> {
        if self.db.get_user_by_id(input.user_id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "User with id {} not found",
                input.user_id
            )));
        }
        if self.db.get_novel(input.novel_id)?.is_none() {
            return Err(AppError::NotFound(format!(
                "Novel with id {} not found",
                input.novel_id
            )));
        }

        match self.db.get_chapter(input.chapter_id)? {
            None => {
                return Err(AppError::NotFound(format!(
                    "Chapter with id {} not found",
                    input.chapter_id
                )));
            }
            Some(chapter) if chapter.novel_id != input.novel_id => {
                return Err(AppError::NotFound(format!(
                    "Chapter with id {} not found for novel {}",
                    input.chapter_id, input.novel_id
                )));
            }
            Some(_) => {}
        }

        let entry = self.db.save_reading_progress(
            input.user_id,
            input.novel_id,
            input.chapter_id,
            input.progress_percentage,
        )?;

        tracing::debug!(
            user_id = entry.user_id,
            novel_id = entry.novel_id,
            chapter_id = entry.chapter_id,
            progress = entry.progress_percentage,
            "Reading progress saved"
        );
        Ok(entry)
    }

    /// Reading history of a user, most recent first.
    pub fn get_user_reading_history(
        &self,
        input: GetUserReadingHistoryInput,
    ) -> Result<Vec<ReadingHistory>> {
        self.db.list_user_history(input.user_id, input.limit)
    }
}
