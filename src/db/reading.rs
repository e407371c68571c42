use super::{Database, ReadingHistory, now_timestamp};
use crate::error::{AppError, Result};
use rusqlite::{OptionalExtension, params};

const HISTORY_COLUMNS: &str =
    "id, user_id, novel_id, chapter_id, progress_percentage, last_read_at";

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingHistory> {
    Ok(ReadingHistory {
        id: row.get(0)?,
        user_id: row.get(1)?,
        novel_id: row.get(2)?,
        chapter_id: row.get(3)?,
        progress_percentage: row.get(4)?,
        last_read_at: row.get(5)?,
    })
}

/// Round to the two decimal places the progress column keeps.
pub(crate) fn round_progress(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Database {
    // ========== READING HISTORY OPERATIONS ==========

    /// Insert or update the single history row for (user, novel).
    ///
    /// An existing row keeps its ID; `last_read_at` never moves backwards.
    pub fn save_reading_progress(
        &self,
        user_id: i64,
        novel_id: i64,
        chapter_id: i64,
        progress_percentage: f64,
    ) -> Result<ReadingHistory> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "INSERT INTO reading_history
                    (user_id, novel_id, chapter_id, progress_percentage, last_read_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, novel_id) DO UPDATE SET
                    chapter_id = excluded.chapter_id,
                    progress_percentage = excluded.progress_percentage,
                    last_read_at = MAX(reading_history.last_read_at, excluded.last_read_at)
                 RETURNING {HISTORY_COLUMNS}"
            ),
            params![
                user_id,
                novel_id,
                chapter_id,
                round_progress(progress_percentage),
                now_timestamp(),
            ],
            row_to_history,
        )
        .map_err(|e| AppError::Internal(format!("Failed to save reading progress: {}", e)))
    }

    /// Get the history row for (user, novel).
    pub fn get_reading_progress(
        &self,
        user_id: i64,
        novel_id: i64,
    ) -> Result<Option<ReadingHistory>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {HISTORY_COLUMNS} FROM reading_history
                 WHERE user_id = ?1 AND novel_id = ?2"
            ),
            params![user_id, novel_id],
            row_to_history,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get reading progress: {}", e)))
    }

    /// Reading history of a user, most recent first.
    pub fn list_user_history(&self, user_id: i64, limit: Option<i64>) -> Result<Vec<ReadingHistory>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT h.id, h.user_id, h.novel_id, h.chapter_id, h.progress_percentage, h.last_read_at
                 FROM reading_history h
                 INNER JOIN novels n ON n.id = h.novel_id
                 INNER JOIN chapters c ON c.id = h.chapter_id
                 WHERE h.user_id = ?1
                 ORDER BY h.last_read_at DESC, h.id DESC
                 LIMIT ?2",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        // SQLite treats a negative LIMIT as "no limit"
        let history = stmt
            .query_map(params![user_id, limit.unwrap_or(-1)], row_to_history)
            .map_err(|e| AppError::Internal(format!("Failed to list reading history: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect reading history: {}", e)))?;

        Ok(history)
    }
}
