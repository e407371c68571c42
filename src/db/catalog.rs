use super::{Author, Chapter, Database, Genre, Novel, NovelStatus, now_timestamp};
use crate::error::{AppError, Result, storage_error};
use rusqlite::{OptionalExtension, params, params_from_iter};

const AUTHOR_COLUMNS: &str = "id, name, bio, image_url, created_at, updated_at";
const GENRE_COLUMNS: &str = "id, name, description, created_at";
const NOVEL_FIELDS: &str = "id, title, description, author_id, cover_image_url, status, \
     is_featured, total_chapters, total_views, created_at, updated_at";
pub(super) const NOVEL_COLUMNS: &str = "n.id, n.title, n.description, n.author_id, n.cover_image_url, \
     n.status, n.is_featured, n.total_chapters, n.total_views, n.created_at, n.updated_at";
const CHAPTER_COLUMNS: &str =
    "id, novel_id, title, content, chapter_number, is_published, created_at, updated_at";

/// Fields for a new author.
#[derive(Debug, Clone)]
pub struct NewAuthor {
    /// Display name.
    pub name: String,
    /// Biography.
    pub bio: Option<String>,
    /// Portrait URL.
    pub image_url: Option<String>,
}

/// Sparse author update. The outer `Option` is "field supplied", the inner
/// one is the nullable column value.
#[derive(Debug, Clone, Default)]
pub struct AuthorChanges {
    /// New name.
    pub name: Option<String>,
    /// New biography (or `Some(None)` to clear).
    pub bio: Option<Option<String>>,
    /// New portrait URL (or `Some(None)` to clear).
    pub image_url: Option<Option<String>>,
}

/// Fields for a new genre.
#[derive(Debug, Clone)]
pub struct NewGenre {
    /// Unique name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

/// Sparse genre update.
#[derive(Debug, Clone, Default)]
pub struct GenreChanges {
    /// New name.
    pub name: Option<String>,
    /// New description (or `Some(None)` to clear).
    pub description: Option<Option<String>>,
}

/// Fields for a new novel. Counters always start at zero.
#[derive(Debug, Clone)]
pub struct NewNovel {
    /// Title.
    pub title: String,
    /// Synopsis.
    pub description: String,
    /// Owning author.
    pub author_id: i64,
    /// Cover URL.
    pub cover_image_url: Option<String>,
    /// Status.
    pub status: NovelStatus,
    /// Featured flag.
    pub is_featured: bool,
    /// Genres to associate.
    pub genre_ids: Vec<i64>,
}

/// Sparse novel update. Genre associations are handled separately.
#[derive(Debug, Clone, Default)]
pub struct NovelChanges {
    /// New title.
    pub title: Option<String>,
    /// New synopsis.
    pub description: Option<String>,
    /// New author.
    pub author_id: Option<i64>,
    /// New cover URL (or `Some(None)` to clear).
    pub cover_image_url: Option<Option<String>>,
    /// New status.
    pub status: Option<NovelStatus>,
    /// New featured flag.
    pub is_featured: Option<bool>,
}

/// Fields for a new chapter.
#[derive(Debug, Clone)]
pub struct NewChapter {
    /// Owning novel.
    pub novel_id: i64,
    /// Title.
    pub title: String,
    /// Full text.
    pub content: String,
    /// Ordering key.
    pub chapter_number: i64,
    /// Published flag.
    pub is_published: bool,
}

/// Sparse chapter update.
#[derive(Debug, Clone, Default)]
pub struct ChapterChanges {
    /// New title.
    pub title: Option<String>,
    /// New text.
    pub content: Option<String>,
    /// New ordering key.
    pub chapter_number: Option<i64>,
    /// New published flag.
    pub is_published: Option<bool>,
}

fn row_to_author(row: &rusqlite::Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        bio: row.get(2)?,
        image_url: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn row_to_genre(row: &rusqlite::Row<'_>) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(super) fn row_to_novel(row: &rusqlite::Row<'_>) -> rusqlite::Result<Novel> {
    Ok(Novel {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        author_id: row.get(3)?,
        cover_image_url: row.get(4)?,
        status: row.get(5)?,
        is_featured: row.get(6)?,
        total_chapters: row.get(7)?,
        total_views: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn row_to_chapter(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get(0)?,
        novel_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        chapter_number: row.get(4)?,
        is_published: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Comma-separated `?` list for an `IN (...)` clause.
pub(super) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl Database {
    // ========== AUTHOR OPERATIONS ==========

    /// Create author.
    pub fn create_author(&self, author: &NewAuthor) -> Result<Author> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "INSERT INTO authors (name, bio, image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 RETURNING {AUTHOR_COLUMNS}"
            ),
            params![author.name, author.bio, author.image_url, now_timestamp()],
            row_to_author,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create author: {}", e)))
    }

    /// Get author by ID.
    pub fn get_author(&self, id: i64) -> Result<Option<Author>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"),
            params![id],
            row_to_author,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get author: {}", e)))
    }

    /// List all authors.
    pub fn list_authors(&self) -> Result<Vec<Author>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY id"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let authors = stmt
            .query_map([], row_to_author)
            .map_err(|e| AppError::Internal(format!("Failed to list authors: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect authors: {}", e)))?;

        Ok(authors)
    }

    /// Apply a sparse update. Returns `None` when the author does not exist.
    pub fn update_author(&self, id: i64, changes: &AuthorChanges) -> Result<Option<Author>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE authors SET
                    name = COALESCE(?2, name),
                    bio = CASE WHEN ?3 THEN ?4 ELSE bio END,
                    image_url = CASE WHEN ?5 THEN ?6 ELSE image_url END,
                    updated_at = ?7
                 WHERE id = ?1
                 RETURNING {AUTHOR_COLUMNS}"
            ),
            params![
                id,
                changes.name,
                changes.bio.is_some(),
                changes.bio.clone().flatten(),
                changes.image_url.is_some(),
                changes.image_url.clone().flatten(),
                now_timestamp(),
            ],
            row_to_author,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to update author: {}", e)))
    }

    /// Number of novels referencing an author.
    pub fn count_novels_by_author(&self, author_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM novels WHERE author_id = ?1",
            params![author_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count novels: {}", e)))
    }

    /// Delete author.
    pub fn delete_author(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM authors WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete author: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== GENRE OPERATIONS ==========

    /// Create genre.
    pub fn create_genre(&self, genre: &NewGenre) -> Result<Genre> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "INSERT INTO genres (name, description, created_at)
                 VALUES (?1, ?2, ?3)
                 RETURNING {GENRE_COLUMNS}"
            ),
            params![genre.name, genre.description, now_timestamp()],
            row_to_genre,
        )
        .map_err(storage_error("Failed to create genre", || {
            format!("Genre '{}' already exists", genre.name)
        }))
    }

    /// Get genre by ID.
    pub fn get_genre(&self, id: i64) -> Result<Option<Genre>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {GENRE_COLUMNS} FROM genres WHERE id = ?1"),
            params![id],
            row_to_genre,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get genre: {}", e)))
    }

    /// List all genres.
    pub fn list_genres(&self) -> Result<Vec<Genre>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {GENRE_COLUMNS} FROM genres ORDER BY name"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let genres = stmt
            .query_map([], row_to_genre)
            .map_err(|e| AppError::Internal(format!("Failed to list genres: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect genres: {}", e)))?;

        Ok(genres)
    }

    /// Apply a sparse update. Genres have no `updated_at`.
    pub fn update_genre(&self, id: i64, changes: &GenreChanges) -> Result<Option<Genre>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE genres SET
                    name = COALESCE(?2, name),
                    description = CASE WHEN ?3 THEN ?4 ELSE description END
                 WHERE id = ?1
                 RETURNING {GENRE_COLUMNS}"
            ),
            params![
                id,
                changes.name,
                changes.description.is_some(),
                changes.description.clone().flatten(),
            ],
            row_to_genre,
        )
        .optional()
        .map_err(storage_error("Failed to update genre", || {
            format!(
                "Genre '{}' already exists",
                changes.name.as_deref().unwrap_or_default()
            )
        }))
    }

    /// Number of novel associations referencing a genre.
    pub fn count_genre_usage(&self, genre_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM novel_genres WHERE genre_id = ?1",
            params![genre_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Internal(format!("Failed to count genre usage: {}", e)))
    }

    /// Return the subset of `ids` with no matching genre row.
    pub fn missing_genre_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id FROM genres WHERE id IN ({})",
                placeholders(ids.len())
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let found = stmt
            .query_map(params_from_iter(ids.iter()), |row| row.get::<_, i64>(0))
            .map_err(|e| AppError::Internal(format!("Failed to look up genres: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect genres: {}", e)))?;

        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }

    /// Delete genre.
    pub fn delete_genre(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM genres WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete genre: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== NOVEL OPERATIONS ==========

    /// Create a novel and its genre associations.
    pub fn create_novel(&self, novel: &NewNovel) -> Result<Novel> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let created = tx
            .query_row(
                &format!(
                    "INSERT INTO novels
                        (title, description, author_id, cover_image_url, status, is_featured,
                         total_chapters, total_views, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?7)
                     RETURNING {NOVEL_FIELDS}"
                ),
                params![
                    novel.title,
                    novel.description,
                    novel.author_id,
                    novel.cover_image_url,
                    novel.status,
                    novel.is_featured,
                    now_timestamp(),
                ],
                row_to_novel,
            )
            .map_err(|e| AppError::Internal(format!("Failed to create novel: {}", e)))?;

        for genre_id in &novel.genre_ids {
            tx.execute(
                "INSERT OR IGNORE INTO novel_genres (novel_id, genre_id) VALUES (?1, ?2)",
                params![created.id, genre_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to associate genre: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit: {}", e)))?;
        Ok(created)
    }

    /// Get novel by ID.
    pub fn get_novel(&self, id: i64) -> Result<Option<Novel>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {NOVEL_FIELDS} FROM novels WHERE id = ?1"),
            params![id],
            row_to_novel,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get novel: {}", e)))
    }

    /// List novels with an existing author, optionally only featured ones.
    pub fn list_novels(&self, featured_only: bool) -> Result<Vec<Novel>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NOVEL_COLUMNS}
                 FROM novels n
                 INNER JOIN authors a ON a.id = n.author_id
                 WHERE (?1 = 0 OR n.is_featured = 1)
                 ORDER BY n.id"
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let novels = stmt
            .query_map(params![featured_only], row_to_novel)
            .map_err(|e| AppError::Internal(format!("Failed to list novels: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect novels: {}", e)))?;

        Ok(novels)
    }

    /// Apply a sparse update. Returns `None` when the novel does not exist.
    pub fn update_novel(&self, id: i64, changes: &NovelChanges) -> Result<Option<Novel>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE novels SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    author_id = COALESCE(?4, author_id),
                    cover_image_url = CASE WHEN ?5 THEN ?6 ELSE cover_image_url END,
                    status = COALESCE(?7, status),
                    is_featured = COALESCE(?8, is_featured),
                    updated_at = ?9
                 WHERE id = ?1
                 RETURNING {NOVEL_FIELDS}"
            ),
            params![
                id,
                changes.title,
                changes.description,
                changes.author_id,
                changes.cover_image_url.is_some(),
                changes.cover_image_url.clone().flatten(),
                changes.status,
                changes.is_featured,
                now_timestamp(),
            ],
            row_to_novel,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to update novel: {}", e)))
    }

    /// Replace the full genre association set of a novel.
    pub fn replace_novel_genres(&self, novel_id: i64, genre_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM novel_genres WHERE novel_id = ?1",
            params![novel_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to clear genres: {}", e)))?;

        for genre_id in genre_ids {
            tx.execute(
                "INSERT OR IGNORE INTO novel_genres (novel_id, genre_id) VALUES (?1, ?2)",
                params![novel_id, genre_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to associate genre: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    /// Genre IDs associated with a novel.
    pub fn novel_genre_ids(&self, novel_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT genre_id FROM novel_genres WHERE novel_id = ?1 ORDER BY genre_id")
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let ids = stmt
            .query_map(params![novel_id], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to list novel genres: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect novel genres: {}", e)))?;

        Ok(ids)
    }

    /// Delete a novel with its reading history, genre links and chapters.
    pub fn delete_novel(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        // Dependency order: history -> genre links -> chapters -> novel
        tx.execute("DELETE FROM reading_history WHERE novel_id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete reading history: {}", e)))?;
        tx.execute("DELETE FROM novel_genres WHERE novel_id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete novel genres: {}", e)))?;
        tx.execute("DELETE FROM chapters WHERE novel_id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete chapters: {}", e)))?;
        let rows = tx
            .execute("DELETE FROM novels WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete novel: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit: {}", e)))?;
        Ok(rows > 0)
    }

    /// Atomically add one view to a novel.
    pub fn increment_novel_views(&self, novel_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE novels SET total_views = total_views + 1, updated_at = ?2 WHERE id = ?1",
            params![novel_id, now_timestamp()],
        )
        .map_err(|e| AppError::Internal(format!("Failed to increment views: {}", e)))?;
        Ok(())
    }

    /// Recount a novel's chapters from the chapter table and store the result
    /// in `total_chapters`. Returns the new count.
    pub fn recount_novel_chapters(&self, novel_id: i64, published_only: bool) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "UPDATE novels SET
                total_chapters = (
                    SELECT COUNT(*) FROM chapters
                    WHERE novel_id = ?1 AND (?2 = 0 OR is_published = 1)
                ),
                updated_at = ?3
             WHERE id = ?1
             RETURNING total_chapters",
            params![novel_id, published_only, now_timestamp()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to recount chapters: {}", e)))
        .map(|count| count.unwrap_or_default())
    }

    // ========== CHAPTER OPERATIONS ==========

    /// Create chapter.
    pub fn create_chapter(&self, chapter: &NewChapter) -> Result<Chapter> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "INSERT INTO chapters
                    (novel_id, title, content, chapter_number, is_published, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 RETURNING {CHAPTER_COLUMNS}"
            ),
            params![
                chapter.novel_id,
                chapter.title,
                chapter.content,
                chapter.chapter_number,
                chapter.is_published,
                now_timestamp(),
            ],
            row_to_chapter,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create chapter: {}", e)))
    }

    /// Get chapter by ID.
    pub fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?1"),
            params![id],
            row_to_chapter,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get chapter: {}", e)))
    }

    /// Chapters of a novel ordered by chapter number.
    pub fn list_chapters(&self, novel_id: i64, published_only: bool) -> Result<Vec<Chapter>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CHAPTER_COLUMNS} FROM chapters
                 WHERE novel_id = ?1 AND (?2 = 0 OR is_published = 1)
                 ORDER BY chapter_number, id"
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let chapters = stmt
            .query_map(params![novel_id, published_only], row_to_chapter)
            .map_err(|e| AppError::Internal(format!("Failed to list chapters: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect chapters: {}", e)))?;

        Ok(chapters)
    }

    /// Apply a sparse update. Returns `None` when the chapter does not exist.
    pub fn update_chapter(&self, id: i64, changes: &ChapterChanges) -> Result<Option<Chapter>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE chapters SET
                    title = COALESCE(?2, title),
                    content = COALESCE(?3, content),
                    chapter_number = COALESCE(?4, chapter_number),
                    is_published = COALESCE(?5, is_published),
                    updated_at = ?6
                 WHERE id = ?1
                 RETURNING {CHAPTER_COLUMNS}"
            ),
            params![
                id,
                changes.title,
                changes.content,
                changes.chapter_number,
                changes.is_published,
                now_timestamp(),
            ],
            row_to_chapter,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to update chapter: {}", e)))
    }

    /// Delete a chapter after removing the reading history pointing at it.
    pub fn delete_chapter(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM reading_history WHERE chapter_id = ?1",
            params![id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to delete reading history: {}", e)))?;
        let rows = tx
            .execute("DELETE FROM chapters WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete chapter: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit: {}", e)))?;
        Ok(rows > 0)
    }
}
