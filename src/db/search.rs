use super::catalog::{NOVEL_COLUMNS, placeholders, row_to_novel};
use super::schema::LOWER_FN;
use super::{Database, Novel, NovelStatus};
use crate::error::{AppError, Result};
use rusqlite::params_from_iter;
use rusqlite::types::Value;

/// Default page size for novel search.
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Novel search predicates. Absent fields match everything; present ones
/// are combined with AND.
#[derive(Debug, Clone)]
pub struct NovelFilter {
    /// Case-insensitive substring of the title or the author name.
    pub query: Option<String>,
    /// Match novels tagged with any of these genres.
    pub genre_ids: Option<Vec<i64>>,
    /// Exact status.
    pub status: Option<NovelStatus>,
    /// Exact author.
    pub author_id: Option<i64>,
    /// Maximum number of rows.
    pub limit: i64,
    /// Rows to skip after ordering.
    pub offset: i64,
}

impl Default for NovelFilter {
    fn default() -> Self {
        Self {
            query: None,
            genre_ids: None,
            status: None,
            author_id: None,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }
}

impl Database {
    /// Search novels, most recently updated first.
    pub fn search_novels(&self, filter: &NovelFilter) -> Result<Vec<Novel>> {
        let conn = self.conn.lock();

        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(genre_ids) = filter.genre_ids.as_ref().filter(|ids| !ids.is_empty()) {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT DISTINCT novel_id FROM novel_genres WHERE genre_id IN ({})",
                    placeholders(genre_ids.len())
                ))
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

            let novel_ids = stmt
                .query_map(params_from_iter(genre_ids.iter()), |row| row.get::<_, i64>(0))
                .map_err(|e| AppError::Internal(format!("Failed to match genres: {}", e)))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect genres: {}", e)))?;

            if novel_ids.is_empty() {
                tracing::debug!(?genre_ids, "No novels carry the requested genres");
                return Ok(Vec::new());
            }

            conditions.push(format!("n.id IN ({})", placeholders(novel_ids.len())));
            values.extend(novel_ids.into_iter().map(Value::Integer));
        }

        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            conditions.push(format!(
                "(instr({LOWER_FN}(n.title), ?) > 0 OR instr({LOWER_FN}(a.name), ?) > 0)"
            ));
            let needle = query.to_lowercase();
            values.push(Value::Text(needle.clone()));
            values.push(Value::Text(needle));
        }

        if let Some(status) = filter.status {
            conditions.push("n.status = ?".to_string());
            values.push(Value::Text(status.as_str().to_string()));
        }

        if let Some(author_id) = filter.author_id {
            conditions.push("n.author_id = ?".to_string());
            values.push(Value::Integer(author_id));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        values.push(Value::Integer(filter.limit));
        values.push(Value::Integer(filter.offset));

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {NOVEL_COLUMNS}
                 FROM novels n
                 INNER JOIN authors a ON a.id = n.author_id
                 {where_clause}
                 ORDER BY n.updated_at DESC, n.id DESC
                 LIMIT ? OFFSET ?"
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare search: {}", e)))?;

        let novels = stmt
            .query_map(params_from_iter(values), row_to_novel)
            .map_err(|e| AppError::Internal(format!("Failed to search novels: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect novels: {}", e)))?;

        Ok(novels)
    }
}
