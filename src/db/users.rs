use super::{Database, Session, User, now_timestamp};
use crate::error::{AppError, Result, storage_error};
use rusqlite::{OptionalExtension, params};

const USER_COLUMNS: &str = "id, email, username, password_hash, is_admin, created_at, updated_at";

/// Fields for a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email address.
    pub email: String,
    /// Username.
    pub username: String,
    /// Argon2 password hash.
    pub password_hash: String,
    /// Admin flag.
    pub is_admin: bool,
}

/// Sparse user update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    /// New email.
    pub email: Option<String>,
    /// New username.
    pub username: Option<String>,
    /// New password hash.
    pub password_hash: Option<String>,
    /// New admin flag.
    pub is_admin: Option<bool>,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.query_row(
            &format!(
                "INSERT INTO users (email, username, password_hash, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 RETURNING {USER_COLUMNS}"
            ),
            params![user.email, user.username, user.password_hash, user.is_admin, now],
            row_to_user,
        )
        .map_err(storage_error("Failed to create user", || {
            format!(
                "User with email '{}' or username '{}' already exists",
                user.email, user.username
            )
        }))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by username or email.
    pub fn get_user_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 OR email = ?1"),
            params![identifier],
            row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], row_to_user)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Apply a sparse update. Returns `None` when the user does not exist.
    pub fn update_user(&self, id: i64, changes: &UserChanges) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE users SET
                    email = COALESCE(?2, email),
                    username = COALESCE(?3, username),
                    password_hash = COALESCE(?4, password_hash),
                    is_admin = COALESCE(?5, is_admin),
                    updated_at = ?6
                 WHERE id = ?1
                 RETURNING {USER_COLUMNS}"
            ),
            params![
                id,
                changes.email,
                changes.username,
                changes.password_hash,
                changes.is_admin,
                now_timestamp(),
            ],
            row_to_user,
        )
        .optional()
        .map_err(storage_error("Failed to update user", || {
            "Email or username already taken".to_string()
        }))
    }

    /// Delete a user together with its reading history and sessions.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        tx.execute("DELETE FROM reading_history WHERE user_id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete reading history: {}", e)))?;
        let rows = tx
            .execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }
}
