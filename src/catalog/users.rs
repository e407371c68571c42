use super::{CatalogService, CreateUserInput, Success, UpdateUserInput};
use crate::auth::hash_password;
use crate::db::{NewUser, User, UserChanges};
use crate::error::{AppError, Result};

impl CatalogService {
    /// Create a user with a hashed password.
    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let user = self.db.create_user(&NewUser {
            password_hash: hash_password(&input.password)?,
            email: input.email,
            username: input.username,
            is_admin: input.is_admin.unwrap_or(false),
        })?;

        tracing::info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// All users.
    pub fn get_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Update the supplied fields of a user.
    pub fn update_user(&self, input: UpdateUserInput) -> Result<User> {
        let changes = UserChanges {
            email: input.email,
            username: input.username,
            password_hash: input.password.as_deref().map(hash_password).transpose()?,
            is_admin: input.is_admin,
        };

        self.db
            .update_user(input.id, &changes)?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", input.id)))
    }

    /// Delete a user together with their reading history.
    pub fn delete_user(&self, id: i64) -> Result<Success> {
        if !self.db.delete_user(id)? {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(user_id = id, "User deleted");
        Ok(Success::from(true))
    }
}
