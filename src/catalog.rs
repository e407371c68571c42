//! Catalog handlers.
//!
//! Each handler takes an already validated input, enforces the referential
//! rules of the catalog (existence checks, blocked deletes, derived counters)
//! and talks to storage exclusively through [`Database`].

mod chapters;
mod entities;
mod input;
mod novels;
mod reading;
mod users;

pub use input::{
    CreateAdPlacementInput, CreateAuthorInput, CreateChapterInput, CreateGenreInput,
    CreateNovelInput, CreateUserInput, GetChaptersInput, GetUserReadingHistoryInput, LoginInput,
    SearchNovelsInput, UpdateAdPlacementInput, UpdateAuthorInput, UpdateChapterInput,
    UpdateGenreInput, UpdateNovelInput, UpdateReadingProgressInput, UpdateUserInput, Validate,
};

use crate::config::ChapterCountPolicy;
use crate::db::Database;
use serde::Serialize;

/// Outcome of a delete procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Success {
    /// Whether the record existed and was removed.
    pub success: bool,
}

impl From<bool> for Success {
    fn from(success: bool) -> Self {
        Self { success }
    }
}

/// Business rules over the persistence gateway.
#[derive(Clone)]
pub struct CatalogService {
    db: Database,
    delete_recount: ChapterCountPolicy,
}

impl CatalogService {
    /// Create a catalog service.
    pub fn new(db: Database, delete_recount: ChapterCountPolicy) -> Self {
        Self { db, delete_recount }
    }

    /// Underlying database.
    pub fn db(&self) -> &Database {
        &self.db
    }
}
