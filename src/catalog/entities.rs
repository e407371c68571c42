//! Authors, genres and ad placements: plain CRUD with reference checks.

use super::{
    CatalogService, CreateAdPlacementInput, CreateAuthorInput, CreateGenreInput, Success,
    UpdateAdPlacementInput, UpdateAuthorInput, UpdateGenreInput,
};
use crate::db::{
    AdPlacement, AdPlacementChanges, Author, AuthorChanges, Genre, GenreChanges, NewAdPlacement,
    NewAuthor, NewGenre,
};
use crate::error::{AppError, Result};

impl CatalogService {
    // ========== AUTHORS ==========

    /// Create an author.
    pub fn create_author(&self, input: CreateAuthorInput) -> Result<Author> {
        let author = self.db.create_author(&NewAuthor {
            name: input.name,
            bio: input.bio,
            image_url: input.image_url,
        })?;

        tracing::info!(author_id = author.id, "Author created");
        Ok(author)
    }

    /// All authors.
    pub fn get_authors(&self) -> Result<Vec<Author>> {
        self.db.list_authors()
    }

    /// Update the supplied fields of an author.
    pub fn update_author(&self, input: UpdateAuthorInput) -> Result<Author> {
        let changes = AuthorChanges {
            name: input.name,
            bio: input.bio,
            image_url: input.image_url,
        };

        self.db
            .update_author(input.id, &changes)?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", input.id)))
    }

    /// Delete an author no novel refers to.
    pub fn delete_author(&self, id: i64) -> Result<Success> {
        if self.db.get_author(id)?.is_none() {
            return Err(AppError::NotFound("Author not found".to_string()));
        }

        let novels = self.db.count_novels_by_author(id)?;
        if novels > 0 {
            return Err(AppError::Conflict(
                "Cannot delete author with existing novels".to_string(),
            ));
        }

        let deleted = self.db.delete_author(id)?;
        tracing::info!(author_id = id, "Author deleted");
        Ok(Success::from(deleted))
    }

    // ========== GENRES ==========

    /// Create a genre. Names are unique.
    pub fn create_genre(&self, input: CreateGenreInput) -> Result<Genre> {
        let genre = self.db.create_genre(&NewGenre {
            name: input.name,
            description: input.description,
        })?;

        tracing::info!(genre_id = genre.id, name = %genre.name, "Genre created");
        Ok(genre)
    }

    /// All genres.
    pub fn get_genres(&self) -> Result<Vec<Genre>> {
        self.db.list_genres()
    }

    /// Update the supplied fields of a genre.
    pub fn update_genre(&self, input: UpdateGenreInput) -> Result<Genre> {
        let changes = GenreChanges {
            name: input.name,
            description: input.description,
        };

        self.db
            .update_genre(input.id, &changes)?
            .ok_or_else(|| AppError::NotFound(format!("Genre with id {} not found", input.id)))
    }

    /// Delete a genre no novel is tagged with.
    pub fn delete_genre(&self, id: i64) -> Result<Success> {
        if self.db.get_genre(id)?.is_none() {
            return Err(AppError::NotFound("Genre not found".to_string()));
        }

        if self.db.count_genre_usage(id)? > 0 {
            return Err(AppError::Conflict(
                "Cannot delete genre that is used by novels".to_string(),
            ));
        }

        let deleted = self.db.delete_genre(id)?;
        tracing::info!(genre_id = id, "Genre deleted");
        Ok(Success::from(deleted))
    }

    // ========== AD PLACEMENTS ==========

    /// Create an ad placement, active unless stated otherwise.
    pub fn create_ad_placement(&self, input: CreateAdPlacementInput) -> Result<AdPlacement> {
        let ad = self.db.create_ad_placement(&NewAdPlacement {
            name: input.name,
            placement_type: input.placement_type,
            ad_script: input.ad_script,
            is_active: input.is_active.unwrap_or(true),
        })?;

        tracing::info!(ad_id = ad.id, placement = ad.placement_type.as_str(), "Ad placement created");
        Ok(ad)
    }

    /// All ad placements.
    pub fn get_ad_placements(&self) -> Result<Vec<AdPlacement>> {
        self.db.list_ad_placements(false)
    }

    /// Ad placements currently served.
    pub fn get_active_ad_placements(&self) -> Result<Vec<AdPlacement>> {
        self.db.list_ad_placements(true)
    }

    /// Update the supplied fields of an ad placement.
    pub fn update_ad_placement(&self, input: UpdateAdPlacementInput) -> Result<AdPlacement> {
        let changes = AdPlacementChanges {
            name: input.name,
            placement_type: input.placement_type,
            ad_script: input.ad_script,
            is_active: input.is_active,
        };

        self.db.update_ad_placement(input.id, &changes)?.ok_or_else(|| {
            AppError::NotFound(format!("Ad placement with id {} not found", input.id))
        })
    }

    /// Delete an ad placement. Missing placements still report success.
    pub fn delete_ad_placement(&self, id: i64) -> Result<Success> {
        let removed = self.db.delete_ad_placement(id)?;
        tracing::info!(ad_id = id, removed, "Ad placement delete");
        Ok(Success::from(true))
    }
}
