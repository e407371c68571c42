use super::{AdPlacement, Database, PlacementType, now_timestamp};
use crate::error::{AppError, Result};
use rusqlite::{OptionalExtension, params};

const AD_COLUMNS: &str = "id, name, placement_type, ad_script, is_active, created_at, updated_at";

/// Fields for a new ad placement.
#[derive(Debug, Clone)]
pub struct NewAdPlacement {
    /// Admin-facing name.
    pub name: String,
    /// Slot kind.
    pub placement_type: PlacementType,
    /// Raw script.
    pub ad_script: String,
    /// Active flag.
    pub is_active: bool,
}

/// Sparse ad placement update.
#[derive(Debug, Clone, Default)]
pub struct AdPlacementChanges {
    /// New name.
    pub name: Option<String>,
    /// New slot kind.
    pub placement_type: Option<PlacementType>,
    /// New script.
    pub ad_script: Option<String>,
    /// New active flag.
    pub is_active: Option<bool>,
}

fn row_to_ad(row: &rusqlite::Row<'_>) -> rusqlite::Result<AdPlacement> {
    Ok(AdPlacement {
        id: row.get(0)?,
        name: row.get(1)?,
        placement_type: row.get(2)?,
        ad_script: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    // ========== AD PLACEMENT OPERATIONS ==========

    /// Create ad placement.
    pub fn create_ad_placement(&self, ad: &NewAdPlacement) -> Result<AdPlacement> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "INSERT INTO ad_placements
                    (name, placement_type, ad_script, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 RETURNING {AD_COLUMNS}"
            ),
            params![
                ad.name,
                ad.placement_type,
                ad.ad_script,
                ad.is_active,
                now_timestamp(),
            ],
            row_to_ad,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create ad placement: {}", e)))
    }

    /// List ad placements, optionally only active ones.
    pub fn list_ad_placements(&self, active_only: bool) -> Result<Vec<AdPlacement>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {AD_COLUMNS} FROM ad_placements
                 WHERE (?1 = 0 OR is_active = 1)
                 ORDER BY id"
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let ads = stmt
            .query_map(params![active_only], row_to_ad)
            .map_err(|e| AppError::Internal(format!("Failed to list ad placements: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect ad placements: {}", e)))?;

        Ok(ads)
    }

    /// Apply a sparse update. Returns `None` when the placement does not exist.
    pub fn update_ad_placement(
        &self,
        id: i64,
        changes: &AdPlacementChanges,
    ) -> Result<Option<AdPlacement>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "UPDATE ad_placements SET
                    name = COALESCE(?2, name),
                    placement_type = COALESCE(?3, placement_type),
                    ad_script = COALESCE(?4, ad_script),
                    is_active = COALESCE(?5, is_active),
                    updated_at = ?6
                 WHERE id = ?1
                 RETURNING {AD_COLUMNS}"
            ),
            params![
                id,
                changes.name,
                changes.placement_type,
                changes.ad_script,
                changes.is_active,
                now_timestamp(),
            ],
            row_to_ad,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to update ad placement: {}", e)))
    }

    /// Delete ad placement.
    pub fn delete_ad_placement(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM ad_placements WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete ad placement: {}", e)))?;
        Ok(rows > 0)
    }
}
