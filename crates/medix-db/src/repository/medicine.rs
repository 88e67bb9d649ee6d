//! # Medicine Repository
//!
//! Catalog lookups for the settlement engine.
//!
//! Catalog CRUD belongs to the administration UI. This repository only
//! covers what settlement needs: existence / active checks inside a
//! checkout transaction, plus inserts for seeding and tests.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use medix_core::{Medicine, NewMedicine};

const MEDICINE_COLUMNS: &str = r#"
    id,
    name,
    generic_name,
    category,
    requires_prescription,
    is_active,
    created_at,
    updated_at
"#;

/// Repository for medicine catalog operations.
///
/// ## Usage
/// ```rust,ignore
/// let medicine = db.medicines().create(&new_medicine).await?;
/// let found = db.medicines().get_by_id(&medicine.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
}

impl MedicineRepository {
    /// Creates a new MedicineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicineRepository { pool }
    }

    /// Creates a catalog entry with a fresh id.
    pub async fn create(&self, new: &NewMedicine) -> DbResult<Medicine> {
        let now = Utc::now();
        let medicine = Medicine {
            id: generate_medicine_id(),
            name: new.name.trim().to_string(),
            generic_name: new.generic_name.clone(),
            category: new.category,
            requires_prescription: new.requires_prescription,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert(&medicine).await?;
        Ok(medicine)
    }

    /// Inserts a medicine as-is.
    pub async fn insert(&self, medicine: &Medicine) -> DbResult<()> {
        debug!(id = %medicine.id, name = %medicine.name, "Inserting medicine");

        sqlx::query(
            r#"
            INSERT INTO medicines (
                id, name, generic_name, category,
                requires_prescription, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&medicine.id)
        .bind(&medicine.name)
        .bind(&medicine.generic_name)
        .bind(medicine.category)
        .bind(medicine.requires_prescription)
        .bind(medicine.is_active)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a medicine by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Medicine))` - Medicine found (active or not)
    /// * `Ok(None)` - Medicine not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Medicine>> {
        Self::find_tx(&self.pool, id).await
    }

    /// Looks a medicine up on any executor (pool, connection or transaction).
    pub async fn find_tx<'e, E>(executor: E, id: &str) -> DbResult<Option<Medicine>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?1");
        let medicine = sqlx::query_as::<_, Medicine>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(medicine)
    }

    /// Lists active medicines sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Medicine>> {
        let sql =
            format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE is_active = 1 ORDER BY name");
        let medicines = sqlx::query_as::<_, Medicine>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(medicines)
    }

    /// Activates or deactivates a medicine.
    ///
    /// Deactivated medicines stay referenced by past sales but can no
    /// longer be sold.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting medicine active flag");

        let result =
            sqlx::query("UPDATE medicines SET is_active = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(id)
                .bind(active)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Medicine", id));
        }

        Ok(())
    }

    /// Counts catalog entries (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medicines")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new medicine ID.
pub fn generate_medicine_id() -> String {
    Uuid::new_v4().to_string()
}
