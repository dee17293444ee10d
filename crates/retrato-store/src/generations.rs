// SPDX-License-Identifier: Apache-2.0

use retrato_core::GenerationId;
use retrato_model::{Generation, GenerationStatus, PortraitStyle};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{parse_timestamp, Db};
use crate::error::{StoreError, StoreErrorCode};

struct RawGeneration {
    id: String,
    style: String,
    status: String,
    original_path: String,
    generated_path: Option<String>,
    watermarked_path: Option<String>,
    created_at: String,
}

fn raw_generation(row: &Row<'_>) -> rusqlite::Result<RawGeneration> {
    Ok(RawGeneration {
        id: row.get(0)?,
        style: row.get(1)?,
        status: row.get(2)?,
        original_path: row.get(3)?,
        generated_path: row.get(4)?,
        watermarked_path: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn into_generation(raw: RawGeneration) -> Result<Generation, StoreError> {
    Ok(Generation {
        id: GenerationId::parse(&raw.id)
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))?,
        style: PortraitStyle::from_input(&raw.style),
        status: GenerationStatus::parse(&raw.status)
            .map_err(|e| StoreError::new(StoreErrorCode::Internal, e.to_string()))?,
        original_path: raw.original_path,
        generated_path: raw.generated_path,
        watermarked_path: raw.watermarked_path,
        created_at: parse_timestamp(&raw.created_at)?,
    })
}

impl Db {
    pub fn insert_generation(&self, generation: &Generation) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO generations
                 (id, style, status, original_path, generated_path, watermarked_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                generation.id.to_string(),
                generation.style.as_str(),
                generation.status.as_str(),
                generation.original_path,
                generation.generated_path,
                generation.watermarked_path,
                generation.created_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn generation(&self, id: GenerationId) -> Result<Option<Generation>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT id, style, status, original_path, generated_path, watermarked_path, created_at
                 FROM generations WHERE id = ?1",
                params![id.to_string()],
                raw_generation,
            )
            .optional()?;
        drop(conn);
        raw.map(into_generation).transpose()
    }

    pub fn set_generation_status(
        &self,
        id: GenerationId,
        status: GenerationStatus,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE generations SET status = ?2 WHERE id = ?1",
            params![id.to_string(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("generation {id} not found"),
            ));
        }
        Ok(())
    }

    pub fn complete_generation(
        &self,
        id: GenerationId,
        generated_path: &str,
        watermarked_path: &str,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE generations
                 SET status = 'completed', generated_path = ?2, watermarked_path = ?3
             WHERE id = ?1",
            params![id.to_string(), generated_path, watermarked_path],
        )?;
        if changed == 0 {
            return Err(StoreError::new(
                StoreErrorCode::NotFound,
                format!("generation {id} not found"),
            ));
        }
        Ok(())
    }
}
