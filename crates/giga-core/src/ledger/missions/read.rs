//! Mission read operations: list and get.

use anyhow::{Context, Result};
use sqlx::Row;
use std::path::PathBuf;

use super::super::db::MissionDb;
use super::super::record::RecoveryRecord;
use super::super::types::{MissionDetails, MissionId, MissionSettings, MissionSummary, QueueState};
use crate::mission::{MissionErrorKind, MissionKind};
use crate::postprocess::PostProcessingSpec;

impl MissionDb {
    /// All missions, newest first.
    pub async fn list_missions(&self) -> Result<Vec<MissionSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, state, final_path, total_size, error_kind
            FROM missions
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let state: String = row.get("state");
            let final_path: String = row.get("final_path");
            let error_kind: Option<String> = row.get("error_kind");
            out.push(MissionSummary {
                id: row.get("id"),
                kind: MissionKind::from_str(&kind),
                state: QueueState::from_str(&state),
                final_path: PathBuf::from(final_path),
                total_size: row.get("total_size"),
                error_kind: error_kind.as_deref().map(MissionErrorKind::from_str),
            });
        }

        Ok(out)
    }

    /// A single mission with its ledger, or `None` if the id is unknown.
    pub async fn get_mission(&self, id: MissionId) -> Result<Option<MissionDetails>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, kind, final_path, post_json, ledger_json, bitmap,
                state, error_kind, error_message, created_at, updated_at, settings_json
            FROM missions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let kind: String = row.get("kind");
        let final_path: String = row.get("final_path");
        let post_json: String = row.get("post_json");
        let ledger_json: String = row.get("ledger_json");
        let bitmap: Vec<u8> = row.get("bitmap");
        let state: String = row.get("state");
        let error_kind: Option<String> = row.get("error_kind");
        let settings_json: Option<String> = row.get("settings_json");

        let post: PostProcessingSpec = serde_json::from_str(&post_json)
            .with_context(|| format!("mission {}: bad post-processing spec", id))?;
        let mut record: RecoveryRecord = serde_json::from_str(&ledger_json)
            .with_context(|| format!("mission {}: bad ledger", id))?;
        record.bitmap = bitmap;
        let settings = settings_json
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(serde_json::from_str::<MissionSettings>)
            .transpose()?
            .unwrap_or_default();

        Ok(Some(MissionDetails {
            id: row.get("id"),
            kind: MissionKind::from_str(&kind),
            final_path: PathBuf::from(final_path),
            post,
            record,
            state: QueueState::from_str(&state),
            error_kind: error_kind.as_deref().map(MissionErrorKind::from_str),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            settings,
        }))
    }
}
