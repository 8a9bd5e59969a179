//! Mission write operations: add, checkpoint, state, remove.

use anyhow::{anyhow, Result};
use sqlx::Row;

use super::super::db::{unix_timestamp, MissionDb};
use super::super::record::RecoveryRecord;
use super::super::types::{MissionId, NewMission, QueueState};
use crate::mission::MissionErrorKind;

fn total_size(record: &RecoveryRecord) -> Option<i64> {
    record.total_length().map(|n| n as i64)
}

impl MissionDb {
    /// Insert a new queued mission.
    pub async fn add_mission(&self, mission: &NewMission) -> Result<MissionId> {
        let now = unix_timestamp();
        let post_json = serde_json::to_string(&mission.post)?;
        let ledger_json = serde_json::to_string(&mission.record)?;
        let settings_json = serde_json::to_string(&mission.settings)?;

        let row_id = sqlx::query(
            r#"
            INSERT INTO missions (
                kind, final_path, post_json, ledger_json, bitmap, total_size,
                state, error_kind, error_message, created_at, updated_at, settings_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                      ?7, NULL, NULL, ?8, ?9, ?10)
            "#,
        )
        .bind(mission.kind.as_str())
        .bind(mission.final_path.to_string_lossy().into_owned())
        .bind(post_json)
        .bind(ledger_json)
        .bind(&mission.record.bitmap)
        .bind(total_size(&mission.record))
        .bind(QueueState::Queued.as_str())
        .bind(now)
        .bind(now)
        .bind(settings_json)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Persist a full checkpoint: layout, validators and bitmap.
    pub async fn save_ledger(&self, id: MissionId, record: &RecoveryRecord) -> Result<()> {
        let now = unix_timestamp();
        let ledger_json = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            UPDATE missions
            SET ledger_json = ?1,
                bitmap = ?2,
                total_size = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(ledger_json)
        .bind(&record.bitmap)
        .bind(total_size(record))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update only the completed-block bitmap.
    pub async fn update_bitmap(&self, id: MissionId, bitmap: &[u8]) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE missions
            SET bitmap = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(bitmap)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Forget layout and progress after completion; source URLs stay.
    pub async fn clear_ledger(&self, id: MissionId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT ledger_json FROM missions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(anyhow!("mission {} not found", id));
        };
        let ledger_json: String = row.get("ledger_json");
        let mut record: RecoveryRecord = serde_json::from_str(&ledger_json)?;
        record.reset_plan();

        sqlx::query(
            r#"
            UPDATE missions
            SET ledger_json = ?1,
                bitmap = x'',
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(serde_json::to_string(&record)?)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Update the queue state. Leaving `Error` clears the stored error.
    pub async fn set_state(&self, id: MissionId, state: QueueState) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE missions
            SET state = ?1,
                error_kind = NULL,
                error_message = NULL,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(state.as_str())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark the mission failed with a classified error.
    pub async fn set_error(
        &self,
        id: MissionId,
        kind: MissionErrorKind,
        message: &str,
    ) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE missions
            SET state = 'error',
                error_kind = ?1,
                error_message = ?2,
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(kind.as_str())
        .bind(message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Reset missions left `running` (e.g. after a crash) to `queued`.
    /// Returns how many were reset.
    pub async fn recover_running_missions(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE missions
            SET state = 'queued',
                updated_at = ?1
            WHERE state = 'running'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Atomically claim the oldest queued mission by marking it running.
    pub async fn next_queued_mission(&self) -> Result<Option<MissionId>> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            SELECT id FROM missions
            WHERE state = 'queued'
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: i64 = row.get("id");
        sqlx::query(
            r#"
            UPDATE missions
            SET state = 'running',
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(id))
    }

    /// Delete the row. Removing files is up to the caller.
    pub async fn remove_mission(&self, id: MissionId) -> Result<()> {
        sqlx::query("DELETE FROM missions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
