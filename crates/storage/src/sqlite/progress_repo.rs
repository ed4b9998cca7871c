use assess_core::model::{FormName, FormProgress, ResponseRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn_err, id_to_i64, map_progress_row, map_record_row};
use crate::repository::{
    FormProgressRepository, FormWrite, FormWriteError, FormWriteOutcome, ProgressPersistence,
    ResponseRepository, StorageError,
};

#[async_trait::async_trait]
impl FormProgressRepository for SqliteRepository {
    async fn list_progress(&self, user_id: UserId) -> Result<Vec<FormProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT form_id, user_id, form_name, current_progress, progress_status, last_updated
            FROM form_progress
            WHERE user_id = ?1
            ORDER BY form_id ASC
            ",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        out.sort_by_key(FormProgress::form_name);
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ResponseRepository for SqliteRepository {
    async fn get_responses(
        &self,
        user_id: UserId,
        form_name: FormName,
    ) -> Result<Option<ResponseRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, form_id, form_name, responses, created_at, updated_at
            FROM records
            WHERE user_id = ?1 AND form_name = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(form_name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        row.as_ref().map(map_record_row).transpose()
    }
}

#[async_trait::async_trait]
impl ProgressPersistence for SqliteRepository {
    async fn apply_form_write(
        &self,
        write: &FormWrite,
    ) -> Result<FormWriteOutcome, FormWriteError> {
        let user_id = write.user_id.to_string();
        let form_name = write.form_name.as_str();

        // Take the write lock before reading; a deferred read cannot be
        // upgraded once another writer has committed under WAL.
        // Dropping `tx` on any early return rolls both writes back.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(conn_err)?;

        let row = sqlx::query(
            r"
            SELECT form_id, user_id, form_name, current_progress, progress_status, last_updated
            FROM form_progress
            WHERE user_id = ?1 AND form_name = ?2
            ",
        )
        .bind(&user_id)
        .bind(form_name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn_err)?
        .ok_or(FormWriteError::UnknownForm(write.form_name))?;

        let mut progress = map_progress_row(&row)?;
        progress.apply(write.action, write.policy, write.at)?;
        let form_id = id_to_i64("form_id", progress.id().value())?;

        sqlx::query(
            r"
            UPDATE form_progress
            SET current_progress = ?1, progress_status = ?2, last_updated = ?3
            WHERE form_id = ?4
            ",
        )
        .bind(i64::from(progress.marker().value()))
        .bind(progress.status().as_str())
        .bind(progress.last_updated())
        .bind(form_id)
        .execute(&mut *tx)
        .await
        .map_err(conn_err)?;

        sqlx::query(
            r"
            INSERT INTO records (user_id, form_id, form_name, responses, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(user_id, form_name) DO UPDATE SET
                -- keep id and created_at from the first save
                form_id = excluded.form_id,
                responses = excluded.responses,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&user_id)
        .bind(form_id)
        .bind(form_name)
        .bind(write.responses.to_json_string())
        .bind(write.at)
        .execute(&mut *tx)
        .await
        .map_err(conn_err)?;

        let record_row = sqlx::query(
            r"
            SELECT id, user_id, form_id, form_name, responses, created_at, updated_at
            FROM records
            WHERE user_id = ?1 AND form_name = ?2
            ",
        )
        .bind(&user_id)
        .bind(form_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn_err)?;
        let record = map_record_row(&record_row)?;

        tx.commit().await.map_err(conn_err)?;

        Ok(FormWriteOutcome { progress, record })
    }
}
