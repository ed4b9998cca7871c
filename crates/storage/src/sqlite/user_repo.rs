use assess_core::model::{FormName, ProgressStatus, User, UserId};

use super::SqliteRepository;
use super::mapping::{conn_err, map_user_row, write_err};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn register_user(&self, user: &User, forms: &[FormName]) -> Result<(), StorageError> {
        let user_id = user.id().to_string();
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(conn_err)?;

        let existing = sqlx::query("SELECT 1 FROM users WHERE username = ?1 OR email = ?2")
            .bind(user.username().as_str())
            .bind(user.email().as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn_err)?;
        if existing.is_some() {
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r"
            INSERT INTO users (user_id, username, email, password_hash, otp, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&user_id)
        .bind(user.username().as_str())
        .bind(user.email().as_str())
        .bind(user.password_hash())
        .bind(user.otp())
        .bind(user.created_at())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        for form in forms {
            sqlx::query(
                r"
                INSERT INTO form_progress (user_id, form_name, current_progress, progress_status, last_updated)
                VALUES (?1, ?2, 0, ?3, ?4)
                ",
            )
            .bind(&user_id)
            .bind(form.as_str())
            .bind(ProgressStatus::NotStarted.as_str())
            .bind(user.created_at())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, username, email, password_hash, otp, created_at
            FROM users
            WHERE username = ?1 OR email = ?1
            ORDER BY username = ?1 DESC
            LIMIT 1
            ",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, username, email, password_hash, otp, created_at
            FROM users
            WHERE user_id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        row.as_ref().map(map_user_row).transpose()
    }
}
