use assess_core::model::{FormName, Question};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn_err, ser, write_err};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn list_questions(&self, form_name: FormName) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT serial_number, question
            FROM questions
            WHERE form_name = ?1
            ORDER BY serial_number ASC
            ",
        )
        .bind(form_name.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let serial: i64 = row.try_get("serial_number").map_err(ser)?;
            let id = u32::try_from(serial)
                .map_err(|_| StorageError::Serialization(format!("invalid serial: {serial}")))?;
            out.push(Question::new(id, row.try_get::<String, _>("question").map_err(ser)?));
        }
        Ok(out)
    }

    async fn replace_questions(
        &self,
        form_name: FormName,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(conn_err)?;

        sqlx::query("DELETE FROM questions WHERE form_name = ?1")
            .bind(form_name.as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn_err)?;

        for question in questions {
            sqlx::query(
                r"
                INSERT INTO questions (form_name, serial_number, question)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(form_name.as_str())
            .bind(i64::from(question.id))
            .bind(&question.text)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn_err)?;
        Ok(())
    }
}
