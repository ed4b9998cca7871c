use assess_core::model::{UserDetails, UserId};

use super::SqliteRepository;
use super::mapping::{conn_err, map_details_row, write_err};
use crate::repository::{StorageError, UserDetailsRepository};

#[async_trait::async_trait]
impl UserDetailsRepository for SqliteRepository {
    async fn get_details(&self, user_id: UserId) -> Result<Option<UserDetails>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                user_id, name, age, gender, date_of_birth, contact_number, email_id,
                address, educational_qualification, organization_company, any_illness,
                signature_confirmation, created_at, updated_at
            FROM user_details
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn_err)?;

        row.as_ref().map(map_details_row).transpose()
    }

    async fn save_details(&self, details: &UserDetails) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO user_details (
                user_id, name, age, gender, date_of_birth, contact_number, email_id,
                address, educational_qualification, organization_company, any_illness,
                signature_confirmation, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                gender = excluded.gender,
                date_of_birth = excluded.date_of_birth,
                contact_number = excluded.contact_number,
                email_id = excluded.email_id,
                address = excluded.address,
                educational_qualification = excluded.educational_qualification,
                organization_company = excluded.organization_company,
                any_illness = excluded.any_illness,
                signature_confirmation = excluded.signature_confirmation,
                updated_at = excluded.updated_at
            ",
        )
        .bind(details.user_id().to_string())
        .bind(details.name())
        .bind(details.age().map(i64::from))
        .bind(details.gender())
        .bind(details.date_of_birth())
        .bind(details.contact_number())
        .bind(details.email_id())
        .bind(details.address())
        .bind(details.educational_qualification())
        .bind(details.organization_company())
        .bind(details.any_illness())
        .bind(details.signature_confirmation())
        .bind(details.created_at())
        .bind(details.updated_at())
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_database_error()
                    .is_some_and(|db| db.is_foreign_key_violation()) =>
            {
                Err(StorageError::NotFound)
            }
            Err(err) => Err(write_err(err)),
        }
    }
}
