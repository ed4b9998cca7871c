use assess_core::model::{
    FormName, FormProgress, FormProgressId, ProgressMarker, ProgressStatus, ResponsePayload,
    ResponseRecord, ResponseRecordId, User, UserDetails, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{SessionRecord, StorageError};
use assess_core::model::SessionToken;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps a driver error to `Conflict` for unique violations, `Connection` otherwise.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn conn_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn user_id_from_text(raw: &str) -> Result<UserId, StorageError> {
    raw.parse::<UserId>().map_err(ser)
}

pub(crate) fn form_name_from_text(raw: &str) -> Result<FormName, StorageError> {
    raw.parse::<FormName>().map_err(ser)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    User::from_persisted(
        user_id_from_text(&user_id)?,
        row.try_get("username").map_err(ser)?,
        row.try_get("email").map_err(ser)?,
        row.try_get("password_hash").map_err(ser)?,
        row.try_get("otp").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    let token: String = row.try_get("token").map_err(ser)?;
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    Ok(SessionRecord {
        token: SessionToken::from_raw(&token)
            .ok_or_else(|| StorageError::Serialization("blank session token".into()))?,
        user_id: user_id_from_text(&user_id)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        expires_at: row.try_get("expires_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<FormProgress, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let form_name: String = row.try_get("form_name").map_err(ser)?;
    let status: String = row.try_get("progress_status").map_err(ser)?;
    let marker: i64 = row.try_get("current_progress").map_err(ser)?;
    let marker = u32::try_from(marker)
        .map_err(|_| StorageError::Serialization(format!("invalid current_progress: {marker}")))?;

    Ok(FormProgress::from_persisted(
        FormProgressId::new(i64_to_u64(
            "form_id",
            row.try_get::<i64, _>("form_id").map_err(ser)?,
        )?),
        user_id_from_text(&user_id)?,
        form_name_from_text(&form_name)?,
        ProgressMarker::new(marker),
        status.parse::<ProgressStatus>().map_err(ser)?,
        row.try_get("last_updated").map_err(ser)?,
    ))
}

pub(crate) fn map_record_row(row: &SqliteRow) -> Result<ResponseRecord, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let form_name: String = row.try_get("form_name").map_err(ser)?;
    let responses: String = row.try_get("responses").map_err(ser)?;

    Ok(ResponseRecord {
        id: ResponseRecordId::new(i64_to_u64(
            "id",
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?),
        user_id: user_id_from_text(&user_id)?,
        form_id: FormProgressId::new(i64_to_u64(
            "form_id",
            row.try_get::<i64, _>("form_id").map_err(ser)?,
        )?),
        form_name: form_name_from_text(&form_name)?,
        responses: ResponsePayload::from_json_str(&responses).map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_details_row(row: &SqliteRow) -> Result<UserDetails, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let age = row
        .try_get::<Option<i64>, _>("age")
        .map_err(ser)?
        .map(|age| {
            u8::try_from(age).map_err(|_| StorageError::Serialization(format!("invalid age: {age}")))
        })
        .transpose()?;

    Ok(UserDetails::from_persisted(
        user_id_from_text(&user_id)?,
        row.try_get("name").map_err(ser)?,
        age,
        row.try_get("gender").map_err(ser)?,
        row.try_get("date_of_birth").map_err(ser)?,
        row.try_get("contact_number").map_err(ser)?,
        row.try_get("email_id").map_err(ser)?,
        row.try_get("address").map_err(ser)?,
        row.try_get("educational_qualification").map_err(ser)?,
        row.try_get("organization_company").map_err(ser)?,
        row.try_get("any_illness").map_err(ser)?,
        row.try_get("signature_confirmation").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}
