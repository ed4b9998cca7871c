use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

/// Free-form personal profile attached to a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserDetails {
    user_id: UserId,
    name: Option<String>,
    age: Option<u8>,
    gender: Option<String>,
    date_of_birth: Option<NaiveDate>,
    contact_number: Option<String>,
    email_id: Option<String>,
    address: Option<String>,
    educational_qualification: Option<String>,
    organization_company: Option<String>,
    any_illness: Option<String>,
    signature_confirmation: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Profile input as submitted by a client form; every field is optional text.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserDetailsDraft {
    pub name: Option<String>,
    #[serde(deserialize_with = "text_or_number")]
    pub age: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub contact_number: Option<String>,
    pub email_id: Option<String>,
    pub address: Option<String>,
    pub educational_qualification: Option<String>,
    pub organization_company: Option<String>,
    pub any_illness: Option<String>,
    pub signature_confirmation: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserDetailsError {
    #[error("age must be a whole number between 1 and 120")]
    InvalidAge,

    #[error("date of birth must be formatted as YYYY-MM-DD")]
    InvalidDateOfBirth,
}

/// Browsers post numeric inputs either as text or as JSON numbers.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|value| match value {
        Loose::Text(text) => text,
        Loose::Int(n) => n.to_string(),
        Loose::Float(n) => n.to_string(),
    }))
}

impl UserDetailsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft into a persisted profile.
    ///
    /// Blank strings are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `UserDetailsError` if the age or date of birth cannot be parsed.
    pub fn validate(
        self,
        user_id: UserId,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<UserDetails, UserDetailsError> {
        let age = normalize_optional(self.age)
            .map(|raw| {
                raw.parse::<u8>()
                    .ok()
                    .filter(|age| (1..=120).contains(age))
                    .ok_or(UserDetailsError::InvalidAge)
            })
            .transpose()?;
        let date_of_birth = normalize_optional(self.date_of_birth)
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|_| UserDetailsError::InvalidDateOfBirth)
            })
            .transpose()?;

        Ok(UserDetails {
            user_id,
            name: normalize_optional(self.name),
            age,
            gender: normalize_optional(self.gender),
            date_of_birth,
            contact_number: normalize_optional(self.contact_number),
            email_id: normalize_optional(self.email_id),
            address: normalize_optional(self.address),
            educational_qualification: normalize_optional(self.educational_qualification),
            organization_company: normalize_optional(self.organization_company),
            any_illness: normalize_optional(self.any_illness),
            signature_confirmation: normalize_optional(self.signature_confirmation),
            created_at,
            updated_at,
        })
    }
}

impl UserDetails {
    /// Rehydrate a profile from storage, where age and date are already typed.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        name: Option<String>,
        age: Option<u8>,
        gender: Option<String>,
        date_of_birth: Option<NaiveDate>,
        contact_number: Option<String>,
        email_id: Option<String>,
        address: Option<String>,
        educational_qualification: Option<String>,
        organization_company: Option<String>,
        any_illness: Option<String>,
        signature_confirmation: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            name,
            age,
            gender,
            date_of_birth,
            contact_number,
            email_id,
            address,
            educational_qualification,
            organization_company,
            any_illness,
            signature_confirmation,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn age(&self) -> Option<u8> {
        self.age
    }

    #[must_use]
    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    #[must_use]
    pub fn date_of_birth(&self) -> Option<NaiveDate> {
        self.date_of_birth
    }

    #[must_use]
    pub fn contact_number(&self) -> Option<&str> {
        self.contact_number.as_deref()
    }

    #[must_use]
    pub fn email_id(&self) -> Option<&str> {
        self.email_id.as_deref()
    }

    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    #[must_use]
    pub fn educational_qualification(&self) -> Option<&str> {
        self.educational_qualification.as_deref()
    }

    #[must_use]
    pub fn organization_company(&self) -> Option<&str> {
        self.organization_company.as_deref()
    }

    #[must_use]
    pub fn any_illness(&self) -> Option<&str> {
        self.any_illness.as_deref()
    }

    #[must_use]
    pub fn signature_confirmation(&self) -> Option<&str> {
        self.signature_confirmation.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn age_accepts_number_or_text() {
        let numeric: UserDetailsDraft = serde_json::from_str(r#"{"age": 34}"#).unwrap();
        assert_eq!(numeric.age.as_deref(), Some("34"));
        let text: UserDetailsDraft = serde_json::from_str(r#"{"age": "34", "name": null}"#).unwrap();
        assert_eq!(text.age.as_deref(), Some("34"));
        let missing: UserDetailsDraft = serde_json::from_str("{}").unwrap();
        assert!(missing.age.is_none());
    }

    #[test]
    fn blank_fields_become_none() {
        let draft = UserDetailsDraft {
            name: Some("  Alice ".into()),
            age: Some(String::new()),
            address: Some("   ".into()),
            ..UserDetailsDraft::new()
        };
        let details = draft
            .validate(UserId::generate(), fixed_now(), fixed_now())
            .unwrap();
        assert_eq!(details.name(), Some("Alice"));
        assert_eq!(details.age(), None);
        assert_eq!(details.address(), None);
    }

    #[test]
    fn parses_age_and_date() {
        let draft = UserDetailsDraft {
            age: Some("34".into()),
            date_of_birth: Some("1990-05-17".into()),
            ..UserDetailsDraft::new()
        };
        let details = draft
            .validate(UserId::generate(), fixed_now(), fixed_now())
            .unwrap();
        assert_eq!(details.age(), Some(34));
        assert_eq!(
            details.date_of_birth(),
            NaiveDate::from_ymd_opt(1990, 5, 17)
        );
    }

    #[test]
    fn rejects_out_of_range_age() {
        for raw in ["0", "121", "abc", "-4"] {
            let draft = UserDetailsDraft {
                age: Some(raw.into()),
                ..UserDetailsDraft::new()
            };
            assert_eq!(
                draft
                    .validate(UserId::generate(), fixed_now(), fixed_now())
                    .err(),
                Some(UserDetailsError::InvalidAge),
                "age {raw}"
            );
        }
    }

    #[test]
    fn rejects_malformed_date() {
        let draft = UserDetailsDraft {
            date_of_birth: Some("17/05/1990".into()),
            ..UserDetailsDraft::new()
        };
        assert_eq!(
            draft
                .validate(UserId::generate(), fixed_now(), fixed_now())
                .err(),
            Some(UserDetailsError::InvalidDateOfBirth)
        );
    }
}
