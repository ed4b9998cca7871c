use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("email cannot be empty")]
    EmptyEmail,

    #[error("email address is invalid")]
    InvalidEmail,

    #[error("password cannot be empty")]
    EmptyPassword,
}

/// Validated username (trimmed, non-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// # Errors
    ///
    /// Returns `UserError::EmptyUsername` if the name is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, UserError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserError::EmptyUsername);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated email address (trimmed, contains a local part and a domain).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// # Errors
    ///
    /// Returns `UserError::EmptyEmail` or `UserError::InvalidEmail`.
    pub fn new(value: impl Into<String>) -> Result<Self, UserError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(UserError::EmptyEmail);
        }
        match trimmed.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(trimmed.to_string()))
            }
            _ => Err(UserError::InvalidEmail),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw registration input, validated into a `ValidRegistration`.
#[derive(Clone, Default)]
pub struct RegistrationDraft {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl fmt::Debug for RegistrationDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationDraft")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Registration input whose fields passed validation. The password is still
/// plaintext here; it is hashed before anything is persisted.
pub struct ValidRegistration {
    pub username: Username,
    pub email: Email,
    pub password: String,
}

impl RegistrationDraft {
    /// # Errors
    ///
    /// Returns `UserError` for blank fields or a malformed email.
    pub fn validate(self) -> Result<ValidRegistration, UserError> {
        let username = Username::new(self.username)?;
        let email = Email::new(self.email)?;
        if self.password.is_empty() {
            return Err(UserError::EmptyPassword);
        }
        Ok(ValidRegistration {
            username,
            email,
            password: self.password,
        })
    }
}

/// A registered account.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: Username,
    email: Email,
    password_hash: String,
    otp: Option<String>,
    created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn new(
        id: UserId,
        username: Username,
        email: Email,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password_hash,
            otp: None,
            created_at,
        }
    }

    /// Rehydrate a user from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `UserError` if the stored username or email no longer validate.
    pub fn from_persisted(
        id: UserId,
        username: String,
        email: String,
        password_hash: String,
        otp: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, UserError> {
        Ok(Self {
            id,
            username: Username::new(username)?,
            email: Email::new(email)?,
            password_hash,
            otp,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &Username {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    #[must_use]
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    #[must_use]
    pub fn otp(&self) -> Option<&str> {
        self.otp.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(username: &str, password: &str, email: &str) -> RegistrationDraft {
        RegistrationDraft {
            username: username.into(),
            password: password.into(),
            email: email.into(),
        }
    }

    #[test]
    fn registration_trims_fields() {
        let valid = draft(" alice ", "pw123", " alice@x.com ").validate().unwrap();
        assert_eq!(valid.username.as_str(), "alice");
        assert_eq!(valid.email.as_str(), "alice@x.com");
    }

    #[test]
    fn registration_rejects_missing_fields() {
        assert_eq!(
            draft("", "pw", "a@x.com").validate().err(),
            Some(UserError::EmptyUsername)
        );
        assert_eq!(
            draft("alice", "", "a@x.com").validate().err(),
            Some(UserError::EmptyPassword)
        );
        assert_eq!(
            draft("alice", "pw", "  ").validate().err(),
            Some(UserError::EmptyEmail)
        );
        assert_eq!(
            draft("alice", "pw", "alice.x.com").validate().err(),
            Some(UserError::InvalidEmail)
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let d = draft("alice", "hunter2", "alice@x.com");
        assert!(!format!("{d:?}").contains("hunter2"));

        let user = User::new(
            UserId::generate(),
            Username::new("alice").unwrap(),
            Email::new("alice@x.com").unwrap(),
            "$argon2id$fake".into(),
            crate::time::fixed_now(),
        );
        assert!(!format!("{user:?}").contains("argon2"));
    }
}
