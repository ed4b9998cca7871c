//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::{ProgressError, UserDetailsError, UserError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Coarse outcome class used by transport layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadInput,
    Unauthenticated,
    Internal,
}

/// Errors emitted by `IdentityGate`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid username or password")]
    BadCredentials,
    #[error("username or email already exists")]
    Conflict,
    #[error(transparent)]
    InvalidInput(#[from] UserError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IdentityError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthenticated | Self::BadCredentials => ErrorClass::Unauthenticated,
            Self::Conflict | Self::InvalidInput(_) => ErrorClass::BadInput,
            Self::Hashing(_) | Self::Storage(_) => ErrorClass::Internal,
        }
    }
}

/// Errors emitted by `FormCatalog`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("invalid form type: {0}")]
    InvalidFormType(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CatalogError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidFormType(_) => ErrorClass::BadInput,
            Self::Storage(_) => ErrorClass::Internal,
        }
    }
}

/// Errors emitted by `ProgressCoordinator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("unknown form: {0}")]
    UnknownForm(String),
    #[error(transparent)]
    Rejected(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressServiceError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownForm(_) | Self::Rejected(_) => ErrorClass::BadInput,
            Self::Storage(_) => ErrorClass::Internal,
        }
    }
}

/// Errors emitted by `UserDetailsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserDetailsServiceError {
    #[error(transparent)]
    Invalid(#[from] UserDetailsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UserDetailsServiceError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Invalid(_) => ErrorClass::BadInput,
            Self::Storage(_) => ErrorClass::Internal,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
