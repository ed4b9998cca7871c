#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod password;
pub mod progress;
pub mod user_details_service;

pub use assess_core::Clock;

pub use app_services::{AppServices, ServiceSettings};
pub use catalog::{FormCatalog, QuestionList};
pub use error::{
    AppServicesError, CatalogError, ErrorClass, IdentityError, ProgressServiceError,
    UserDetailsServiceError,
};
pub use identity::{Identity, IdentityGate, SessionGrant};
pub use progress::{ProgressCoordinator, ProgressSummary};
pub use user_details_service::UserDetailsService;
