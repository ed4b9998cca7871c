use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use services::{
    CatalogError, ErrorClass, IdentityError, ProgressServiceError, UserDetailsServiceError,
};

const INTERNAL_MESSAGE: &str = "internal server error";

/// Failure reply: `{"success": false, "error": <message>}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn classified(class: ErrorClass, message: String) -> Self {
        match class {
            ErrorClass::BadInput => Self::bad_request(message),
            ErrorClass::Unauthenticated => Self {
                status: StatusCode::UNAUTHORIZED,
                message,
            },
            // Detail was already logged where the fault happened.
            ErrorClass::Internal => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: INTERNAL_MESSAGE.to_owned(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        if matches!(err, IdentityError::Storage(_) | IdentityError::Hashing(_)) {
            tracing::error!(error = %err, "identity failure");
        }
        Self::classified(err.class(), err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        if let CatalogError::Storage(ref inner) = err {
            tracing::error!(error = %inner, "question catalog failure");
        }
        Self::classified(err.class(), err.to_string())
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        Self::classified(err.class(), err.to_string())
    }
}

impl From<UserDetailsServiceError> for ApiError {
    fn from(err: UserDetailsServiceError) -> Self {
        if let UserDetailsServiceError::Storage(ref inner) = err {
            tracing::error!(error = %inner, "user details failure");
        }
        Self::classified(err.class(), err.to_string())
    }
}
