//! JSON handlers for the `/api` routes.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use assess_core::model::{
    ProgressMarker, Question, RegistrationDraft, ResponsePayload, UserDetailsDraft,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use services::IdentityError;

use crate::error::ApiError;
use crate::router::AppState;
use crate::session::{CurrentUser, session_token};

type Body<T> = Result<Json<T>, JsonRejection>;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    /// Username or email.
    #[serde(default, alias = "email")]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub struct SaveProgressBody {
    #[serde(default)]
    form_name: String,
    #[serde(default)]
    current_progress: u32,
    /// Missing and `null` both mean no answers.
    #[serde(default)]
    responses: Option<ResponsePayload>,
}

#[derive(Deserialize)]
pub struct SubmitFormBody {
    #[serde(default)]
    form_name: String,
    #[serde(default)]
    responses: Option<ResponsePayload>,
}

#[derive(Serialize)]
struct QuestionsReply {
    success: bool,
    form_type: &'static str,
    questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse {
        success: true,
        data: Some("OK"),
        error: None,
    })
}

pub async fn register(
    State(state): State<AppState>,
    body: Body<RegisterBody>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let grant = state
        .services
        .identity()
        .register(RegistrationDraft {
            username: body.username,
            password: body.password,
            email: body.email,
        })
        .await?;

    let cookie = state
        .cookies
        .issue(&grant.token, grant.issued_at, grant.expires_at);
    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "user_id": grant.identity.user_id(),
            "username": grant.identity.username().as_str(),
            "message": "Registration successful",
        })),
    )
        .into_response())
}

pub async fn login(
    State(state): State<AppState>,
    body: Body<LoginBody>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let grant = state
        .services
        .identity()
        .login(&body.username, &body.password)
        .await?;

    let cookie = state
        .cookies
        .issue(&grant.token, grant.issued_at, grant.expires_at);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "user_id": grant.identity.user_id(),
            "username": grant.identity.username().as_str(),
            "email": grant.email.as_str(),
        })),
    )
        .into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let token = session_token(&headers);
    state.services.identity().logout(token.as_ref()).await?;
    Ok((
        [(SET_COOKIE, state.cookies.clear())],
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
        .into_response())
}

pub async fn check_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = session_token(&headers);
    match state.services.identity().resolve(token.as_ref()).await {
        Ok(identity) => Ok(Json(json!({
            "authenticated": true,
            "user_id": identity.user_id(),
            "username": identity.username().as_str(),
        }))
        .into_response()),
        Err(IdentityError::Unauthenticated) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "authenticated": false })),
        )
            .into_response()),
        Err(err) => Err(err.into()),
    }
}

pub async fn questions(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(form_type): Path<String>,
) -> Result<Response, ApiError> {
    let list = state
        .services
        .catalog()
        .list_questions(&identity, &form_type)
        .await?;
    Ok(Json(QuestionsReply {
        success: true,
        form_type: list.form_name.as_str(),
        questions: list.questions,
        warning: list.warning,
    })
    .into_response())
}

pub async fn save_user_details(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    body: Body<UserDetailsDraft>,
) -> Result<Json<Value>, ApiError> {
    let Json(draft) = body?;
    state.services.user_details().save(&identity, draft).await?;
    Ok(Json(json!({
        "success": true,
        "message": "User details saved successfully",
    })))
}

pub async fn get_user_details(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let reply = match state.services.user_details().get(&identity).await? {
        Some(details) => json!({ "success": true, "data": details }),
        None => json!({
            "success": false,
            "data": null,
            "message": "No user details found",
        }),
    };
    Ok(Json(reply))
}

pub async fn save_progress(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    body: Body<SaveProgressBody>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    state
        .services
        .progress()
        .save_progress(
            &identity,
            &body.form_name,
            ProgressMarker::new(body.current_progress),
            body.responses.unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "message": "Progress saved" })))
}

pub async fn submit_form(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    body: Body<SubmitFormBody>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let responses = body.responses.unwrap_or_default();
    state
        .services
        .progress()
        .submit_form(&identity, &body.form_name, responses)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Form submitted successfully",
    })))
}

pub async fn get_responses(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(form_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let responses = state
        .services
        .progress()
        .get_responses(&identity, &form_name)
        .await?;
    Ok(Json(json!({ "success": true, "responses": responses })))
}

pub async fn progress(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let summary = state
        .services
        .progress()
        .progress_summary(&identity)
        .await?;

    let mut forms = Map::new();
    for entry in summary.entries() {
        forms.insert(
            entry.form_name().as_str().to_owned(),
            json!({
                "current_progress": entry.marker().value(),
                "status": entry.status().as_str(),
                "last_updated": entry.last_updated().to_rfc3339(),
            }),
        );
    }
    Ok(Json(json!({ "success": true, "progress": forms })))
}
