use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::http::extract::AuthUser;
use crate::http::{ok, ok_with, AppState};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "must be 2-50 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be 8-128 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub refresh_token: String,
}

pub async fn register(State(s): State<AppState>, Json(r): Json<RegisterRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    let session = s.services.register(&r.name, &r.email, &r.password).await?;
    Ok((StatusCode::CREATED, ok_with("Registration successful", session)))
}

pub async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    Ok(ok_with("Login successful", s.services.login(&r.email, &r.password).await?))
}

pub async fn refresh(State(s): State<AppState>, Json(r): Json<RefreshRequest>) -> Result<impl IntoResponse> {
    r.validate()?;
    Ok(ok(s.services.refresh(&r.refresh_token).await?))
}

pub async fn logout_all(State(s): State<AppState>, user: AuthUser) -> Result<impl IntoResponse> {
    s.services.logout_all(user.id).await?;
    Ok(ok_with("Logged out from all devices", ()))
}
