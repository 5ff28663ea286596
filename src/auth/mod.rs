pub mod jwt;

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};

use crate::shared::error::ApiError;
use crate::shared::models::{Client, NewClient};
use crate::shared::schema::clients;
use crate::shared::state::AppState;

/// Caller identity resolved from a verified bearer token. The wrapped
/// value is the client's phone number.
pub struct AuthClient(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthClient {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a bearer token".to_string()))?;
        let claims = jwt::verify_token(token, &state.config.auth)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {e}")))?;
        Ok(AuthClient(claims.sub))
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if request.full_name.trim().is_empty()
        || request.phone.trim().is_empty()
        || request.password.is_empty()
    {
        return Err(ApiError::BadRequest(
            "full_name, phone and password are required".to_string(),
        ));
    }
    if !request.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email address".to_string()));
    }

    let mut conn = state.conn.get()?;

    let existing: Option<i32> = clients::table
        .filter(
            clients::phone
                .eq(&request.phone)
                .or(clients::email.eq(&request.email)),
        )
        .select(clients::id)
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "a client with this phone or email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&request.password)?;
    let client: Client = diesel::insert_into(clients::table)
        .values(&NewClient {
            full_name: request.full_name,
            phone: request.phone,
            email: request.email,
            password_hash,
        })
        .get_result(&mut conn)?;

    info!("registered client {} ({})", client.id, client.phone);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: client.id,
            full_name: client.full_name,
            phone: client.phone,
            email: client.email,
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let mut conn = state.conn.get()?;

    let client: Client = clients::table
        .filter(clients::phone.eq(&request.phone))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("no client with this phone number".to_string()))?;

    if !verify_password(&request.password, &client.password_hash) {
        return Err(ApiError::Unauthorized("invalid password".to_string()));
    }

    let access_token = jwt::issue_token(&client.phone, &state.config.auth)
        .map_err(|e| ApiError::Internal(format!("failed to issue token: {e}")))?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}
