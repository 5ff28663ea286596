use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;

use crate::auth::AuthClient;
use crate::shared::error::ApiError;
use crate::shared::models::{Client, ClientProfile};
use crate::shared::schema::clients;
use crate::shared::state::AppState;

pub async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthClient(phone): AuthClient,
) -> Result<Json<ClientProfile>, ApiError> {
    let mut conn = state.conn.get()?;

    let client: Client = clients::table
        .filter(clients::phone.eq(&phone))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("client not found".to_string()))?;

    Ok(Json(ClientProfile::from(client)))
}

pub fn configure_user_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/users/me", get(get_me))
}
