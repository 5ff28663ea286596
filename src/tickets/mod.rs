pub mod workflow;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::error::ApiError;
use crate::shared::models::{Ticket, TicketStatus};
use crate::shared::schema::tickets;
use crate::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TicketCreate {
    pub client_phone: String,
    pub subject: Option<String>,
    pub text: String,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "web".to_string()
}

#[derive(Debug, Serialize)]
pub struct TicketSummary {
    pub id: i32,
    pub client_phone: String,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub channel: String,
    pub created_at: DateTime<Utc>,
}

impl From<Ticket> for TicketSummary {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            client_phone: ticket.client_phone,
            subject: ticket.subject,
            category: ticket.category,
            status: ticket.status,
            channel: ticket.channel,
            created_at: ticket.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketDetail {
    pub id: i32,
    pub client_phone: String,
    pub subject: Option<String>,
    pub text: String,
    pub category: Option<String>,
    pub priority: String,
    pub status: String,
    pub channel: String,
    pub ai_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Ticket> for TicketDetail {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            client_phone: ticket.client_phone,
            subject: ticket.subject,
            text: ticket.body,
            category: ticket.category,
            priority: ticket.priority,
            status: ticket.status,
            channel: ticket.channel,
            ai_response: ticket.ai_response,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    pub client_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: TicketStatus,
}

#[derive(Debug, Serialize)]
pub struct AiResponseBody {
    pub ai_response: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponseBody {
    pub ai_response: String,
    pub message: String,
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TicketCreate>,
) -> Result<(StatusCode, Json<TicketSummary>), ApiError> {
    if payload.client_phone.trim().is_empty() {
        return Err(ApiError::BadRequest("client_phone is required".to_string()));
    }
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }

    let ticket = workflow::create_classified(
        &state,
        workflow::TicketSubmission {
            client_phone: payload.client_phone,
            subject: payload.subject,
            text: payload.text,
            channel: payload.channel,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(TicketSummary::from(ticket))))
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicketListQuery>,
) -> Result<Json<Vec<TicketSummary>>, ApiError> {
    let phone = query.client_phone.ok_or_else(|| {
        ApiError::BadRequest("query parameter 'client_phone' is required".to_string())
    })?;

    let mut conn = state.conn.get()?;
    let records: Vec<Ticket> = tickets::table
        .filter(tickets::client_phone.eq(&phone))
        .order(tickets::created_at.desc())
        .load(&mut conn)?;

    Ok(Json(records.into_iter().map(TicketSummary::from).collect()))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<TicketDetail>, ApiError> {
    let mut conn = state.conn.get()?;
    let ticket: Ticket = tickets::table
        .find(ticket_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("ticket not found".to_string()))?;

    Ok(Json(TicketDetail::from(ticket)))
}

/// Status overwrite. The value must belong to the closed status set, but
/// no transition order is enforced; a closed ticket may go back to new.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<TicketSummary>, ApiError> {
    let mut conn = state.conn.get()?;

    let exists: Option<i32> = tickets::table
        .find(ticket_id)
        .select(tickets::id)
        .first(&mut conn)
        .optional()?;
    if exists.is_none() {
        return Err(ApiError::NotFound("ticket not found".to_string()));
    }

    let ticket: Ticket = diesel::update(tickets::table.find(ticket_id))
        .set((
            tickets::status.eq(update.status.as_str()),
            tickets::updated_at.eq(Some(Utc::now())),
        ))
        .get_result(&mut conn)?;

    Ok(Json(TicketSummary::from(ticket)))
}

pub async fn generate_response(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<AiResponseBody>, ApiError> {
    let ticket = workflow::generate_response(&state, ticket_id).await?;
    let ai_response = ticket
        .ai_response
        .ok_or_else(|| ApiError::Internal("generated reply missing on ticket".to_string()))?;

    Ok(Json(AiResponseBody { ai_response }))
}

pub async fn send_response(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<SendResponseBody>, ApiError> {
    let ai_response = workflow::send_response(&state, ticket_id).await?;

    Ok(Json(SendResponseBody {
        ai_response,
        message: "response generated, delivery to the client is in progress".to_string(),
    }))
}

pub fn configure_ticket_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/:id", get(get_ticket))
        .route("/api/tickets/:id/status", patch(update_status))
        .route("/api/tickets/:id/response", post(generate_response))
        .route("/api/tickets/:id/send_response", post(send_response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_create_defaults_the_channel() {
        let payload: TicketCreate = serde_json::from_str(
            r#"{"client_phone": "+71234567890", "text": "no internet since 10am"}"#,
        )
        .unwrap();
        assert_eq!(payload.channel, "web");
        assert_eq!(payload.subject, None);
    }

    #[test]
    fn status_update_rejects_out_of_set_values() {
        assert!(serde_json::from_str::<StatusUpdate>(r#"{"status": "escalated"}"#).is_err());
        let update: StatusUpdate = serde_json::from_str(r#"{"status": "closed"}"#).unwrap();
        assert_eq!(update.status, TicketStatus::Closed);
    }

    #[test]
    fn detail_exposes_the_body_as_text() {
        let ticket = Ticket {
            id: 5,
            client_id: None,
            client_phone: "+71234567890".to_string(),
            subject: None,
            body: "no internet since 10am".to_string(),
            channel: "web".to_string(),
            category: Some("incident".to_string()),
            priority: "normal".to_string(),
            status: "new".to_string(),
            ai_response: None,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let detail = TicketDetail::from(ticket);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["text"], "no internet since 10am");
        assert_eq!(json["status"], "new");
    }
}
