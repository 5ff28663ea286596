//! Operator console: ticket triage, comments, client history and the
//! canned-response templates.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::payments::PaymentResponse;
use crate::shared::error::ApiError;
use crate::shared::models::{
    Client, ClientProfile, Comment, NewComment, Payment, Template, Ticket, TicketCategory,
    TicketStatus,
};
use crate::shared::schema::{clients, comments, payments, templates, tickets};
use crate::shared::state::AppState;
use crate::tickets::TicketSummary;

#[derive(Debug, Serialize)]
pub struct TicketAdmin {
    pub id: i32,
    pub subject: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<String>,
    pub client_phone: String,
    pub created_at: DateTime<Utc>,
}

impl From<Ticket> for TicketAdmin {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            subject: ticket.subject,
            category: ticket.category,
            status: ticket.status,
            priority: ticket.priority,
            assigned_to: ticket.assigned_to,
            client_phone: ticket.client_phone,
            created_at: ticket.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OperatorListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
}

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OperatorListQuery>,
) -> Result<Json<Vec<TicketAdmin>>, ApiError> {
    let mut conn = state.conn.get()?;

    let mut q = tickets::table.into_boxed();
    if let Some(category) = query.category {
        q = q.filter(tickets::category.eq(category));
    }
    if let Some(status) = query.status {
        q = q.filter(tickets::status.eq(status));
    }

    let records: Vec<Ticket> = q.order(tickets::created_at.desc()).load(&mut conn)?;

    Ok(Json(records.into_iter().map(TicketAdmin::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct OperatorTicketUpdate {
    pub category: Option<TicketCategory>,
    pub status: Option<TicketStatus>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = tickets)]
struct TicketChanges {
    category: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    assigned_to: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Direct field overwrite of category, status, priority and assignee.
/// Absent fields are left untouched.
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
    Json(update): Json<OperatorTicketUpdate>,
) -> Result<Json<TicketAdmin>, ApiError> {
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
        .set(&TicketChanges {
            category: update.category.map(|c| c.as_str().to_string()),
            status: update.status.map(|s| s.as_str().to_string()),
            priority: update.priority,
            assigned_to: update.assigned_to,
            updated_at: Some(Utc::now()),
        })
        .get_result(&mut conn)?;

    Ok(Json(TicketAdmin::from(ticket)))
}

#[derive(Debug, Deserialize)]
pub struct CommentCreate {
    pub author: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CommentOut {
    pub id: i32,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentOut {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author,
            text: comment.body,
            created_at: comment.created_at,
        }
    }
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<Vec<CommentOut>>, ApiError> {
    let mut conn = state.conn.get()?;

    let records: Vec<Comment> = comments::table
        .filter(comments::ticket_id.eq(ticket_id))
        .order(comments::created_at.asc())
        .load(&mut conn)?;

    Ok(Json(records.into_iter().map(CommentOut::from).collect()))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
    Json(payload): Json<CommentCreate>,
) -> Result<(StatusCode, Json<CommentOut>), ApiError> {
    let mut conn = state.conn.get()?;

    let exists: Option<i32> = tickets::table
        .find(ticket_id)
        .select(tickets::id)
        .first(&mut conn)
        .optional()?;
    if exists.is_none() {
        return Err(ApiError::NotFound("ticket not found".to_string()));
    }

    let comment: Comment = diesel::insert_into(comments::table)
        .values(&NewComment {
            ticket_id,
            author: payload.author,
            body: payload.text,
        })
        .get_result(&mut conn)?;

    Ok((StatusCode::CREATED, Json(CommentOut::from(comment))))
}

#[derive(Debug, Serialize)]
pub struct ClientHistory {
    pub client: ClientProfile,
    pub payments: Vec<PaymentResponse>,
    pub tickets: Vec<TicketSummary>,
}

/// Joins the ticket's denormalized phone back to a client record, then
/// lists that client's ten most recent payments and tickets, newest first.
pub async fn client_history(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<ClientHistory>, ApiError> {
    let mut conn = state.conn.get()?;

    let ticket: Ticket = tickets::table
        .find(ticket_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("ticket not found".to_string()))?;

    let client: Client = clients::table
        .filter(clients::phone.eq(&ticket.client_phone))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| {
            ApiError::NotFound("no registered client for this ticket's phone number".to_string())
        })?;

    let recent_payments: Vec<Payment> = payments::table
        .filter(payments::client_id.eq(client.id))
        .order(payments::paid_at.desc())
        .limit(10)
        .load(&mut conn)?;

    let recent_tickets: Vec<Ticket> = tickets::table
        .filter(tickets::client_phone.eq(&ticket.client_phone))
        .order(tickets::created_at.desc())
        .limit(10)
        .load(&mut conn)?;

    Ok(Json(ClientHistory {
        client: ClientProfile::from(client),
        payments: recent_payments
            .into_iter()
            .map(PaymentResponse::from)
            .collect(),
        tickets: recent_tickets
            .into_iter()
            .map(TicketSummary::from)
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<Template> for TemplateResponse {
    fn from(template: Template) -> Self {
        Self {
            id: template.id,
            name: template.name,
            category: template.category,
            text: template.body,
            created_at: template.created_at,
        }
    }
}

/// Canned-response templates are read-only reference data; operators can
/// list them, nothing mutates them.
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TemplateResponse>>, ApiError> {
    let mut conn = state.conn.get()?;

    let records: Vec<Template> = templates::table.order(templates::name.asc()).load(&mut conn)?;

    Ok(Json(
        records.into_iter().map(TemplateResponse::from).collect(),
    ))
}

pub fn configure_operator_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/operator/tickets", get(list_tickets))
        .route(
            "/api/operator/tickets/:id",
            axum::routing::patch(update_ticket),
        )
        .route(
            "/api/operator/tickets/:id/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/operator/tickets/:id/history", get(client_history))
        .route("/api/operator/templates", get(list_templates))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_deserializes_absent_fields_as_none() {
        let update: OperatorTicketUpdate =
            serde_json::from_str(r#"{"status": "in_progress"}"#).unwrap();
        assert_eq!(update.status, Some(TicketStatus::InProgress));
        assert_eq!(update.category, None);
        assert_eq!(update.priority, None);
        assert_eq!(update.assigned_to, None);
    }

    #[test]
    fn partial_update_rejects_unknown_category() {
        assert!(serde_json::from_str::<OperatorTicketUpdate>(r#"{"category": "spam"}"#).is_err());
    }

    #[test]
    fn comment_out_exposes_the_body_as_text() {
        let comment = Comment {
            id: 1,
            ticket_id: 2,
            author: "operator-1".to_string(),
            body: "called the client back".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(CommentOut::from(comment)).unwrap();
        assert_eq!(json["text"], "called the client back");
        assert_eq!(json["author"], "operator-1");
    }
}
