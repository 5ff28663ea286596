//! Ticket workflow: classification on intake, AI reply drafting, and the
//! background email notification. Every AI invocation leaves an audit row
//! in `ai_logs`; multi-step persistence runs inside one transaction so a
//! ticket can never exist without its classification audit row.

use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use log::{error, info, warn};
use serde_json::json;

use crate::ai;
use crate::shared::error::ApiError;
use crate::shared::models::{NewAiLog, NewTicket, Ticket};
use crate::shared::schema::{ai_logs, clients, tickets};
use crate::shared::state::AppState;

pub const ACTION_CLASSIFY: &str = "classify";
pub const ACTION_GENERATE_RESPONSE: &str = "generate_response";
pub const ACTION_NOTIFY: &str = "notify";

#[derive(Debug)]
pub struct TicketSubmission {
    pub client_phone: String,
    pub subject: Option<String>,
    pub text: String,
    pub channel: String,
}

/// Classifies the submission and persists ticket + audit row atomically.
/// The denormalized phone is stored verbatim; a registered client with the
/// same phone is linked when one exists.
pub async fn create_classified(
    state: &Arc<AppState>,
    submission: TicketSubmission,
) -> Result<Ticket, ApiError> {
    let category = ai::classify(state.ai.as_ref(), &state.config.ai, &submission.text).await?;

    let mut conn = state.conn.get()?;

    let client_id: Option<i32> = clients::table
        .filter(clients::phone.eq(&submission.client_phone))
        .select(clients::id)
        .first(&mut conn)
        .optional()?;

    let ticket = conn.transaction::<Ticket, diesel::result::Error, _>(|conn| {
        let ticket: Ticket = diesel::insert_into(tickets::table)
            .values(&NewTicket {
                client_id,
                client_phone: submission.client_phone.clone(),
                subject: submission.subject.clone(),
                body: submission.text.clone(),
                channel: submission.channel.clone(),
                category: Some(category.as_str().to_string()),
            })
            .get_result(conn)?;

        diesel::insert_into(ai_logs::table)
            .values(&NewAiLog {
                ticket_id: ticket.id,
                action: ACTION_CLASSIFY.to_string(),
                request_payload: Some(json!({ "text": submission.text })),
                response_payload: Some(json!({ "category": category.as_str() })),
                confidence: None,
            })
            .execute(conn)?;

        Ok(ticket)
    })?;

    info!(
        "ticket {} created for {} (category: {category})",
        ticket.id, ticket.client_phone
    );

    Ok(ticket)
}

/// Drafts an AI reply for an existing ticket and stores it together with
/// its audit row. Reruns overwrite the stored reply; every call appends a
/// fresh audit row.
pub async fn generate_response(state: &Arc<AppState>, ticket_id: i32) -> Result<Ticket, ApiError> {
    let ticket: Ticket = {
        let mut conn = state.conn.get()?;
        tickets::table
            .find(ticket_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("ticket not found".to_string()))?
    };

    let reply = ai::draft_reply(state.ai.as_ref(), &state.config.ai, &ticket.body).await?;

    let mut conn = state.conn.get()?;
    let ticket = conn.transaction::<Ticket, diesel::result::Error, _>(|conn| {
        let updated: Ticket = diesel::update(tickets::table.find(ticket_id))
            .set((
                tickets::ai_response.eq(&reply),
                tickets::updated_at.eq(Some(Utc::now())),
            ))
            .get_result(conn)?;

        diesel::insert_into(ai_logs::table)
            .values(&NewAiLog {
                ticket_id,
                action: ACTION_GENERATE_RESPONSE.to_string(),
                request_payload: Some(json!({ "text": ticket.body })),
                response_payload: Some(json!({ "response": reply })),
                confidence: None,
            })
            .execute(conn)?;

        Ok(updated)
    })?;

    Ok(ticket)
}

/// Generates a reply, then dispatches it by email to the client's
/// registered address in the background. The caller gets the reply before
/// delivery is confirmed; the delivery outcome lands in the audit trail.
pub async fn send_response(state: &Arc<AppState>, ticket_id: i32) -> Result<String, ApiError> {
    let ticket = generate_response(state, ticket_id).await?;
    let reply = ticket
        .ai_response
        .clone()
        .ok_or_else(|| ApiError::Internal("generated reply missing on ticket".to_string()))?;

    let recipient: String = {
        let mut conn = state.conn.get()?;
        clients::table
            .filter(clients::phone.eq(&ticket.client_phone))
            .select(clients::email)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| {
                ApiError::NotFound("no registered client for this ticket's phone number".to_string())
            })?
    };

    dispatch_notification(state.clone(), ticket_id, recipient, reply.clone());

    Ok(reply)
}

/// Audit payload for a `notify` row. Records the delivery outcome either
/// way: success keeps only the recipient, failure carries the reason.
fn notify_payload(recipient: &str, outcome: &Result<(), String>) -> serde_json::Value {
    match outcome {
        Ok(()) => json!({ "delivered": true, "to": recipient }),
        Err(reason) => json!({ "delivered": false, "to": recipient, "error": reason }),
    }
}

/// Sends the reply email after the HTTP response, off the request path,
/// and records the outcome as a `notify` audit row so bounced deliveries
/// stay visible to operators.
fn dispatch_notification(state: Arc<AppState>, ticket_id: i32, recipient: String, reply: String) {
    tokio::spawn(async move {
        let mailer = state.mailer.clone();
        let to = recipient.clone();
        let send_result =
            tokio::task::spawn_blocking(move || mailer.send_ticket_reply(&to, ticket_id, &reply))
                .await;

        let outcome: Result<(), String> = match send_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("notification task failed: {e}")),
        };

        if let Err(reason) = &outcome {
            error!("ticket {ticket_id}: reply delivery failed: {reason}");
        }
        let payload = notify_payload(&recipient, &outcome);

        let recorded = tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
            let mut conn = state.conn.get()?;
            diesel::insert_into(ai_logs::table)
                .values(&NewAiLog {
                    ticket_id,
                    action: ACTION_NOTIFY.to_string(),
                    request_payload: None,
                    response_payload: Some(payload),
                    confidence: None,
                })
                .execute(&mut conn)?;
            Ok(())
        })
        .await;

        match recorded {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("ticket {ticket_id}: failed to record delivery outcome: {e}"),
            Err(e) => warn!("ticket {ticket_id}: failed to record delivery outcome: {e}"),
        }
    });
}
