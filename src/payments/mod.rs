use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::error::ApiError;
use crate::shared::models::Payment;
use crate::shared::schema::{clients, payments};
use crate::shared::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentListQuery {
    pub client_phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: i32,
    pub amount: BigDecimal,
    pub date: DateTime<Utc>,
    pub service: Option<String>,
    pub status: String,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            amount: payment.amount,
            date: payment.paid_at,
            service: payment.service,
            status: payment.status,
        }
    }
}

/// Payment history for a registered client, newest first. An unknown phone
/// is not-found; a known phone with no payments is an empty list.
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let phone = query.client_phone.ok_or_else(|| {
        ApiError::BadRequest("query parameter 'client_phone' is required".to_string())
    })?;

    let mut conn = state.conn.get()?;

    let client_id: i32 = clients::table
        .filter(clients::phone.eq(&phone))
        .select(clients::id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| ApiError::NotFound("client not found".to_string()))?;

    let records: Vec<Payment> = payments::table
        .filter(payments::client_id.eq(client_id))
        .order(payments::paid_at.desc())
        .load(&mut conn)?;

    Ok(Json(
        records.into_iter().map(PaymentResponse::from).collect(),
    ))
}

pub fn configure_payment_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/payments", get(list_payments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_serializes_the_timestamp_as_date() {
        let payment = Payment {
            id: 9,
            client_id: 2,
            amount: BigDecimal::from(250),
            service: Some("internet".to_string()),
            status: "completed".to_string(),
            paid_at: Utc::now(),
        };
        let json = serde_json::to_value(PaymentResponse::from(payment)).unwrap();
        assert!(json.get("date").is_some());
        assert!(json.get("paid_at").is_none());
        assert_eq!(json["status"], "completed");
    }
}
