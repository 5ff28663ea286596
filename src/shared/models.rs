use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::schema::{ai_logs, clients, comments, payments, templates, tickets};

/// Closed set of ticket categories the classifier may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Connection,
    Incident,
    Complaint,
    Information,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 4] = [
        TicketCategory::Connection,
        TicketCategory::Incident,
        TicketCategory::Complaint,
        TicketCategory::Information,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Connection => "connection",
            TicketCategory::Incident => "incident",
            TicketCategory::Complaint => "complaint",
            TicketCategory::Information => "information",
        }
    }
}

impl FromStr for TicketCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection" => Ok(TicketCategory::Connection),
            "incident" => Ok(TicketCategory::Incident),
            "complaint" => Ok(TicketCategory::Complaint),
            "information" => Ok(TicketCategory::Information),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket lifecycle states. Any transition between members is allowed,
/// including reopening a closed ticket; only out-of-set values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(TicketStatus::New),
            "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = clients)]
pub struct Client {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub tariff: Option<String>,
    pub services: Option<serde_json::Value>,
    pub balance: BigDecimal,
    pub debt: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clients)]
pub struct NewClient {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
}

/// Client profile as exposed over HTTP. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct ClientProfile {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub tariff: Option<String>,
    pub services: Option<serde_json::Value>,
    pub balance: BigDecimal,
    pub debt: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl From<Client> for ClientProfile {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            full_name: client.full_name,
            phone: client.phone,
            email: client.email,
            tariff: client.tariff,
            services: client.services,
            balance: client.balance,
            debt: client.debt,
            created_at: client.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: i32,
    pub client_id: Option<i32>,
    pub client_phone: String,
    pub subject: Option<String>,
    pub body: String,
    pub channel: String,
    pub category: Option<String>,
    pub priority: String,
    pub status: String,
    pub ai_response: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub client_id: Option<i32>,
    pub client_phone: String,
    pub subject: Option<String>,
    pub body: String,
    pub channel: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = payments)]
pub struct Payment {
    pub id: i32,
    pub client_id: i32,
    pub amount: BigDecimal,
    pub service: Option<String>,
    pub status: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i32,
    pub ticket_id: i32,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub ticket_id: i32,
    pub author: String,
    pub body: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = templates)]
pub struct Template {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = ai_logs)]
pub struct AiLog {
    pub id: i32,
    pub ticket_id: i32,
    pub action: String,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<serde_json::Value>,
    pub confidence: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ai_logs)]
pub struct NewAiLog {
    pub ticket_id: i32,
    pub action: String,
    pub request_payload: Option<serde_json::Value>,
    pub response_payload: Option<serde_json::Value>,
    pub confidence: Option<BigDecimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in TicketCategory::ALL {
            assert_eq!(category.as_str().parse::<TicketCategory>(), Ok(category));
        }
    }

    #[test]
    fn category_rejects_values_outside_the_set() {
        assert!("billing".parse::<TicketCategory>().is_err());
        assert!("".parse::<TicketCategory>().is_err());
    }

    #[test]
    fn category_serde_uses_snake_case() {
        let json = serde_json::to_string(&TicketCategory::Incident).unwrap();
        assert_eq!(json, "\"incident\"");
        let back: TicketCategory = serde_json::from_str("\"connection\"").unwrap();
        assert_eq!(back, TicketCategory::Connection);
    }

    #[test]
    fn status_accepts_only_known_values() {
        assert_eq!("in_progress".parse::<TicketStatus>(), Ok(TicketStatus::InProgress));
        assert!("reopened".parse::<TicketStatus>().is_err());
        assert!(serde_json::from_str::<TicketStatus>("\"done\"").is_err());
    }

    #[test]
    fn client_profile_drops_the_password_hash() {
        let client = Client {
            id: 1,
            full_name: "Test Client".to_string(),
            phone: "+70000000000".to_string(),
            email: "client@example.com".to_string(),
            password_hash: "argon2-hash".to_string(),
            tariff: None,
            services: None,
            balance: BigDecimal::from(0),
            debt: BigDecimal::from(0),
            created_at: Utc::now(),
        };
        let profile = ClientProfile::from(client);
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["phone"], "+70000000000");
    }
}
