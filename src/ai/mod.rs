use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthClient;
use crate::config::AiConfig;
use crate::shared::error::ApiError;
use crate::shared::models::{Client, Payment, Ticket, TicketCategory};
use crate::shared::schema::{clients, payments, tickets};
use crate::shared::state::AppState;

pub const CLASSIFY_SYSTEM_PROMPT: &str = "You are the ticket classifier of a telecom client \
     portal. Reply with exactly ONE word and nothing else: connection, incident, complaint or \
     information. Only one word from that list.";

pub const REPLY_SYSTEM_PROMPT: &str = "You are the AI assistant of a telecom client portal. \
     Write a polite and informative reply to the client's request.";

pub const CHAT_SYSTEM_PROMPT: &str = "Answer politely, briefly and to the point.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("AI service returned status {0}")]
    Status(u16),
    #[error("malformed AI response: {0}")]
    Malformed(String),
    #[error("unexpected category from AI: {0}")]
    UnexpectedCategory(String),
}

/// Strategy seam for the hosted chat-completion API. Held as a trait object
/// in `AppState` so tests can run against a stub instead of the network.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn chat(
        &self,
        system_prompt: &str,
        user_text: &str,
        temperature: f32,
    ) -> Result<String, AiError>;
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn chat(
        &self,
        system_prompt: &str,
        user_text: &str,
        temperature: f32,
    ) -> Result<String, AiError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "temperature": temperature,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_text}
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AiError::Malformed(body.to_string()))?;

        Ok(content.trim().to_string())
    }
}

/// Classifies a ticket body into the closed category set. A reply outside
/// the set is an error, never a fallback value.
pub async fn classify(
    ai: &dyn AiProvider,
    config: &AiConfig,
    text: &str,
) -> Result<TicketCategory, AiError> {
    let raw = ai
        .chat(CLASSIFY_SYSTEM_PROMPT, text, config.classify_temperature)
        .await?;
    let normalized = raw.trim().to_lowercase();
    TicketCategory::from_str(&normalized).map_err(|_| AiError::UnexpectedCategory(raw))
}

pub async fn draft_reply(
    ai: &dyn AiProvider,
    config: &AiConfig,
    text: &str,
) -> Result<String, AiError> {
    ai.chat(REPLY_SYSTEM_PROMPT, text, config.reply_temperature)
        .await
}

/// Builds the account-context prompt for the assistant chat: profile line,
/// recent tickets and recent payments, then the client's question.
pub fn build_context_prompt(
    client: &Client,
    recent_tickets: &[Ticket],
    recent_payments: &[Payment],
    message: &str,
) -> String {
    let profile = format!(
        "Name: {}, tariff: {}, balance: {}, debt: {}",
        client.full_name,
        client.tariff.as_deref().unwrap_or("-"),
        client.balance,
        client.debt,
    );

    let tickets_block = if recent_tickets.is_empty() {
        "No tickets".to_string()
    } else {
        recent_tickets
            .iter()
            .map(|t| {
                format!(
                    "Ticket #{}: {}, status: {}",
                    t.id,
                    t.subject.as_deref().unwrap_or("no subject"),
                    t.status
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let payments_block = if recent_payments.is_empty() {
        "No payments".to_string()
    } else {
        recent_payments
            .iter()
            .map(|p| {
                format!(
                    "Payment: {} for {}, status: {}",
                    p.amount,
                    p.service.as_deref().unwrap_or("service"),
                    p.status
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are the assistant of a telecom client portal.\n\
         Client information:\n{profile}\n\n\
         Recent tickets:\n{tickets_block}\n\n\
         Recent payments:\n{payments_block}\n\n\
         Client question: {message}\n\
         Answer based on this data."
    )
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub ai_message: String,
}

/// Assistant chat grounded in the caller's account data. The caller is
/// identified by bearer token, not by a self-declared phone number.
pub async fn chat_with_account(
    State(state): State<Arc<AppState>>,
    AuthClient(phone): AuthClient,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (client, recent_tickets, recent_payments) = {
        let mut conn = state.conn.get()?;

        let client: Client = clients::table
            .filter(clients::phone.eq(&phone))
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFound("client not found".to_string()))?;

        let recent_tickets: Vec<Ticket> = tickets::table
            .filter(tickets::client_phone.eq(&phone))
            .order(tickets::created_at.desc())
            .limit(5)
            .load(&mut conn)?;

        let recent_payments: Vec<Payment> = payments::table
            .filter(payments::client_id.eq(client.id))
            .order(payments::paid_at.desc())
            .limit(5)
            .load(&mut conn)?;

        (client, recent_tickets, recent_payments)
    };

    let prompt = build_context_prompt(&client, &recent_tickets, &recent_payments, &request.message);
    let answer = state
        .ai
        .chat(CHAT_SYSTEM_PROMPT, &prompt, state.config.ai.chat_temperature)
        .await?;

    Ok(Json(ChatResponse { ai_message: answer }))
}

pub fn configure_ai_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai/chat", post(chat_with_account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    fn test_config(base_url: String) -> AiConfig {
        AiConfig {
            api_key: "test-key".to_string(),
            base_url,
            model: "gpt-3.5-turbo".to_string(),
            classify_temperature: 0.0,
            reply_temperature: 0.7,
            chat_temperature: 0.5,
        }
    }

    fn completion_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn chat_extracts_the_completion_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("  hello there \n"))
            .create_async()
            .await;

        let config = test_config(server.url());
        let provider = OpenAiProvider::new(&config);
        let reply = provider.chat("system", "user", 0.7).await.unwrap();

        assert_eq!(reply, "hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn chat_sends_the_configured_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-3.5-turbo"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("ok"))
            .create_async()
            .await;

        let config = test_config(server.url());
        let provider = OpenAiProvider::new(&config);
        provider.chat("system", "user", 0.0).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn chat_maps_non_success_statuses() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let config = test_config(server.url());
        let provider = OpenAiProvider::new(&config);
        let err = provider.chat("system", "user", 0.0).await.unwrap_err();

        assert!(matches!(err, AiError::Status(429)));
    }

    #[tokio::test]
    async fn chat_rejects_payloads_without_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let config = test_config(server.url());
        let provider = OpenAiProvider::new(&config);
        let err = provider.chat("system", "user", 0.0).await.unwrap_err();

        assert!(matches!(err, AiError::Malformed(_)));
    }

    #[tokio::test]
    async fn classify_parses_a_category_word() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("Incident"))
            .create_async()
            .await;

        let config = test_config(server.url());
        let provider = OpenAiProvider::new(&config);
        let category = classify(&provider, &config, "no internet since 10am")
            .await
            .unwrap();

        assert_eq!(category, TicketCategory::Incident);
    }

    #[tokio::test]
    async fn classify_fails_on_out_of_set_replies() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("billing"))
            .create_async()
            .await;

        let config = test_config(server.url());
        let provider = OpenAiProvider::new(&config);
        let err = classify(&provider, &config, "some text").await.unwrap_err();

        assert!(matches!(err, AiError::UnexpectedCategory(ref word) if word == "billing"));
    }

    #[test]
    fn context_prompt_includes_account_data_and_question() {
        let client = Client {
            id: 7,
            full_name: "Test Client".to_string(),
            phone: "+70000000000".to_string(),
            email: "client@example.com".to_string(),
            password_hash: "hash".to_string(),
            tariff: Some("Unlimited 100".to_string()),
            services: None,
            balance: BigDecimal::from(150),
            debt: BigDecimal::from(0),
            created_at: Utc::now(),
        };
        let ticket = Ticket {
            id: 42,
            client_id: Some(7),
            client_phone: "+70000000000".to_string(),
            subject: Some("Slow connection".to_string()),
            body: "speeds dropped".to_string(),
            channel: "web".to_string(),
            category: Some("incident".to_string()),
            priority: "normal".to_string(),
            status: "new".to_string(),
            ai_response: None,
            assigned_to: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let payment = Payment {
            id: 3,
            client_id: 7,
            amount: BigDecimal::from(500),
            service: Some("internet".to_string()),
            status: "completed".to_string(),
            paid_at: Utc::now(),
        };

        let prompt = build_context_prompt(&client, &[ticket], &[payment], "why is my bill higher?");

        assert!(prompt.contains("Test Client"));
        assert!(prompt.contains("Unlimited 100"));
        assert!(prompt.contains("Ticket #42: Slow connection, status: new"));
        assert!(prompt.contains("Payment: 500 for internet, status: completed"));
        assert!(prompt.contains("why is my bill higher?"));
    }

    #[test]
    fn context_prompt_handles_empty_history() {
        let client = Client {
            id: 1,
            full_name: "New Client".to_string(),
            phone: "+71111111111".to_string(),
            email: "new@example.com".to_string(),
            password_hash: "hash".to_string(),
            tariff: None,
            services: None,
            balance: BigDecimal::from(0),
            debt: BigDecimal::from(0),
            created_at: Utc::now(),
        };

        let prompt = build_context_prompt(&client, &[], &[], "hello");

        assert!(prompt.contains("No tickets"));
        assert!(prompt.contains("No payments"));
        assert!(prompt.contains("tariff: -"));
    }
}
