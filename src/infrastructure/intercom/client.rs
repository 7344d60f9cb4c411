use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;

use crate::{
    application::services::{
        crypto::TokenCipher,
        gateway::{ConversationGateway, GatewayError},
    },
    infrastructure::resilience::{
        breaker::{BreakerConfig, BreakerError, BreakerSnapshot, CircuitBreaker},
        retry::RetryPolicy,
    },
};

/// Client for the Intercom conversation API.
///
/// All five operations go through the same `POST /conversations/{id}/reply`
/// family and share one circuit breaker; each allowed call retries the HTTP
/// request with exponential backoff inside the breaker's timeout window.
pub struct IntercomClient {
    http: Client,
    base_url: String,
    cipher: Arc<dyn TokenCipher>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl IntercomClient {
    pub fn new(
        base_url: String,
        cipher: Arc<dyn TokenCipher>,
        breaker_config: BreakerConfig,
        retry: RetryPolicy,
    ) -> Arc<dyn ConversationGateway> {
        Arc::new(Self {
            http: Client::builder()
                .user_agent("snoozeplus/intercom")
                .build()
                .expect("failed to build intercom client"),
            base_url,
            cipher,
            breaker: CircuitBreaker::new(breaker_config),
            retry,
        }) as Arc<dyn ConversationGateway>
    }

    /// Decrypt the token, then run the reply request under breaker + retry.
    async fn reply(
        &self,
        conversation_id: &str,
        access_token: &str,
        payload: serde_json::Value,
    ) -> Result<(), GatewayError> {
        let token = self.cipher.decrypt(access_token)?;
        let url = format!("{}/conversations/{}/reply", self.base_url, conversation_id);

        let outcome = self
            .breaker
            .call(|| self.retry.run(|| self.post(&url, &token, &payload)))
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(BreakerError::Open) => Err(GatewayError::CircuitOpen),
            Err(BreakerError::Timeout(elapsed)) => Err(GatewayError::Timeout(elapsed)),
            Err(BreakerError::Inner(err)) => Err(err),
        }
    }

    async fn post(
        &self,
        url: &str,
        token: &str,
        payload: &serde_json::Value,
    ) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header("Intercom-Version", "2.9")
            .json(payload)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationGateway for IntercomClient {
    async fn send_message(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        let body = self.cipher.decrypt(body)?;
        self.reply(
            conversation_id,
            access_token,
            json!({
                "message_type": "comment",
                "type": "admin",
                "admin_id": admin_id,
                "body": body,
            }),
        )
        .await
    }

    async fn add_note(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
        note: &str,
    ) -> Result<(), GatewayError> {
        self.reply(
            conversation_id,
            access_token,
            json!({
                "message_type": "note",
                "type": "admin",
                "admin_id": admin_id,
                "body": note,
            }),
        )
        .await
    }

    async fn set_snooze(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
        until: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        self.reply(
            conversation_id,
            access_token,
            json!({
                "message_type": "snoozed",
                "admin_id": admin_id,
                "snoozed_until": until.timestamp(),
            }),
        )
        .await
    }

    async fn cancel_snooze(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
    ) -> Result<(), GatewayError> {
        self.reply(
            conversation_id,
            access_token,
            json!({
                "message_type": "open",
                "admin_id": admin_id,
            }),
        )
        .await
    }

    async fn close_conversation(
        &self,
        conversation_id: &str,
        admin_id: &str,
        access_token: &str,
    ) -> Result<(), GatewayError> {
        self.reply(
            conversation_id,
            access_token,
            json!({
                "message_type": "close",
                "type": "admin",
                "admin_id": admin_id,
            }),
        )
        .await
    }

    fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }
}
