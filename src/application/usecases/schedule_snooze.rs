use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::services::{crypto::TokenCipher, gateway::ConversationGateway},
    domain::{
        errors::DomainError,
        models::SnoozeMessage,
        repositories::{MessageStore, WorkspaceTokenStore},
    },
};

pub struct SnoozeStep {
    pub text: String,
    /// Days after the previous step (after "now" for the first step).
    pub offset_days: u32,
}

pub struct ScheduleSnoozeRequest {
    pub workspace_id: String,
    pub conversation_id: String,
    pub admin_id: String,
    pub steps: Vec<SnoozeStep>,
    /// Close the conversation once the final message has been delivered.
    pub close_conversation: bool,
}

pub struct ScheduleSnoozeResponse {
    pub message_ids: Vec<Uuid>,
    pub snoozed_until: DateTime<Utc>,
}

/// Create the message sequence for a snooze: one stored message per step,
/// each `send_date` a cumulative day offset from now. The recurring dispatch
/// loop picks them up on its next cycle; no job is registered here.
pub struct ScheduleSnoozeUseCase {
    messages: Arc<dyn MessageStore>,
    tokens: Arc<dyn WorkspaceTokenStore>,
    gateway: Arc<dyn ConversationGateway>,
    cipher: Arc<dyn TokenCipher>,
}

impl ScheduleSnoozeUseCase {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        tokens: Arc<dyn WorkspaceTokenStore>,
        gateway: Arc<dyn ConversationGateway>,
        cipher: Arc<dyn TokenCipher>,
    ) -> Self {
        Self {
            messages,
            tokens,
            gateway,
            cipher,
        }
    }

    pub async fn execute(
        &self,
        request: ScheduleSnoozeRequest,
    ) -> Result<ScheduleSnoozeResponse, DomainError> {
        if request.steps.is_empty() {
            return Err(DomainError::Validation(
                "a snooze needs at least one step".to_string(),
            ));
        }

        let token = self
            .tokens
            .find(&request.workspace_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "no access token for workspace {}",
                    request.workspace_id
                ))
            })?;

        let now = Utc::now();
        let last_index = request.steps.len() - 1;
        let mut cumulative_days: i64 = 0;
        let mut messages = Vec::with_capacity(request.steps.len());
        for (index, step) in request.steps.iter().enumerate() {
            cumulative_days += i64::from(step.offset_days);
            let content = self
                .cipher
                .encrypt(&step.text)
                .map_err(anyhow::Error::from)?;
            messages.push(SnoozeMessage {
                id: Uuid::new_v4(),
                workspace_id: request.workspace_id.clone(),
                conversation_id: request.conversation_id.clone(),
                admin_id: request.admin_id.clone(),
                content,
                send_date: now + chrono::Duration::days(cumulative_days),
                close_conversation: request.close_conversation && index == last_index,
                archived: false,
                created_at: now,
            });
        }
        let snoozed_until = messages[last_index].send_date;
        let message_ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();

        self.messages.insert_messages(&messages).await?;

        self.gateway
            .set_snooze(
                &request.conversation_id,
                &request.admin_id,
                &token.access_token,
                snoozed_until,
            )
            .await
            .map_err(anyhow::Error::from)?;

        let note = format!(
            "Snooze+: scheduled {} follow-up message(s), last one on {}.",
            messages.len(),
            snoozed_until.format("%Y-%m-%d")
        );
        if let Err(err) = self
            .gateway
            .add_note(
                &request.conversation_id,
                &request.admin_id,
                &token.access_token,
                &note,
            )
            .await
        {
            warn!(
                conversation_id = %request.conversation_id,
                error = %err,
                "failed to post snooze confirmation note"
            );
        }

        Ok(ScheduleSnoozeResponse {
            message_ids,
            snoozed_until,
        })
    }
}
