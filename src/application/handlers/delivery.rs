use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    application::services::gateway::ConversationGateway,
    domain::{
        models::SnoozeMessage,
        repositories::{MessageStore, WorkspaceTokenStore},
    },
};

/// Runs the delivery chain for one fired message:
/// send -> archive -> note -> (optional) close.
///
/// A failed send aborts the chain so the unarchived message is picked up
/// again by the next dispatch cycle. Failures in the later steps are logged
/// and never roll back earlier ones.
pub struct DeliveryHandler {
    messages: Arc<dyn MessageStore>,
    tokens: Arc<dyn WorkspaceTokenStore>,
    gateway: Arc<dyn ConversationGateway>,
}

impl DeliveryHandler {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        tokens: Arc<dyn WorkspaceTokenStore>,
        gateway: Arc<dyn ConversationGateway>,
    ) -> Self {
        Self {
            messages,
            tokens,
            gateway,
        }
    }

    /// Entry point for scheduler callbacks; never propagates an error.
    pub async fn handle(&self, message: SnoozeMessage) {
        if let Err(err) = self.deliver(&message).await {
            error!(
                message_id = %message.id,
                conversation_id = %message.conversation_id,
                error = %err,
                "delivery chain failed"
            );
        }
    }

    async fn deliver(&self, message: &SnoozeMessage) -> anyhow::Result<()> {
        let token = self
            .tokens
            .find(&message.workspace_id)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("no access token for workspace {}", message.workspace_id)
            })?;

        self.gateway
            .send_message(
                &message.conversation_id,
                &message.admin_id,
                &token.access_token,
                &message.content,
            )
            .await
            .map_err(anyhow::Error::from)?;
        info!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            "snoozed message delivered"
        );

        match self.messages.archive_message(message.id).await {
            Ok(0) => warn!(message_id = %message.id, "message was already archived"),
            Ok(_) => {}
            Err(err) => warn!(
                message_id = %message.id,
                error = %err,
                "failed to archive delivered message, it may be re-sent next cycle"
            ),
        }

        let remaining = match self
            .messages
            .remaining_count(&message.workspace_id, &message.conversation_id)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    error = %err,
                    "failed to count remaining messages, skipping note"
                );
                return Ok(());
            }
        };

        if remaining > 0 {
            let note = format!("Snooze+: {remaining} follow-up message(s) remaining.");
            if let Err(err) = self
                .gateway
                .add_note(
                    &message.conversation_id,
                    &message.admin_id,
                    &token.access_token,
                    &note,
                )
                .await
            {
                warn!(
                    message_id = %message.id,
                    error = %err,
                    "failed to post follow-up note"
                );
            }
        } else if message.close_conversation {
            if let Err(err) = self
                .gateway
                .close_conversation(
                    &message.conversation_id,
                    &message.admin_id,
                    &token.access_token,
                )
                .await
            {
                warn!(
                    message_id = %message.id,
                    error = %err,
                    "failed to close conversation after final message"
                );
            }
        }

        Ok(())
    }
}
