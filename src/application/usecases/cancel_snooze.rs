use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::services::gateway::ConversationGateway,
    domain::{
        errors::DomainError,
        repositories::{MessageStore, WorkspaceTokenStore},
    },
    infrastructure::scheduler::JobScheduler,
};

pub struct CancelSnoozeRequest {
    pub workspace_id: String,
    pub conversation_id: String,
    pub admin_id: String,
}

pub struct CancelSnoozeResponse {
    pub cancelled_ids: Vec<Uuid>,
}

/// Tear down a snooze: delete the pending messages, drop any timers the
/// scheduler already armed for them, then re-open the conversation.
pub struct CancelSnoozeUseCase {
    messages: Arc<dyn MessageStore>,
    tokens: Arc<dyn WorkspaceTokenStore>,
    gateway: Arc<dyn ConversationGateway>,
    scheduler: Arc<JobScheduler>,
}

impl CancelSnoozeUseCase {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        tokens: Arc<dyn WorkspaceTokenStore>,
        gateway: Arc<dyn ConversationGateway>,
        scheduler: Arc<JobScheduler>,
    ) -> Self {
        Self {
            messages,
            tokens,
            gateway,
            scheduler,
        }
    }

    pub async fn execute(
        &self,
        request: CancelSnoozeRequest,
    ) -> Result<CancelSnoozeResponse, DomainError> {
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

        let cancelled_ids = self
            .messages
            .delete_pending(&request.workspace_id, &request.conversation_id)
            .await?;
        if cancelled_ids.is_empty() {
            return Err(DomainError::NotFound(format!(
                "no pending snooze for conversation {}",
                request.conversation_id
            )));
        }

        for id in &cancelled_ids {
            self.scheduler.cancel_job(&id.to_string()).await;
        }
        info!(
            conversation_id = %request.conversation_id,
            cancelled = cancelled_ids.len(),
            "snooze cancelled"
        );

        // The rows are already gone, so a failure here leaves the
        // conversation snoozed in the inbox but delivers nothing.
        if let Err(err) = self
            .gateway
            .cancel_snooze(
                &request.conversation_id,
                &request.admin_id,
                &token.access_token,
            )
            .await
        {
            warn!(
                conversation_id = %request.conversation_id,
                error = %err,
                "failed to re-open conversation after cancelling snooze"
            );
        }

        Ok(CancelSnoozeResponse { cancelled_ids })
    }
}
