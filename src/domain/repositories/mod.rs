use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{SnoozeMessage, WorkspaceToken};

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_messages(&self, messages: &[SnoozeMessage]) -> anyhow::Result<()>;

    /// Unarchived messages with a send date at or before `window_end`.
    async fn get_due_messages(&self, window_end: DateTime<Utc>)
    -> anyhow::Result<Vec<SnoozeMessage>>;

    /// Mark a message archived. Idempotent: archiving an already-archived
    /// message affects 0 rows.
    async fn archive_message(&self, message_id: Uuid) -> anyhow::Result<u64>;

    /// Count of not-yet-archived messages for the same conversation.
    async fn remaining_count(
        &self,
        workspace_id: &str,
        conversation_id: &str,
    ) -> anyhow::Result<i64>;

    /// Delete every unarchived message for the conversation, returning the
    /// ids that were removed.
    async fn delete_pending(
        &self,
        workspace_id: &str,
        conversation_id: &str,
    ) -> anyhow::Result<Vec<Uuid>>;

    async fn get(&self, message_id: Uuid) -> anyhow::Result<Option<SnoozeMessage>>;
}

#[async_trait]
pub trait WorkspaceTokenStore: Send + Sync {
    async fn find(&self, workspace_id: &str) -> anyhow::Result<Option<WorkspaceToken>>;
    async fn upsert(&self, token: WorkspaceToken) -> anyhow::Result<WorkspaceToken>;
}
