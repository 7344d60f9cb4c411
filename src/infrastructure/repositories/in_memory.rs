use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{SnoozeMessage, WorkspaceToken},
    repositories::{MessageStore, WorkspaceTokenStore},
};

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<Uuid, SnoozeMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_messages(&self, to_insert: &[SnoozeMessage]) -> anyhow::Result<()> {
        let mut messages = self.messages.write().await;
        for message in to_insert {
            messages.insert(message.id, message.clone());
        }
        Ok(())
    }

    async fn get_due_messages(
        &self,
        window_end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SnoozeMessage>> {
        let messages = self.messages.read().await;
        let mut due: Vec<SnoozeMessage> = messages
            .values()
            .filter(|m| !m.archived && m.send_date <= window_end)
            .cloned()
            .collect();
        due.sort_by_key(|m| m.send_date);
        Ok(due)
    }

    async fn archive_message(&self, message_id: Uuid) -> anyhow::Result<u64> {
        let mut messages = self.messages.write().await;
        match messages.get_mut(&message_id) {
            Some(message) if !message.archived => {
                message.archived = true;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn remaining_count(
        &self,
        workspace_id: &str,
        conversation_id: &str,
    ) -> anyhow::Result<i64> {
        let messages = self.messages.read().await;
        Ok(messages
            .values()
            .filter(|m| {
                !m.archived
                    && m.workspace_id == workspace_id
                    && m.conversation_id == conversation_id
            })
            .count() as i64)
    }

    async fn delete_pending(
        &self,
        workspace_id: &str,
        conversation_id: &str,
    ) -> anyhow::Result<Vec<Uuid>> {
        let mut messages = self.messages.write().await;
        let deleted: Vec<Uuid> = messages
            .values()
            .filter(|m| {
                !m.archived
                    && m.workspace_id == workspace_id
                    && m.conversation_id == conversation_id
            })
            .map(|m| m.id)
            .collect();
        for id in &deleted {
            messages.remove(id);
        }
        Ok(deleted)
    }

    async fn get(&self, message_id: Uuid) -> anyhow::Result<Option<SnoozeMessage>> {
        let messages = self.messages.read().await;
        Ok(messages.get(&message_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryWorkspaceTokenStore {
    tokens: Arc<RwLock<HashMap<String, WorkspaceToken>>>,
}

impl InMemoryWorkspaceTokenStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl WorkspaceTokenStore for InMemoryWorkspaceTokenStore {
    async fn find(&self, workspace_id: &str) -> anyhow::Result<Option<WorkspaceToken>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(workspace_id).cloned())
    }

    async fn upsert(&self, mut token: WorkspaceToken) -> anyhow::Result<WorkspaceToken> {
        token.updated_at = Utc::now();
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.workspace_id.clone(), token.clone());
        Ok(token)
    }
}
