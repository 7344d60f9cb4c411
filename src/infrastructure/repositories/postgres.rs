use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use crate::domain::{
    models::{SnoozeMessage, WorkspaceToken},
    repositories::{MessageStore, WorkspaceTokenStore},
};

pub type PgPool = Pool<Postgres>;

#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn insert_messages(&self, messages: &[SnoozeMessage]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for message in messages {
            sqlx::query(
                r#"
                INSERT INTO snooze_messages (
                    id,
                    workspace_id,
                    conversation_id,
                    admin_id,
                    content,
                    send_date,
                    close_conversation,
                    archived,
                    created_at
                ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                "#,
            )
            .bind(message.id)
            .bind(&message.workspace_id)
            .bind(&message.conversation_id)
            .bind(&message.admin_id)
            .bind(&message.content)
            .bind(message.send_date)
            .bind(message.close_conversation)
            .bind(message.archived)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_due_messages(
        &self,
        window_end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<SnoozeMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, workspace_id, conversation_id, admin_id, content,
                   send_date, close_conversation, archived, created_at
            FROM snooze_messages
            WHERE archived = FALSE AND send_date <= $1
            ORDER BY send_date
            "#,
        )
        .bind(window_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.into_iter().map(SnoozeMessage::from).collect())
    }

    async fn archive_message(&self, message_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"UPDATE snooze_messages SET archived = TRUE WHERE id = $1 AND archived = FALSE"#,
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn remaining_count(
        &self,
        workspace_id: &str,
        conversation_id: &str,
    ) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM snooze_messages
            WHERE workspace_id = $1 AND conversation_id = $2 AND archived = FALSE
            "#,
        )
        .bind(workspace_id)
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn delete_pending(
        &self,
        workspace_id: &str,
        conversation_id: &str,
    ) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            DELETE FROM snooze_messages
            WHERE workspace_id = $1 AND conversation_id = $2 AND archived = FALSE
            RETURNING id
            "#,
        )
        .bind(workspace_id)
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn get(&self, message_id: Uuid) -> anyhow::Result<Option<SnoozeMessage>> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, workspace_id, conversation_id, admin_id, content,
                   send_date, close_conversation, archived, created_at
            FROM snooze_messages
            WHERE id = $1
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(SnoozeMessage::from))
    }
}

#[derive(Clone)]
pub struct PostgresWorkspaceTokenStore {
    pool: PgPool,
}

impl PostgresWorkspaceTokenStore {
    pub fn new(pool: PgPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }
}

#[async_trait]
impl WorkspaceTokenStore for PostgresWorkspaceTokenStore {
    async fn find(&self, workspace_id: &str) -> anyhow::Result<Option<WorkspaceToken>> {
        let record = sqlx::query_as::<_, WorkspaceTokenRecord>(
            r#"
            SELECT workspace_id, access_token, created_at, updated_at
            FROM workspace_tokens
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(WorkspaceToken::from))
    }

    async fn upsert(&self, mut token: WorkspaceToken) -> anyhow::Result<WorkspaceToken> {
        token.updated_at = Utc::now();
        let record = sqlx::query_as::<_, WorkspaceTokenRecord>(
            r#"
            INSERT INTO workspace_tokens (workspace_id, access_token, created_at, updated_at)
            VALUES ($1,$2,$3,$4)
            ON CONFLICT (workspace_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                updated_at = EXCLUDED.updated_at
            RETURNING workspace_id, access_token, created_at, updated_at
            "#,
        )
        .bind(&token.workspace_id)
        .bind(&token.access_token)
        .bind(token.created_at)
        .bind(token.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(WorkspaceToken::from(record))
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    workspace_id: String,
    conversation_id: String,
    admin_id: String,
    content: String,
    send_date: DateTime<Utc>,
    close_conversation: bool,
    archived: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRecord> for SnoozeMessage {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            workspace_id: record.workspace_id,
            conversation_id: record.conversation_id,
            admin_id: record.admin_id,
            content: record.content,
            send_date: record.send_date,
            close_conversation: record.close_conversation,
            archived: record.archived,
            created_at: record.created_at,
        }
    }
}

#[derive(FromRow)]
struct WorkspaceTokenRecord {
    workspace_id: String,
    access_token: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WorkspaceTokenRecord> for WorkspaceToken {
    fn from(record: WorkspaceTokenRecord) -> Self {
        Self {
            workspace_id: record.workspace_id,
            access_token: record.access_token,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
