use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One delayed follow-up message on a conversation.
///
/// `content` is an encrypted payload; it is only decrypted at the gateway
/// boundary right before the outbound call. `archived` flips true exactly
/// once after successful delivery and is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoozeMessage {
    pub id: Uuid,
    pub workspace_id: String,
    pub conversation_id: String,
    pub admin_id: String,
    pub content: String,
    pub send_date: DateTime<Utc>,
    pub close_conversation: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}
