use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access token for one workspace of the third-party conversation system.
/// `access_token` is stored encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceToken {
    pub workspace_id: String,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
