use chrono::{DateTime, Utc};
use poem_openapi::Object;
use uuid::Uuid;

#[derive(Object)]
pub struct CreateSnoozeResponseDto {
    pub message_ids: Vec<Uuid>,
    pub snoozed_until: DateTime<Utc>,
}

#[derive(Object)]
pub struct CancelSnoozeResponseDto {
    pub cancelled: u32,
}

#[derive(Object)]
pub struct WorkspaceResponseDto {
    pub workspace_id: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Object)]
pub struct HealthResponseDto {
    pub status: String,
    pub circuit_state: String,
    pub circuit_failures: u32,
    pub seconds_since_last_failure: Option<f64>,
    pub active_jobs: u32,
}
