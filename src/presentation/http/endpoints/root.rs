use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::services::gateway::ConversationGateway;
use crate::application::usecases::{
    cancel_snooze::CancelSnoozeUseCase, register_workspace::RegisterWorkspaceUseCase,
    schedule_snooze::ScheduleSnoozeUseCase,
};
use crate::domain::errors::DomainError;
use crate::infrastructure::scheduler::JobScheduler;

#[derive(Clone)]
pub struct ApiState {
    pub schedule_snooze_usecase: Arc<ScheduleSnoozeUseCase>,
    pub cancel_snooze_usecase: Arc<CancelSnoozeUseCase>,
    pub register_workspace_usecase: Arc<RegisterWorkspaceUseCase>,
    pub gateway: Arc<dyn ConversationGateway>,
    pub scheduler: Arc<JobScheduler>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Snoozes,
    Workspaces,
}

pub fn map_domain_error(err: DomainError) -> poem::Error {
    match err {
        DomainError::Validation(msg) => {
            poem::Error::from_string(msg, poem::http::StatusCode::BAD_REQUEST)
        }
        DomainError::NotFound(msg) => {
            poem::Error::from_string(msg, poem::http::StatusCode::NOT_FOUND)
        }
        DomainError::Other(err) => poem::Error::from_string(
            err.to_string(),
            poem::http::StatusCode::INTERNAL_SERVER_ERROR,
        ),
    }
}
