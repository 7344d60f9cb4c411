use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, payload::Json};

use crate::{
    application::usecases::{
        cancel_snooze::CancelSnoozeRequest,
        schedule_snooze::{ScheduleSnoozeRequest, SnoozeStep},
    },
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags, map_domain_error},
        requests::{CancelSnoozeRequestDto, CreateSnoozeRequestDto},
        responses::{CancelSnoozeResponseDto, CreateSnoozeResponseDto},
    },
};

#[derive(Clone)]
pub struct SnoozesEndpoints {
    state: Arc<ApiState>,
}

impl SnoozesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl SnoozesEndpoints {
    #[oai(
        path = "/snoozes",
        method = "post",
        tag = EndpointsTags::Snoozes,
    )]
    pub async fn create_snooze(
        &self,
        request: Json<CreateSnoozeRequestDto>,
    ) -> PoemResult<Json<CreateSnoozeResponseDto>> {
        let payload = ScheduleSnoozeRequest {
            workspace_id: request.workspace_id.clone(),
            conversation_id: request.conversation_id.clone(),
            admin_id: request.admin_id.clone(),
            steps: request
                .steps
                .iter()
                .map(|step| SnoozeStep {
                    text: step.text.clone(),
                    offset_days: step.offset_days,
                })
                .collect(),
            close_conversation: request.close_conversation,
        };

        let response = self
            .state
            .schedule_snooze_usecase
            .execute(payload)
            .await
            .map_err(map_domain_error)?;

        Ok(Json(CreateSnoozeResponseDto {
            message_ids: response.message_ids,
            snoozed_until: response.snoozed_until,
        }))
    }

    #[oai(
        path = "/snoozes",
        method = "delete",
        tag = EndpointsTags::Snoozes,
    )]
    pub async fn cancel_snooze(
        &self,
        request: Json<CancelSnoozeRequestDto>,
    ) -> PoemResult<Json<CancelSnoozeResponseDto>> {
        let response = self
            .state
            .cancel_snooze_usecase
            .execute(CancelSnoozeRequest {
                workspace_id: request.workspace_id.clone(),
                conversation_id: request.conversation_id.clone(),
                admin_id: request.admin_id.clone(),
            })
            .await
            .map_err(map_domain_error)?;

        Ok(Json(CancelSnoozeResponseDto {
            cancelled: response.cancelled_ids.len() as u32,
        }))
    }
}
