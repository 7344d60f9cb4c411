use std::sync::Arc;

use poem_openapi::{OpenApi, payload::Json};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    responses::HealthResponseDto,
};

#[derive(Clone)]
pub struct HealthEndpoints {
    state: Arc<ApiState>,
}

impl HealthEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl HealthEndpoints {
    #[oai(path = "/health", method = "get", tag = EndpointsTags::Health)]
    pub async fn health(&self) -> Json<HealthResponseDto> {
        let breaker = self.state.gateway.breaker_snapshot();
        let active_jobs = self.state.scheduler.active_job_count().await;

        Json(HealthResponseDto {
            status: "ok".to_string(),
            circuit_state: breaker.state.to_string(),
            circuit_failures: breaker.failure_count,
            seconds_since_last_failure: breaker.seconds_since_last_failure,
            active_jobs: active_jobs as u32,
        })
    }
}
