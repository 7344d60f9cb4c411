use std::sync::Arc;

use poem::Result as PoemResult;
use poem_openapi::{OpenApi, param::Path, payload::Json};

use crate::{
    application::usecases::register_workspace::RegisterWorkspaceRequest,
    presentation::http::{
        endpoints::root::{ApiState, EndpointsTags, map_domain_error},
        requests::RegisterWorkspaceRequestDto,
        responses::WorkspaceResponseDto,
    },
};

#[derive(Clone)]
pub struct WorkspacesEndpoints {
    state: Arc<ApiState>,
}

impl WorkspacesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl WorkspacesEndpoints {
    #[oai(
        path = "/workspaces/:workspace_id/token",
        method = "put",
        tag = EndpointsTags::Workspaces,
    )]
    pub async fn register_token(
        &self,
        workspace_id: Path<String>,
        request: Json<RegisterWorkspaceRequestDto>,
    ) -> PoemResult<Json<WorkspaceResponseDto>> {
        let stored = self
            .state
            .register_workspace_usecase
            .execute(RegisterWorkspaceRequest {
                workspace_id: workspace_id.0,
                access_token: request.access_token.clone(),
            })
            .await
            .map_err(map_domain_error)?;

        Ok(Json(WorkspaceResponseDto {
            workspace_id: stored.workspace_id,
            updated_at: stored.updated_at,
        }))
    }
}
