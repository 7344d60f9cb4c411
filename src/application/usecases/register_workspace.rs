use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::{
    application::services::crypto::TokenCipher,
    domain::{errors::DomainError, models::WorkspaceToken, repositories::WorkspaceTokenStore},
};

pub struct RegisterWorkspaceRequest {
    pub workspace_id: String,
    pub access_token: String,
}

/// Store (or rotate) a workspace access token, encrypted at rest.
pub struct RegisterWorkspaceUseCase {
    tokens: Arc<dyn WorkspaceTokenStore>,
    cipher: Arc<dyn TokenCipher>,
}

impl RegisterWorkspaceUseCase {
    pub fn new(tokens: Arc<dyn WorkspaceTokenStore>, cipher: Arc<dyn TokenCipher>) -> Self {
        Self { tokens, cipher }
    }

    pub async fn execute(
        &self,
        request: RegisterWorkspaceRequest,
    ) -> Result<WorkspaceToken, DomainError> {
        if request.workspace_id.trim().is_empty() {
            return Err(DomainError::Validation(
                "workspace_id must not be empty".to_string(),
            ));
        }
        if request.access_token.trim().is_empty() {
            return Err(DomainError::Validation(
                "access_token must not be empty".to_string(),
            ));
        }

        let sealed = self
            .cipher
            .encrypt(&request.access_token)
            .map_err(anyhow::Error::from)?;
        let now = Utc::now();
        let stored = self
            .tokens
            .upsert(WorkspaceToken {
                workspace_id: request.workspace_id.clone(),
                access_token: sealed,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(workspace_id = %request.workspace_id, "workspace token registered");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::crypto::testing::PlainCipher;
    use crate::infrastructure::repositories::in_memory::InMemoryWorkspaceTokenStore;

    #[tokio::test]
    async fn stores_the_encrypted_token() {
        let tokens = InMemoryWorkspaceTokenStore::new();
        let usecase = RegisterWorkspaceUseCase::new(tokens.clone(), PlainCipher::new());

        usecase
            .execute(RegisterWorkspaceRequest {
                workspace_id: "w1".to_string(),
                access_token: "secret".to_string(),
            })
            .await
            .unwrap();

        let stored = tokens.find("w1").await.unwrap().unwrap();
        // PlainCipher is the identity, real deployments go through AES-GCM.
        assert_eq!(stored.access_token, "secret");
    }

    #[tokio::test]
    async fn rejects_blank_input() {
        let usecase = RegisterWorkspaceUseCase::new(
            InMemoryWorkspaceTokenStore::new(),
            PlainCipher::new(),
        );

        let blank_workspace = usecase
            .execute(RegisterWorkspaceRequest {
                workspace_id: "  ".to_string(),
                access_token: "secret".to_string(),
            })
            .await;
        assert!(matches!(blank_workspace, Err(DomainError::Validation(_))));

        let blank_token = usecase
            .execute(RegisterWorkspaceRequest {
                workspace_id: "w1".to_string(),
                access_token: "".to_string(),
            })
            .await;
        assert!(matches!(blank_token, Err(DomainError::Validation(_))));
    }
}
