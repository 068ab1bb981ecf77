//! InMemory Identity Validator 実装
//!
//! ドメイン層が定義する IdentityValidator trait の具体的な実装。
//! 本番ではトークン発行・セッション管理を持つ外部の認証サービスが
//! この役割を担う。この実装は登録済みプロジェクトの所有者と共有トークン
//! （任意で有効期限つき）を保持し、検証結果のクレームだけを返す。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kakehashi_shared::time::Clock;

use crate::domain::{
    AuthError, ClientClaims, FreelancerClaims, IdentityValidator, ProjectId, ShareToken,
    Timestamp, UserId,
};

/// プロジェクトごとのアクセス情報
struct ProjectAccess {
    owner: UserId,
    share_token: ShareToken,
    token_expires_at: Option<Timestamp>,
}

/// インメモリ Identity Validator 実装
pub struct InMemoryIdentityValidator {
    projects: Mutex<HashMap<ProjectId, ProjectAccess>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryIdentityValidator {
    /// 新しい InMemoryIdentityValidator を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// プロジェクトの所有者と共有トークンを登録する
    ///
    /// `token_expires_at` が None のトークンは失効しない。
    pub async fn register_project(
        &self,
        project_id: ProjectId,
        owner: UserId,
        share_token: ShareToken,
        token_expires_at: Option<Timestamp>,
    ) {
        let mut projects = self.projects.lock().await;
        projects.insert(
            project_id,
            ProjectAccess {
                owner,
                share_token,
                token_expires_at,
            },
        );
    }
}

#[async_trait]
impl IdentityValidator for InMemoryIdentityValidator {
    async fn validate_share_token(
        &self,
        token: &ShareToken,
        project_id: &ProjectId,
    ) -> Result<ClientClaims, AuthError> {
        let projects = self.projects.lock().await;
        let access = projects
            .get(project_id)
            .ok_or_else(|| AuthError::UnknownProject(project_id.as_str().to_string()))?;

        if access.share_token != *token {
            return Err(AuthError::InvalidShareToken(
                project_id.as_str().to_string(),
            ));
        }
        if let Some(expires_at) = access.token_expires_at
            && expires_at.value() <= self.clock.now_utc_millis()
        {
            return Err(AuthError::ExpiredShareToken(
                project_id.as_str().to_string(),
            ));
        }

        Ok(ClientClaims {
            project_id: project_id.clone(),
        })
    }

    async fn validate_session(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<FreelancerClaims, AuthError> {
        let projects = self.projects.lock().await;
        let access = projects
            .get(project_id)
            .ok_or_else(|| AuthError::UnknownProject(project_id.as_str().to_string()))?;

        if access.owner != *user_id {
            return Err(AuthError::NotProjectOwner {
                user_id: user_id.as_str().to_string(),
                project_id: project_id.as_str().to_string(),
            });
        }

        Ok(FreelancerClaims {
            user_id: user_id.clone(),
            project_id: project_id.clone(),
        })
    }
}
