//! Identity / Token Validator trait 定義
//!
//! 認証・トークン発行は外部コラボレータの責務。このインターフェースは
//! 検証結果（クレーム）だけを返し、生の資格情報は決して返さない。

use async_trait::async_trait;

use super::error::AuthError;
use super::value_object::{ProjectId, ShareToken, UserId};

/// 共有トークン検証で得られる client のクレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientClaims {
    pub project_id: ProjectId,
}

/// セッション検証で得られる freelancer のクレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreelancerClaims {
    pub user_id: UserId,
    pub project_id: ProjectId,
}

/// Identity / Token Validator trait
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// client の共有トークンを検証する（有効期限切れは拒否）
    async fn validate_share_token(
        &self,
        token: &ShareToken,
        project_id: &ProjectId,
    ) -> Result<ClientClaims, AuthError>;

    /// freelancer のセッションを検証する（プロジェクトの所有者であること）
    async fn validate_session(
        &self,
        user_id: &UserId,
        project_id: &ProjectId,
    ) -> Result<FreelancerClaims, AuthError>;
}
