//! 値オブジェクト定義
//!
//! 文字列や数値をそのまま引き回さず、検証済みの型として扱うための
//! ラッパー群。生成時に検証し、以降は不変。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// メッセージ本文の最大長（文字数）
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// プロジェクト ID
///
/// Room のキーとなる識別子。空文字列は許容しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyProjectId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ProjectId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザー ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyUserId);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 表示用ユーザー名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserName(String);

impl UserName {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyUserName);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 参加者種別
///
/// freelancer はアカウントを持つプロジェクトの所有者、client は
/// 共有トークンのみで参加する相手方。プレゼンスは (UserId, UserType) を
/// キーとして一意。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Freelancer,
    Client,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Freelancer => "freelancer",
            UserType::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "freelancer" => Ok(UserType::Freelancer),
            "client" => Ok(UserType::Client),
            other => Err(DomainError::UnknownUserType(other.to_string())),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// メッセージ本文
///
/// 空文字列（空白のみ含む）と上限超過を拒否する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyMessageContent);
        }
        let length = value.chars().count();
        if length > MAX_CONTENT_LENGTH {
            return Err(DomainError::MessageContentTooLong(length));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 共有トークン
///
/// client がアカウントなしでプロジェクトに参加するための所持ベースの
/// 資格情報。検証は IdentityValidator に委譲され、ドメイン層は生の値を
/// 比較以外に使わない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareToken(String);

impl ShareToken {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyShareToken);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ShareToken {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix タイムスタンプ（UTC、ミリ秒）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_id_rejects_empty_string() {
        // テスト項目: 空文字列から ProjectId を生成できない
        // given (前提条件):
        let value = "   ".to_string();

        // when (操作):
        let result = ProjectId::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(DomainError::EmptyProjectId));
    }

    #[test]
    fn test_project_id_accepts_valid_string() {
        // テスト項目: 有効な文字列から ProjectId を生成できる
        // given (前提条件):
        let value = "project-1".to_string();

        // when (操作):
        let result = ProjectId::new(value);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "project-1");
    }

    #[test]
    fn test_user_type_parse_known_values() {
        // テスト項目: "freelancer" / "client" が UserType にパースされる
        // given (前提条件):

        // when (操作):
        let freelancer = UserType::parse("freelancer");
        let client = UserType::parse("client");

        // then (期待する結果):
        assert_eq!(freelancer, Ok(UserType::Freelancer));
        assert_eq!(client, Ok(UserType::Client));
    }

    #[test]
    fn test_user_type_parse_unknown_value() {
        // テスト項目: 未知の文字列は UnknownUserType エラーになる
        // given (前提条件):

        // when (操作):
        let result = UserType::parse("admin");

        // then (期待する結果):
        assert_eq!(
            result,
            Err(DomainError::UnknownUserType("admin".to_string()))
        );
    }

    #[test]
    fn test_message_content_rejects_empty_string() {
        // テスト項目: 空白のみの本文は EmptyMessageContent エラーになる
        // given (前提条件):
        let value = " \n ".to_string();

        // when (操作):
        let result = MessageContent::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(DomainError::EmptyMessageContent));
    }

    #[test]
    fn test_message_content_rejects_too_long_string() {
        // テスト項目: 上限を超える本文は MessageContentTooLong エラーになる
        // given (前提条件):
        let value = "a".repeat(MAX_CONTENT_LENGTH + 1);

        // when (操作):
        let result = MessageContent::new(value);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(DomainError::MessageContentTooLong(MAX_CONTENT_LENGTH + 1))
        );
    }

    #[test]
    fn test_message_content_accepts_boundary_length() {
        // テスト項目: ちょうど上限の長さの本文は受理される
        // given (前提条件):
        let value = "a".repeat(MAX_CONTENT_LENGTH);

        // when (操作):
        let result = MessageContent::new(value);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_share_token_rejects_empty_string() {
        // テスト項目: 空の共有トークンは生成できない
        // given (前提条件):
        let value = "".to_string();

        // when (操作):
        let result = ShareToken::new(value);

        // then (期待する結果):
        assert_eq!(result, Err(DomainError::EmptyShareToken));
    }

    #[test]
    fn test_timestamp_roundtrip() {
        // テスト項目: Timestamp が値をそのまま保持する
        // given (前提条件):
        let millis = 1735689600000;

        // when (操作):
        let timestamp = Timestamp::new(millis);

        // then (期待する結果):
        assert_eq!(timestamp.value(), millis);
    }
}
