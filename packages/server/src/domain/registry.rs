//! Room Registry trait 定義
//!
//! Room の生成・メンバーシップ・プレゼンス／タイピング状態へのアクセスを
//! ドメイン層が必要とする形で定義します。各メソッドは Room 単位で
//! アトミックであること（Room ごとの single-writer 規律）。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::entity::{
    Connection, ConnectionId, Participant, PresenceEntry, RoomSummary, TypingEntry,
};
use super::value_object::{ProjectId, Timestamp, UserId, UserType};

/// join の結果
#[derive(Debug)]
pub struct JoinOutcome {
    /// "last join wins" で置き換えられた同一アイデンティティの旧接続
    pub superseded: Option<Connection>,
    /// 変更後のプレゼンスの完全なスナップショット
    pub presence: Vec<PresenceEntry>,
    /// join した本人以外の通知対象
    pub notify_targets: Vec<ConnectionId>,
}

/// leave の結果
#[derive(Debug)]
pub struct LeaveOutcome {
    /// Room から取り除かれた接続
    pub connection: Connection,
    /// 変更後のプレゼンスの完全なスナップショット
    pub presence: Vec<PresenceEntry>,
    /// 残りのメンバー（通知対象）
    pub notify_targets: Vec<ConnectionId>,
    /// 退出者のタイピングエントリを同時にクリアしたか
    pub typing_cleared: bool,
    /// 最後のメンバーが抜けて Room が破棄されたか
    pub room_dropped: bool,
}

/// Room Registry trait
///
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には
/// 依存しない。
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// 接続を Room に参加させる。Room は無ければ作られる。
    ///
    /// 同一 (user_id, user_type) の既存接続は置き換えられ、
    /// `superseded` として返される。
    async fn join(&self, connection: Connection) -> JoinOutcome;

    /// 接続を Room から退出させる。
    ///
    /// 既に取り除かれていた場合は None（退出通知は一度だけ行うための保証）。
    /// 最後のメンバーが抜けた Room は破棄される。
    async fn leave(
        &self,
        project_id: &ProjectId,
        connection_id: &ConnectionId,
    ) -> Option<LeaveOutcome>;

    /// Room の全接続 ID を取得
    async fn connection_ids(&self, project_id: &ProjectId) -> Vec<ConnectionId>;

    /// 指定の接続を除く Room の接続 ID を取得
    async fn connection_ids_except(
        &self,
        project_id: &ProjectId,
        exclude: &ConnectionId,
    ) -> Vec<ConnectionId>;

    /// プレゼンスの完全なスナップショットを取得
    async fn presence_snapshot(&self, project_id: &ProjectId) -> Vec<PresenceEntry>;

    /// タイピング中の参加者一覧を取得
    async fn typing_snapshot(&self, project_id: &ProjectId) -> Vec<TypingEntry>;

    /// タイピング開始を記録し、失効照合用の世代番号を返す。
    ///
    /// 参加者が Room のメンバーでなければ None。
    async fn start_typing(
        &self,
        project_id: &ProjectId,
        participant: Participant,
        at: Timestamp,
    ) -> Option<u64>;

    /// タイピングエントリを取り除く。存在していれば true。
    async fn stop_typing(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        user_type: UserType,
    ) -> bool;

    /// 世代が一致する場合のみタイピングエントリを失効させる。
    async fn expire_typing(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        user_type: UserType,
        generation: u64,
    ) -> bool;

    /// ハートビート受信を記録する。接続が存在すれば true。
    async fn touch(
        &self,
        project_id: &ProjectId,
        connection_id: &ConnectionId,
        at: Timestamp,
    ) -> bool;

    /// 全 Room から last_seen が deadline より古い接続を収集する
    async fn stale_connections(&self, deadline: Timestamp) -> Vec<Connection>;

    /// 存在する Room のサマリ一覧
    async fn summaries(&self) -> Vec<RoomSummary>;

    /// Room が存在するか
    async fn contains(&self, project_id: &ProjectId) -> bool;

    /// 存在する Room の数
    async fn room_count(&self) -> usize;
}
