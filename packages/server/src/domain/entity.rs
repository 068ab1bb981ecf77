//! ドメインエンティティ定義
//!
//! Room は隔離の単位。1 プロジェクトに 1 つ、接続中のメンバーと
//! 一時的なプレゼンス／タイピング状態を保持する。メッセージ履歴は
//! Room には置かず、Message Store（外部コラボレータ）が唯一の永続状態。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;
use super::value_object::{
    MessageContent, ProjectId, Timestamp, UserId, UserName, UserType,
};

/// 接続 ID
///
/// トランスポートレベルのセッションを識別するプロセス内で一意な不透明 ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// メッセージ ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| DomainError::InvalidMessageId(value.to_string()))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 参加者のアイデンティティ
///
/// Room 内では (user_id, user_type) が一意キー。user_name は表示用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub user_type: UserType,
    pub user_name: UserName,
}

impl Participant {
    pub fn new(user_id: UserId, user_type: UserType, user_name: UserName) -> Self {
        Self {
            user_id,
            user_type,
            user_name,
        }
    }

    /// Room 内での一意キー
    pub fn key(&self) -> (UserId, UserType) {
        (self.user_id.clone(), self.user_type)
    }
}

/// トランスポートレベルの接続
///
/// Connection Gateway が所有し、切断または evict で破棄される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub project_id: ProjectId,
    pub participant: Participant,
    pub joined_at: Timestamp,
    /// 最後にハートビート（ping）を受け取った時刻
    pub last_seen: Timestamp,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        project_id: ProjectId,
        participant: Participant,
        joined_at: Timestamp,
    ) -> Self {
        Self {
            id,
            project_id,
            participant,
            joined_at,
            last_seen: joined_at,
        }
    }

    pub fn touch(&mut self, at: Timestamp) {
        self.last_seen = at;
    }
}

/// プレゼンスエントリ
///
/// Room 内で (user_id, user_type) ごとに 1 件。再接続は既存エントリを
/// 置き換える（重複させない）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub user_type: UserType,
    pub user_name: UserName,
    pub project_id: ProjectId,
    pub last_seen: Timestamp,
    pub connection_id: ConnectionId,
}

/// タイピングエントリ
///
/// typing_stop が来ないまま 3 秒経過すると自動失効する一時状態。
/// generation は typing_start のたびに増え、古い失効タイマーを無効化する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEntry {
    pub participant: Participant,
    pub started_at: Timestamp,
    pub generation: u64,
}

/// Room の一覧表示用サマリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub project_id: ProjectId,
    pub created_at: Timestamp,
    pub member_count: usize,
}

/// Room エンティティ
///
/// プロジェクトごとの接続メンバーとプレゼンス／タイピング状態。
/// 最初の join で生成され、最後のメンバーが抜けると破棄される
/// （履歴は Message Store にのみ残る）。
#[derive(Debug, Clone)]
pub struct Room {
    pub project_id: ProjectId,
    pub created_at: Timestamp,
    members: HashMap<ConnectionId, Connection>,
    typing: HashMap<(UserId, UserType), TypingEntry>,
    typing_generation: u64,
}

impl Room {
    pub fn new(project_id: ProjectId, created_at: Timestamp) -> Self {
        Self {
            project_id,
            created_at,
            members: HashMap::new(),
            typing: HashMap::new(),
            typing_generation: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// 接続を Room に受け入れる。
    ///
    /// 同じ (user_id, user_type) の既存接続があれば "last join wins" で
    /// 取り除き、置き換えられた接続を返す。
    pub fn admit(&mut self, connection: Connection) -> Option<Connection> {
        let key = connection.participant.key();
        let superseded = self
            .members
            .values()
            .find(|member| member.participant.key() == key)
            .map(|member| member.id);
        let evicted = superseded.and_then(|id| self.members.remove(&id));
        self.members.insert(connection.id, connection);
        evicted
    }

    /// 接続を Room から取り除く。
    ///
    /// 取り除いた接続のアイデンティティにタイピングエントリが残っていれば
    /// 同時にクリアする（タイマー任せにしない）。
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<(Connection, bool)> {
        let connection = self.members.remove(connection_id)?;
        let typing_cleared = self.typing.remove(&connection.participant.key()).is_some();
        Some((connection, typing_cleared))
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.members.keys().copied().collect()
    }

    pub fn connection_ids_except(&self, exclude: &ConnectionId) -> Vec<ConnectionId> {
        self.members
            .keys()
            .filter(|id| *id != exclude)
            .copied()
            .collect()
    }

    /// 現在のプレゼンスの完全なスナップショットを返す。
    ///
    /// 差分ではなくスナップショットを配ることで、再接続時の差分ロスト
    /// バグを避ける。user_id 順でソート済み。
    pub fn presence_snapshot(&self) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self
            .members
            .values()
            .map(|member| PresenceEntry {
                user_id: member.participant.user_id.clone(),
                user_type: member.participant.user_type,
                user_name: member.participant.user_name.clone(),
                project_id: member.project_id.clone(),
                last_seen: member.last_seen,
                connection_id: member.id,
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.user_id.as_str(), a.user_type.as_str())
                .cmp(&(b.user_id.as_str(), b.user_type.as_str()))
        });
        entries
    }

    pub fn typing_snapshot(&self) -> Vec<TypingEntry> {
        let mut entries: Vec<TypingEntry> = self.typing.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.participant
                .user_id
                .as_str()
                .cmp(b.participant.user_id.as_str())
        });
        entries
    }

    /// タイピング開始を記録する。参加者が Room のメンバーでなければ None。
    ///
    /// 戻り値の generation は失効タイマーの照合に使う。
    pub fn start_typing(&mut self, participant: Participant, at: Timestamp) -> Option<u64> {
        let key = participant.key();
        let is_member = self
            .members
            .values()
            .any(|member| member.participant.key() == key);
        if !is_member {
            return None;
        }
        self.typing_generation += 1;
        let generation = self.typing_generation;
        self.typing.insert(
            key,
            TypingEntry {
                participant,
                started_at: at,
                generation,
            },
        );
        Some(generation)
    }

    /// タイピングエントリを取り除く。存在していれば true。
    pub fn stop_typing(&mut self, user_id: &UserId, user_type: UserType) -> bool {
        self.typing.remove(&(user_id.clone(), user_type)).is_some()
    }

    /// generation が一致する場合のみタイピングエントリを失効させる。
    ///
    /// typing_start で更新されたエントリを古いタイマーが消さないための照合。
    pub fn expire_typing(&mut self, user_id: &UserId, user_type: UserType, generation: u64) -> bool {
        let key = (user_id.clone(), user_type);
        match self.typing.get(&key) {
            Some(entry) if entry.generation == generation => {
                self.typing.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// 接続の last_seen を更新する（ハートビート受信時）。
    pub fn touch(&mut self, connection_id: &ConnectionId, at: Timestamp) -> bool {
        match self.members.get_mut(connection_id) {
            Some(member) => {
                member.touch(at);
                true
            }
            None => false,
        }
    }

    /// last_seen が deadline より古い接続を返す。
    pub fn stale_members(&self, deadline: Timestamp) -> Vec<Connection> {
        self.members
            .values()
            .filter(|member| member.last_seen < deadline)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            project_id: self.project_id.clone(),
            created_at: self.created_at,
            member_count: self.members.len(),
        }
    }
}

/// メッセージの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::File => "file",
            MessageKind::System => "system",
        }
    }

    /// 未知の値は既定値 Text に落とす（クライアント互換のため寛容に扱う）
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "file" => MessageKind::File,
            "system" => MessageKind::System,
            _ => MessageKind::Text,
        }
    }
}

/// メッセージの優先度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Normal => "normal",
            MessagePriority::High => "high",
            MessagePriority::Urgent => "urgent",
        }
    }

    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "high" => MessagePriority::High,
            "urgent" => MessagePriority::Urgent,
            _ => MessagePriority::Normal,
        }
    }
}

/// メッセージの既読状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

/// 永続化前のメッセージ
///
/// id と created_at は Message Store が採番する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub project_id: ProjectId,
    pub sender: Participant,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub priority: MessagePriority,
    pub parent_message_id: Option<MessageId>,
    pub thread_id: Option<MessageId>,
}

/// 永続化済みメッセージ（Message Store が所有するエンティティ）
///
/// 既読関連フィールドと edited_at を除き不変。
/// 不変条件: `is_read == (status == Read)`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub project_id: ProjectId,
    pub sender_name: UserName,
    pub sender_type: UserType,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub priority: MessagePriority,
    pub parent_message_id: Option<MessageId>,
    pub thread_id: Option<MessageId>,
    pub status: MessageStatus,
    pub is_read: bool,
    pub created_at: Timestamp,
    pub read_at: Option<Timestamp>,
    pub edited_at: Option<Timestamp>,
}

impl Message {
    pub fn from_draft(id: MessageId, draft: MessageDraft, created_at: Timestamp) -> Self {
        Self {
            id,
            project_id: draft.project_id,
            sender_name: draft.sender.user_name,
            sender_type: draft.sender.user_type,
            content: draft.content,
            kind: draft.kind,
            priority: draft.priority,
            parent_message_id: draft.parent_message_id,
            thread_id: draft.thread_id,
            status: MessageStatus::Sent,
            is_read: false,
            created_at,
            read_at: None,
            edited_at: None,
        }
    }

    /// 既読に遷移させる。既に既読なら何もせず false を返す（冪等）。
    ///
    /// status と is_read は常にこのメソッド経由で同時に更新される。
    pub fn mark_read(&mut self, at: Timestamp) -> bool {
        if self.is_read {
            return false;
        }
        self.status = MessageStatus::Read;
        self.is_read = true;
        self.read_at = Some(at);
        true
    }
}

/// 既読レシート
///
/// 単一メッセージの既読遷移の結果。誰がいつ読んだかを表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadReceipt {
    pub message_id: MessageId,
    pub project_id: ProjectId,
    pub read_by: UserId,
    pub read_by_type: UserType,
    pub read_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(user_id: &str, user_type: UserType) -> Participant {
        Participant::new(
            UserId::new(user_id.to_string()).unwrap(),
            user_type,
            UserName::new(format!("{user_id}-name")).unwrap(),
        )
    }

    fn connection(user_id: &str, user_type: UserType, at: i64) -> Connection {
        Connection::new(
            ConnectionId::generate(),
            ProjectId::new("p1".to_string()).unwrap(),
            participant(user_id, user_type),
            Timestamp::new(at),
        )
    }

    fn test_room() -> Room {
        Room::new(
            ProjectId::new("p1".to_string()).unwrap(),
            Timestamp::new(1000),
        )
    }

    #[test]
    fn test_admit_new_connection() {
        // テスト項目: 新規接続を受け入れるとメンバーに追加される
        // given (前提条件):
        let mut room = test_room();

        // when (操作):
        let evicted = room.admit(connection("alice", UserType::Freelancer, 1000));

        // then (期待する結果):
        assert!(evicted.is_none());
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_admit_same_identity_replaces_connection() {
        // テスト項目: 同一アイデンティティの再 join は既存接続を置き換える（last join wins）
        // given (前提条件):
        let mut room = test_room();
        let first = connection("alice", UserType::Freelancer, 1000);
        let first_id = first.id;
        room.admit(first);

        // when (操作):
        let second = connection("alice", UserType::Freelancer, 2000);
        let evicted = room.admit(second);

        // then (期待する結果): 置き換えられた接続が返り、メンバーは 1 人のまま
        assert_eq!(evicted.map(|c| c.id), Some(first_id));
        assert_eq!(room.member_count(), 1);
        assert_eq!(room.presence_snapshot().len(), 1);
    }

    #[test]
    fn test_same_user_id_different_type_are_distinct() {
        // テスト項目: user_id が同じでも user_type が異なれば別メンバー
        // given (前提条件):
        let mut room = test_room();
        room.admit(connection("sam", UserType::Freelancer, 1000));

        // when (操作):
        let evicted = room.admit(connection("sam", UserType::Client, 2000));

        // then (期待する結果):
        assert!(evicted.is_none());
        assert_eq!(room.member_count(), 2);
    }

    #[test]
    fn test_presence_snapshot_is_sorted_and_unique() {
        // テスト項目: プレゼンススナップショットは user_id 順で重複がない
        // given (前提条件):
        let mut room = test_room();
        room.admit(connection("carol", UserType::Client, 1000));
        room.admit(connection("alice", UserType::Freelancer, 1000));
        // alice が再接続
        room.admit(connection("alice", UserType::Freelancer, 2000));

        // when (操作):
        let snapshot = room.presence_snapshot();

        // then (期待する結果):
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].user_id.as_str(), "alice");
        assert_eq!(snapshot[1].user_id.as_str(), "carol");
    }

    #[test]
    fn test_remove_clears_typing_entry() {
        // テスト項目: メンバー削除時にそのアイデンティティのタイピングエントリも消える
        // given (前提条件):
        let mut room = test_room();
        let conn = connection("alice", UserType::Freelancer, 1000);
        let conn_id = conn.id;
        let alice = conn.participant.clone();
        room.admit(conn);
        room.start_typing(alice, Timestamp::new(1500)).unwrap();

        // when (操作):
        let removed = room.remove(&conn_id);

        // then (期待する結果): typing_cleared が true で、タイピング一覧は空
        let (_, typing_cleared) = removed.unwrap();
        assert!(typing_cleared);
        assert!(room.typing_snapshot().is_empty());
    }

    #[test]
    fn test_start_typing_requires_membership() {
        // テスト項目: メンバーでない参加者のタイピング開始は記録されない
        // given (前提条件):
        let mut room = test_room();

        // when (操作):
        let generation =
            room.start_typing(participant("ghost", UserType::Client), Timestamp::new(1000));

        // then (期待する結果):
        assert!(generation.is_none());
        assert!(room.typing_snapshot().is_empty());
    }

    #[test]
    fn test_expire_typing_with_stale_generation() {
        // テスト項目: typing_start で世代が進むと古い世代の失効は無効になる
        // given (前提条件):
        let mut room = test_room();
        let conn = connection("alice", UserType::Freelancer, 1000);
        let alice = conn.participant.clone();
        room.admit(conn);
        let first_gen = room
            .start_typing(alice.clone(), Timestamp::new(1000))
            .unwrap();
        let second_gen = room.start_typing(alice.clone(), Timestamp::new(2000)).unwrap();

        // when (操作): 古い世代での失効を試みる
        let expired_stale =
            room.expire_typing(&alice.user_id, alice.user_type, first_gen);
        let expired_current =
            room.expire_typing(&alice.user_id, alice.user_type, second_gen);

        // then (期待する結果): 古い世代は無効、現行世代のみ失効する
        assert!(!expired_stale);
        assert!(expired_current);
        assert!(room.typing_snapshot().is_empty());
    }

    #[test]
    fn test_stop_typing_is_idempotent() {
        // テスト項目: 存在しないタイピングエントリの stop は false を返すだけ
        // given (前提条件):
        let mut room = test_room();
        let alice = participant("alice", UserType::Freelancer);

        // when (操作):
        let stopped = room.stop_typing(&alice.user_id, alice.user_type);

        // then (期待する結果):
        assert!(!stopped);
    }

    #[test]
    fn test_stale_members_filters_by_deadline() {
        // テスト項目: last_seen が deadline より古い接続だけが返される
        // given (前提条件):
        let mut room = test_room();
        let stale = connection("alice", UserType::Freelancer, 1000);
        let fresh = connection("bob", UserType::Client, 1000);
        let fresh_id = fresh.id;
        room.admit(stale);
        room.admit(fresh);
        room.touch(&fresh_id, Timestamp::new(5000));

        // when (操作):
        let result = room.stale_members(Timestamp::new(3000));

        // then (期待する結果): alice のみが stale
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].participant.user_id.as_str(), "alice");
    }

    #[test]
    fn test_message_mark_read_is_idempotent() {
        // テスト項目: mark_read の二回目は状態を変えずに false を返す
        // given (前提条件):
        let draft = MessageDraft {
            project_id: ProjectId::new("p1".to_string()).unwrap(),
            sender: participant("alice", UserType::Freelancer),
            content: MessageContent::new("hello".to_string()).unwrap(),
            kind: MessageKind::default(),
            priority: MessagePriority::default(),
            parent_message_id: None,
            thread_id: None,
        };
        let mut message = Message::from_draft(MessageId::generate(), draft, Timestamp::new(1000));
        assert_eq!(message.status, MessageStatus::Sent);
        assert!(!message.is_read);

        // when (操作):
        let first = message.mark_read(Timestamp::new(2000));
        let second = message.mark_read(Timestamp::new(3000));

        // then (期待する結果): 一回目のみ遷移し、read_at は最初の時刻のまま
        assert!(first);
        assert!(!second);
        assert_eq!(message.status, MessageStatus::Read);
        assert!(message.is_read);
        assert_eq!(message.read_at, Some(Timestamp::new(2000)));
    }

    #[test]
    fn test_message_read_invariant_holds() {
        // テスト項目: is_read と status が常に同期している
        // given (前提条件):
        let draft = MessageDraft {
            project_id: ProjectId::new("p1".to_string()).unwrap(),
            sender: participant("bob", UserType::Client),
            content: MessageContent::new("hi".to_string()).unwrap(),
            kind: MessageKind::default(),
            priority: MessagePriority::default(),
            parent_message_id: None,
            thread_id: None,
        };
        let mut message = Message::from_draft(MessageId::generate(), draft, Timestamp::new(1000));

        // when (操作):
        message.mark_read(Timestamp::new(2000));

        // then (期待する結果):
        assert_eq!(message.is_read, message.status == MessageStatus::Read);
    }
}
