//! InMemory Room Registry 実装
//!
//! ドメイン層が定義する RoomRegistry trait の具体的な実装。
//!
//! ## ロック構成
//!
//! - 外側の Mutex: Room マップの構造（生成・破棄）を守る
//! - Room ごとの Mutex: その Room の状態変更を直列化する
//!   （Room 単位の single-writer 規律。別の Room の操作は並行に進む）
//!
//! join / leave はマップ構造を変えうるため両方のロックを取る。
//! 高頻度の操作（typing、touch、スナップショット取得）は外側のロックを
//! Arc の取得だけに使い、Room のロックの下で実行する。
//! Room のマップからの削除は必ず両方のロックの下で行われるため、
//! 取り除かれた直後の Room に触れても空の Room への no-op になるだけで
//! 状態が失われることはない。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kakehashi_shared::time::Clock;

use crate::domain::{
    Connection, ConnectionId, JoinOutcome, LeaveOutcome, Participant, PresenceEntry, ProjectId,
    Room, RoomRegistry, RoomSummary, Timestamp, TypingEntry, UserId, UserType,
};

/// インメモリ Room Registry 実装
pub struct InMemoryRoomRegistry {
    rooms: Mutex<HashMap<ProjectId, Arc<Mutex<Room>>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRoomRegistry {
    /// 新しい InMemoryRoomRegistry を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// 既存の Room の Arc を取得（外側のロックは取得後すぐ手放す）
    async fn room(&self, project_id: &ProjectId) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.lock().await;
        rooms.get(project_id).cloned()
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn join(&self, connection: Connection) -> JoinOutcome {
        // マップ構造を変えうるので外側のロックを保持したまま Room をロックする
        let mut rooms = self.rooms.lock().await;
        let room_arc = rooms
            .entry(connection.project_id.clone())
            .or_insert_with(|| {
                tracing::debug!("Room '{}' created", connection.project_id);
                Arc::new(Mutex::new(Room::new(
                    connection.project_id.clone(),
                    Timestamp::new(self.clock.now_utc_millis()),
                )))
            })
            .clone();
        // Room のロックを取るまで外側のロックを手放さない
        // （leave による破棄と交錯して孤児 Room に参加してしまうのを防ぐ）
        let mut room = room_arc.lock().await;
        drop(rooms);
        let connection_id = connection.id;
        let superseded = room.admit(connection);
        JoinOutcome {
            superseded,
            presence: room.presence_snapshot(),
            notify_targets: room.connection_ids_except(&connection_id),
        }
    }

    async fn leave(
        &self,
        project_id: &ProjectId,
        connection_id: &ConnectionId,
    ) -> Option<LeaveOutcome> {
        // Room の破棄はマップからの削除と同時に行うため、両方のロックを保持する
        let mut rooms = self.rooms.lock().await;
        let room_arc = rooms.get(project_id).cloned()?;
        let mut room = room_arc.lock().await;

        let (connection, typing_cleared) = room.remove(connection_id)?;
        let room_dropped = room.is_empty();
        if room_dropped {
            rooms.remove(project_id);
        }

        Some(LeaveOutcome {
            connection,
            presence: room.presence_snapshot(),
            notify_targets: room.connection_ids(),
            typing_cleared,
            room_dropped,
        })
    }

    async fn connection_ids(&self, project_id: &ProjectId) -> Vec<ConnectionId> {
        match self.room(project_id).await {
            Some(room_arc) => room_arc.lock().await.connection_ids(),
            None => Vec::new(),
        }
    }

    async fn connection_ids_except(
        &self,
        project_id: &ProjectId,
        exclude: &ConnectionId,
    ) -> Vec<ConnectionId> {
        match self.room(project_id).await {
            Some(room_arc) => room_arc.lock().await.connection_ids_except(exclude),
            None => Vec::new(),
        }
    }

    async fn presence_snapshot(&self, project_id: &ProjectId) -> Vec<PresenceEntry> {
        match self.room(project_id).await {
            Some(room_arc) => room_arc.lock().await.presence_snapshot(),
            None => Vec::new(),
        }
    }

    async fn typing_snapshot(&self, project_id: &ProjectId) -> Vec<TypingEntry> {
        match self.room(project_id).await {
            Some(room_arc) => room_arc.lock().await.typing_snapshot(),
            None => Vec::new(),
        }
    }

    async fn start_typing(
        &self,
        project_id: &ProjectId,
        participant: Participant,
        at: Timestamp,
    ) -> Option<u64> {
        let room_arc = self.room(project_id).await?;
        let mut room = room_arc.lock().await;
        room.start_typing(participant, at)
    }

    async fn stop_typing(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        user_type: UserType,
    ) -> bool {
        match self.room(project_id).await {
            Some(room_arc) => room_arc.lock().await.stop_typing(user_id, user_type),
            None => false,
        }
    }

    async fn expire_typing(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        user_type: UserType,
        generation: u64,
    ) -> bool {
        match self.room(project_id).await {
            Some(room_arc) => room_arc
                .lock()
                .await
                .expire_typing(user_id, user_type, generation),
            None => false,
        }
    }

    async fn touch(
        &self,
        project_id: &ProjectId,
        connection_id: &ConnectionId,
        at: Timestamp,
    ) -> bool {
        match self.room(project_id).await {
            Some(room_arc) => room_arc.lock().await.touch(connection_id, at),
            None => false,
        }
    }

    async fn stale_connections(&self, deadline: Timestamp) -> Vec<Connection> {
        let room_arcs: Vec<Arc<Mutex<Room>>> = {
            let rooms = self.rooms.lock().await;
            rooms.values().cloned().collect()
        };
        let mut stale = Vec::new();
        for room_arc in room_arcs {
            let room = room_arc.lock().await;
            stale.extend(room.stale_members(deadline));
        }
        stale
    }

    async fn summaries(&self) -> Vec<RoomSummary> {
        let room_arcs: Vec<Arc<Mutex<Room>>> = {
            let rooms = self.rooms.lock().await;
            rooms.values().cloned().collect()
        };
        let mut summaries = Vec::new();
        for room_arc in room_arcs {
            summaries.push(room_arc.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.project_id.as_str().cmp(b.project_id.as_str()));
        summaries
    }

    async fn contains(&self, project_id: &ProjectId) -> bool {
        let rooms = self.rooms.lock().await;
        rooms.contains_key(project_id)
    }

    async fn room_count(&self) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.len()
    }
}
