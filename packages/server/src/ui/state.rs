//! Server state shared across handlers.

use std::sync::Arc;

use kakehashi_shared::time::Clock;

use crate::domain::{MessagePusher, RoomRegistry};
use crate::usecase::{
    GetProjectStateUseCase, JoinProjectUseCase, LeaveProjectUseCase, MarkReadUseCase,
    SendMessageUseCase, TypingUseCase,
};

/// Shared application state
pub struct AppState {
    /// JoinProjectUseCase（プロジェクト参加のユースケース）
    pub join_project_usecase: Arc<JoinProjectUseCase>,
    /// LeaveProjectUseCase（退出・evict の共通経路）
    pub leave_project_usecase: Arc<LeaveProjectUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    pub send_message_usecase: Arc<SendMessageUseCase>,
    /// MarkReadUseCase（既読化のユースケース）
    pub mark_read_usecase: Arc<MarkReadUseCase>,
    /// TypingUseCase（タイピング通知のユースケース）
    pub typing_usecase: Arc<TypingUseCase>,
    /// GetProjectStateUseCase（HTTP API 用の状態取得）
    pub project_state_usecase: Arc<GetProjectStateUseCase>,
    /// RoomRegistry（ハートビートの記録と配送対象の取得）
    pub registry: Arc<dyn RoomRegistry>,
    /// MessagePusher（イベントの fan-out）
    pub message_pusher: Arc<dyn MessagePusher>,
    /// Clock（時刻の抽象化）
    pub clock: Arc<dyn Clock>,
}
