//! ドメイン層
//!
//! メッセージング／プレゼンスのドメインモデルと、ドメイン層が必要とする
//! インターフェース（Repository / MessagePusher / IdentityValidator）を定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod auth;
pub mod entity;
pub mod error;
pub mod pusher;
pub mod registry;
pub mod store;
pub mod value_object;

pub use auth::{ClientClaims, FreelancerClaims, IdentityValidator};
pub use entity::{
    Connection, ConnectionId, Message, MessageDraft, MessageId, MessageKind, MessagePriority,
    MessageStatus, Participant, PresenceEntry, ReadReceipt, Room, RoomSummary, TypingEntry,
};
pub use error::{AuthError, DomainError, MessagePushError, StoreError};
pub use pusher::{BroadcastOutcome, MessagePusher, PusherChannel};
pub use registry::{JoinOutcome, LeaveOutcome, RoomRegistry};
pub use store::MessageStore;
pub use value_object::{
    MessageContent, ProjectId, ShareToken, Timestamp, UserId, UserName, UserType,
};
