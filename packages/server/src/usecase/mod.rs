//! UseCase 層
//!
//! 1 操作 1 構造体。Repository / MessagePusher / IdentityValidator の
//! trait にのみ依存する。

mod error;
mod join_project;
mod leave_project;
mod mark_read;
mod project_state;
mod send_message;
mod typing;

pub use error::{JoinError, MarkReadError, SendMessageError};
pub use join_project::{JoinProjectUseCase, JoinRequest, JoinedRoom};
pub use leave_project::{Departure, LeaveProjectUseCase, LeaveReason};
pub use mark_read::{BulkReadOutcome, MarkReadUseCase, ReadOutcome};
pub use project_state::GetProjectStateUseCase;
pub use send_message::{SendMessageUseCase, SentMessage};
pub use typing::TypingUseCase;
