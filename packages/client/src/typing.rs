//! Client-side typing auto-stop timer.
//!
//! The server-side expiry is the source of truth for the shared view; this
//! tracker is a latency-hiding mirror. It emits `typing_start` on the
//! first keystroke of a burst and `typing_stop` once no keystroke arrives
//! within the timeout — both timers converge on the same eventual state.

use std::time::Duration;

use tokio::sync::mpsc;

use kakehashi_server::infrastructure::dto::websocket::{
    ClientEvent, TypingStartPayload, TypingStopPayload,
};

use crate::controller::JoinIdentity;

/// Auto-stop delay after the last local keystroke
pub const TYPING_STOP_DELAY: Duration = Duration::from_secs(3);

/// Typing burst tracker feeding the outbound event channel.
pub struct TypingTracker {
    keystrokes: mpsc::UnboundedSender<()>,
}

impl TypingTracker {
    /// Spawn the tracker task. The task ends when the tracker is dropped,
    /// emitting a final `typing_stop` if a burst was still open.
    pub fn spawn(
        identity: JoinIdentity,
        outbound: mpsc::UnboundedSender<ClientEvent>,
        timeout: Duration,
    ) -> Self {
        let (key_tx, mut key_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            let mut typing = false;
            loop {
                if typing {
                    tokio::select! {
                        signal = key_rx.recv() => {
                            if signal.is_none() {
                                break;
                            }
                            // burst continues, deadline resets
                        }
                        _ = tokio::time::sleep(timeout) => {
                            let _ = outbound.send(stop_event(&identity));
                            typing = false;
                        }
                    }
                } else {
                    match key_rx.recv().await {
                        Some(()) => {
                            let _ = outbound.send(start_event(&identity));
                            typing = true;
                        }
                        None => break,
                    }
                }
            }
            if typing {
                let _ = outbound.send(stop_event(&identity));
            }
        });

        Self { keystrokes: key_tx }
    }

    /// Record a local keystroke.
    pub fn keystroke(&self) {
        let _ = self.keystrokes.send(());
    }
}

fn start_event(identity: &JoinIdentity) -> ClientEvent {
    ClientEvent::TypingStart(TypingStartPayload {
        project_id: identity.project_id.clone(),
        user_id: identity.user_id.clone(),
        user_type: identity.user_type.clone(),
        user_name: identity.user_name.clone(),
    })
}

fn stop_event(identity: &JoinIdentity) -> ClientEvent {
    ClientEvent::TypingStop(TypingStopPayload {
        project_id: identity.project_id.clone(),
        user_id: identity.user_id.clone(),
    })
}
