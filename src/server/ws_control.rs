//! Control-plane WebSocket: framed `{type, payload, id?}` messages binding
//! a socket to a thread and relaying interrupt/resume requests to the
//! [`InterruptManager`]. Follows the same `axum::extract::ws::WebSocketUpgrade`
//! handler shape `server/axum_integration.rs` uses for its HTTP routes.

use crate::orchestrator::interrupt::InterruptManager;
use crate::orchestrator::plan::InterruptKind;
use axum::extract::ws::{Message, WebSocket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inbound control-plane frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Bind this socket to `thread_id`.
    Register { thread_id: String },
    /// Raise the interrupt flag for `thread_id`.
    Interrupt { thread_id: String, reason: String },
    /// Clear the interrupt flag and supply the resuming user input.
    Resume { thread_id: String, user_input: String },
}

/// Outbound control-plane reply.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlReply {
    /// Acknowledges a `register` message.
    RegistrationAck { client_id: String },
    /// Acknowledges an `interrupt` message.
    InterruptAck { success: bool, message: String },
    /// Acknowledges a `resume` message.
    ResumeAck { success: bool, message: String },
}

/// Drive one WebSocket connection: decode frames, apply them against
/// `interrupts`, and reply with the matching ack. Returns when the socket
/// closes.
pub async fn handle_socket(mut socket: WebSocket, interrupts: Arc<InterruptManager>) {
    let client_id = uuid::Uuid::new_v4().to_string();

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };

        let parsed: Result<ControlMessage, _> = serde_json::from_str(&text);
        let reply = match parsed {
            Ok(ControlMessage::Register { .. }) => ControlReply::RegistrationAck {
                client_id: client_id.clone(),
            },
            Ok(ControlMessage::Interrupt { thread_id, reason }) => {
                interrupts
                    .interrupt(&thread_id, InterruptKind::UserEscape, reason)
                    .await;
                ControlReply::InterruptAck {
                    success: true,
                    message: "interrupt flag set".to_string(),
                }
            }
            Ok(ControlMessage::Resume { thread_id, user_input }) => {
                let resolved = interrupts.resume(&thread_id, user_input).await;
                ControlReply::ResumeAck {
                    success: resolved.is_some(),
                    message: if resolved.is_some() {
                        "resumed".to_string()
                    } else {
                        "no active interrupt for thread".to_string()
                    },
                }
            }
            Err(err) => ControlReply::InterruptAck {
                success: false,
                message: format!("malformed control frame: {err}"),
            },
        };

        let Ok(payload) = serde_json::to_string(&reply) else {
            continue;
        };
        if socket.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_message_parses() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"register","thread_id":"t1"}"#).unwrap();
        assert!(matches!(msg, ControlMessage::Register { thread_id } if thread_id == "t1"));
    }

    #[test]
    fn interrupt_message_parses_with_reason() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"interrupt","thread_id":"t1","reason":"user pressed escape"}"#).unwrap();
        assert!(matches!(msg, ControlMessage::Interrupt { thread_id, reason }
            if thread_id == "t1" && reason == "user pressed escape"));
    }

    #[test]
    fn resume_message_parses_with_user_input() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"resume","thread_id":"t1","user_input":"skip step 3"}"#).unwrap();
        assert!(matches!(msg, ControlMessage::Resume { .. }));
    }

    #[test]
    fn reply_serializes_with_tagged_type() {
        let reply = ControlReply::InterruptAck {
            success: true,
            message: "ok".to_string(),
        };
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["type"], "interrupt_ack");
        assert_eq!(value["success"], true);
    }
}
