//! JSON WebSocket protocol for collaborative shop editing.
//!
//! This module defines the message format for client-server communication.
//! Every frame is a UTF-8 JSON text message of the shape
//! `{"type": "<discriminator>", "data": {...}}`, one message per frame.
//!
//! Inbound frames that fail to parse, or carry an unknown discriminator,
//! must never crash the client: the codec reports a [`ProtocolError`] and the
//! connection layer drops the frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ShopId;

/// Errors that can occur while encoding or decoding protocol frames
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Invalid payload for {kind}: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

/// Messages sent from the editor client to the collaboration server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask to acquire editing rights on a row
    LockRequest { shop_id: ShopId },

    /// Propose a new value for one field of one shop
    UpdateField {
        shop_id: ShopId,
        field: String,
        value: Value,
    },

    /// Voluntarily release a held or pending lock
    UnlockRequest { shop_id: ShopId },
}

/// The named user now holds the row lock (possibly the local user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockGrant {
    pub shop_id: ShopId,
    pub user_id: String,
    pub user_name: String,
}

/// A lock request was denied; the payload names the real holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockDenial {
    pub shop_id: ShopId,
    pub locked_by: String,
    pub locked_by_name: String,
}

/// One field of one shop changed, regardless of which client caused it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub shop_id: ShopId,
    pub field: String,
    pub value: Value,
    #[serde(default)]
    pub updated_by_name: Option<String>,
}

/// Messages sent from the collaboration server to the editor client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Handshake acknowledgment
    Connected,
    /// Lock granted to the named user
    LockAcquired(LockGrant),
    /// Lock denied; another user holds it
    LockFailed(LockDenial),
    /// Remove any lock entry for this shop
    LockReleased { shop_id: ShopId },
    /// Apply the value to the local shop cache and flash the row
    FieldUpdated(FieldChange),
    /// Advisory: the server refreshed a lock lease
    LockHeartbeat,
    /// Advisory: an unlock arrived for a lock the server does not hold
    LockMissing,
    /// Advisory: an update was rejected server-side
    UpdateRejected,
    /// Server-reported error, surfaced as a notification
    Error { detail: String },
}

/// Wire envelope shared by both directions
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

/// Protocol codec for encoding/decoding frames
pub struct EditorProtocol;

impl EditorProtocol {
    /// Encode a client message to a JSON text frame
    pub fn encode_client(msg: &ClientMessage) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(msg)?)
    }

    /// Decode a server frame received by the client
    pub fn decode_server(text: &str) -> Result<ServerMessage, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let msg = match envelope.kind.as_str() {
            "connected" => ServerMessage::Connected,
            "lock_acquired" => {
                ServerMessage::LockAcquired(payload("lock_acquired", envelope.data)?)
            }
            "lock_failed" => ServerMessage::LockFailed(payload("lock_failed", envelope.data)?),
            "lock_released" => {
                #[derive(Deserialize)]
                struct Release {
                    shop_id: ShopId,
                }
                let release: Release = payload("lock_released", envelope.data)?;
                ServerMessage::LockReleased {
                    shop_id: release.shop_id,
                }
            }
            "field_updated" => {
                ServerMessage::FieldUpdated(payload("field_updated", envelope.data)?)
            }
            "lock_heartbeat" => ServerMessage::LockHeartbeat,
            "lock_missing" => ServerMessage::LockMissing,
            "update_rejected" => ServerMessage::UpdateRejected,
            "error" => {
                #[derive(Deserialize)]
                struct Detail {
                    #[serde(default)]
                    detail: String,
                }
                let d: Detail = payload("error", envelope.data)?;
                ServerMessage::Error { detail: d.detail }
            }
            other => return Err(ProtocolError::UnknownMessageType(other.to_string())),
        };
        Ok(msg)
    }

    /// Encode a server message to a JSON text frame (used by test doubles)
    pub fn encode_server(msg: &ServerMessage) -> Result<String, ProtocolError> {
        let (kind, data) = match msg {
            ServerMessage::Connected => ("connected", Value::Object(Default::default())),
            ServerMessage::LockAcquired(grant) => ("lock_acquired", serde_json::to_value(grant)?),
            ServerMessage::LockFailed(denial) => ("lock_failed", serde_json::to_value(denial)?),
            ServerMessage::LockReleased { shop_id } => {
                ("lock_released", serde_json::json!({ "shop_id": shop_id }))
            }
            ServerMessage::FieldUpdated(change) => ("field_updated", serde_json::to_value(change)?),
            ServerMessage::LockHeartbeat => ("lock_heartbeat", Value::Object(Default::default())),
            ServerMessage::LockMissing => ("lock_missing", Value::Object(Default::default())),
            ServerMessage::UpdateRejected => ("update_rejected", Value::Object(Default::default())),
            ServerMessage::Error { detail } => ("error", serde_json::json!({ "detail": detail })),
        };
        let envelope = Envelope {
            kind: kind.to_string(),
            data,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Decode a client frame received by a server (used by test doubles)
    pub fn decode_client(text: &str) -> Result<ClientMessage, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}
