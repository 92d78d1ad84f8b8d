//! The wire protocol: NUL-delimited UTF-8 JSON envelopes of shape
//! `{"type": u16, "payload": {...}}`, and the typed request/response
//! payloads carried inside them.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// The default size of the server's per-turn read buffer.
pub const READ_BUFFER_SIZE: usize = 2048;

/// The NUL byte the client transport appends as a message delimiter.
pub const MESSAGE_DELIMITER: u8 = 0;

pub const MSG_UNKNOWN: u16 = 1 << 0;
pub const MSG_CHALLENGE_LOGIN: u16 = 1 << 1;
pub const MSG_CHALLENGE_PROOF: u16 = 1 << 2;
pub const MSG_LOGOUT: u16 = 1 << 3;
pub const MSG_REGISTER: u16 = 1 << 4;
pub const MSG_WALLET_LIST: u16 = 1 << 5;
pub const MSG_MAKE_REQUEST: u16 = 1 << 6;

/// A parsed `{"type": u16, "payload": {...}}` envelope, before the payload
/// is interpreted against the message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: u16,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(message_type: u16, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
        }
    }

    pub fn unknown() -> Self {
        Self::new(MSG_UNKNOWN, serde_json::json!({ "error_code": ErrorCode::Success as u16 }))
    }

    pub fn error(message_type: u16, code: ErrorCode) -> Self {
        Self::new(message_type, serde_json::json!({ "error_code": code as u16 }))
    }

    pub fn success(message_type: u16) -> Self {
        Self::error(message_type, ErrorCode::Success)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub user_name: String,
    pub verifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeLoginRequest {
    pub user_name: String,
    pub verifier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeLoginResponse {
    pub error_code: u16,
    #[serde(rename = "B", skip_serializing_if = "Option::is_none")]
    pub b: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeProofRequest {
    pub user_name: String,
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "M1")]
    pub m1: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MakeRequestRequest {
    pub currency: String,
    pub amount: f32,
    pub price: f32,
    pub request_type: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletEntry {
    pub id: i32,
    pub currency: String,
    pub amount: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletListResponse {
    pub error_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallets: Option<Vec<WalletEntry>>,
}
