// src/protocol.rs - Request encoding and strict reply decoding
//
// Every exchange with the host is one JSON request datagram
// `{"operation":"...","detail":...}` answered by either a single stringified
// number or three of them in sequence (a vector, x then y then z). The host
// never signals errors on the wire, so the decode step here is the only
// place a garbage reply can be caught before it becomes a control input.
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Reply payload did not parse as the expected number. A valid zero is
    /// "0"; anything unparseable is a fault, never a zero-valued command.
    #[error("malformed reply payload: {payload:?}")]
    Malformed { payload: String },
    #[error("request encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Operation codes understood by the simulator host, named as they appear on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetPos,
    GetObjCount,
    IsVessel,
    GetSize,
    GetAngVel,
    GetBank,
    GetYaw,
    GetPitch,
    SetBank,
    SetYaw,
    SetPitch,
    SetThrust,
    StopThrust,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetPos => "GET_POS",
            Operation::GetObjCount => "GET_OBJ_COUNT",
            Operation::IsVessel => "IS_VESSEL",
            Operation::GetSize => "GET_SIZE",
            Operation::GetAngVel => "GET_ANG_VEL",
            Operation::GetBank => "GET_BANK",
            Operation::GetYaw => "GET_YAW",
            Operation::GetPitch => "GET_PITCH",
            Operation::SetBank => "SET_BANK",
            Operation::SetYaw => "SET_YAW",
            Operation::SetPitch => "SET_PITCH",
            Operation::SetThrust => "SET_THRUST",
            Operation::StopThrust => "STOP_THRUST",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request datagram. `detail` carries an object index or a command
/// delta; operations that need neither send 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub operation: String,
    pub detail: Number,
}

impl Request {
    /// Query or command addressed to an object index.
    pub fn indexed(operation: Operation, index: u32) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            detail: Number::from(index),
        }
    }

    /// Command carrying a numeric delta or level.
    pub fn valued(operation: Operation, value: f64) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            // NaN has no JSON representation; a degenerate delta is sent as 0
            detail: Number::from_f64(value).unwrap_or_else(|| Number::from(0)),
        }
    }

    /// Operation with no meaningful detail.
    pub fn plain(operation: Operation) -> Self {
        Self::indexed(operation, 0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn detail_value(&self) -> f64 {
        self.detail.as_f64().unwrap_or(0.0)
    }
}

/// Decode a scalar reply strictly: trailing NULs and whitespace are
/// tolerated, anything else non-numeric is a `Malformed` fault.
pub fn decode_scalar(payload: &str) -> Result<f64, ProtocolError> {
    let trimmed = payload.trim_matches(char::from(0)).trim();
    trimmed.parse::<f64>().map_err(|_| ProtocolError::Malformed {
        payload: trimmed.to_string(),
    })
}
