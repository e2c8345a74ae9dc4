//! Wire shapes for the worker task protocol.
//!
//! A request and its response share an `id`; that id is the sole
//! correlation key between a pending completion handle and an incoming
//! message. Buffers travel by value, so the payload enumerates exactly
//! which fields move; there is no traversal of arbitrary objects to
//! discover them.

use serde::{Deserialize, Serialize};

use crate::core::ResizeOptions;

/// Correlation id for one task. Assigned per dispatcher, never global.
pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Decode,
}

/// A task sent to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: TaskId,
    pub kind: TaskKind,
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<ResizeOptions>,
}

/// Error body carried by a failed task response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A worker's reply, tagged by outcome.
///
/// For a `Success`, `pixels.len()` must equal `width * height * 4`; the
/// dispatcher rejects anything else as a protocol violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerResponse {
    Success {
        id: TaskId,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    Error {
        id: TaskId,
        error: WorkerErrorBody,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> TaskId {
        match self {
            Self::Success { id, .. } | Self::Error { id, .. } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_is_tagged() {
        let response = WorkerResponse::Success {
            id: 7,
            width: 1,
            height: 1,
            pixels: vec![0, 0, 0, 255],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "success");
        assert_eq!(json["id"], 7);
        assert_eq!(json["width"], 1);
    }

    #[test]
    fn error_response_omits_absent_name() {
        let response = WorkerResponse::Error {
            id: 3,
            error: WorkerErrorBody {
                message: "bad input".to_string(),
                name: None,
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["message"], "bad input");
        assert!(json["error"].get("name").is_none());
    }

    #[test]
    fn request_roundtrips_through_json() {
        let request = WorkerRequest {
            id: 11,
            kind: TaskKind::Decode,
            payload: vec![1, 2, 3],
            resize: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: WorkerRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 11);
        assert_eq!(back.payload, vec![1, 2, 3]);
        assert!(back.resize.is_none());
    }
}
