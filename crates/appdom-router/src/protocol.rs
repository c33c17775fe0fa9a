//! The management wire protocol.
//!
//! Requests and responses travel as bincode-encoded frames with a u32
//! big-endian length prefix. The payload carries the operation and response
//! wire forms as model values; JSON stays the interchange encoding for
//! audit records and snapshot attachments.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use appdom_model::ModelValue;

use crate::error::{Result, RouterError};

/// Upper bound on one frame's payload.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// One management request on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementRequest {
    /// Caller-chosen correlation ID.
    pub request_id: u64,
    /// Operation wire form.
    pub operation: ModelValue,
}

/// One management response on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementResponse {
    /// Correlation ID echoed from the request.
    pub request_id: u64,
    /// Response wire form.
    pub response: ModelValue,
}

/// Serialize any serde-compatible message to a length-prefixed frame.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<BytesMut> {
    let payload = bincode::serialize(msg).map_err(|e| RouterError::Serialization(e.to_string()))?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(RouterError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    Ok(frame)
}

/// Decodes one frame from the front of `buf`, when complete. Returns
/// `None` when more bytes are needed; consumed bytes are removed from the
/// buffer.
pub fn decode_frame<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(RouterError::PayloadTooLarge {
            size: len,
            max: MAX_FRAME_BYTES,
        });
    }
    if buf.len() < 4 + len {
        return Ok(None);
    }
    buf.advance(4);
    let payload = buf.split_to(len);
    let msg = bincode::deserialize(&payload).map_err(|e| RouterError::InvalidFrame(e.to_string()))?;
    Ok(Some(msg))
}
