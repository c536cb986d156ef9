//! Bridge framing. A frame is the body length as a little-endian `u32`
//! followed by the bincode body. Buffer decoding (`decode_frame`) and stream
//! readers share `frame_len` for the prefix and `decode_body` for the body.

use serde::{Deserialize, Serialize};

use crate::indication::Indication;
use crate::protocol::MsgId;
use crate::request::Request;
use crate::transport::ServiceError;

/// Bytes in the length prefix.
pub const LEN_PREFIX: usize = 4;
/// Largest accepted body.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Messages exchanged with the bridge process that owns the co-processor channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// First frame from the bridge: message ids the co-processor accepts.
    Hello { supported: Vec<MsgId> },
    Open { event_mask: u64 },
    Close,
    RegisterEventMask { event_mask: u64 },
    Request(Request),
    Indication(Indication),
    ServiceError(ServiceError),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("frame body of {0} bytes over the {MAX_FRAME_LEN} byte limit")]
    Oversized(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    /// Buffer ends early; `needed` more bytes complete the frame.
    #[error("truncated frame, {needed} more bytes needed")]
    Truncated { needed: usize },
    #[error("frame body of {0} bytes over the {MAX_FRAME_LEN} byte limit")]
    Oversized(usize),
    #[error("malformed frame body: {0}")]
    Malformed(#[from] bincode::Error),
}

/// Bincode payload of any wire value, without framing.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, FrameEncodeError> {
    Ok(bincode::serialize(value)?)
}

/// Body length announced by a prefix, checked against `MAX_FRAME_LEN`.
pub fn frame_len(prefix: [u8; LEN_PREFIX]) -> Result<usize, FrameDecodeError> {
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameDecodeError::Oversized(len));
    }
    Ok(len)
}

pub fn decode_body(body: &[u8]) -> Result<Frame, FrameDecodeError> {
    Ok(bincode::deserialize(body)?)
}

pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameEncodeError> {
    let body = encode_payload(frame)?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_LEN)
        .ok_or(FrameEncodeError::Oversized(body.len()))?;
    let mut out = Vec::with_capacity(LEN_PREFIX + body.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode the frame at the front of `bytes`, returning it with the number of
/// bytes it occupied.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameDecodeError> {
    let Some(prefix) = bytes
        .get(..LEN_PREFIX)
        .and_then(|p| <[u8; LEN_PREFIX]>::try_from(p).ok())
    else {
        return Err(FrameDecodeError::Truncated {
            needed: LEN_PREFIX - bytes.len(),
        });
    };
    let end = LEN_PREFIX + frame_len(prefix)?;
    let Some(body) = bytes.get(LEN_PREFIX..end) else {
        return Err(FrameDecodeError::Truncated {
            needed: end - bytes.len(),
        });
    };
    Ok((decode_body(body)?, end))
}
