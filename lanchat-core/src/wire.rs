//! Framing: ASCII header fields split by `|` (typed frames) or a single `:`
//! (legacy text form), followed by raw payload bytes appended verbatim.
//!
//! Header boundaries are found by scanning for the first N delimiter bytes
//! only; payload bytes are untyped binary and are never scanned, so binary
//! payloads containing delimiter bytes survive intact.

use crate::protocol::Payload;
use crate::room::RoomKey;

const VOICE_PREFIX: &[u8] = b"VOICE|";
const IMAGE_PREFIX: &[u8] = b"IMAGE|";
const FILE_PREFIX: &[u8] = b"FILE|";
const FIELD_DELIM: u8 = b'|';
const TEXT_DELIM: u8 = b':';

/// A decoded wire frame: the target room plus the carried payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub room: RoomKey,
    pub payload: Payload,
}

/// Error encoding a message into a frame. Should not occur for input that
/// respects the application-boundary rules on room labels and filenames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("room label contains a reserved delimiter")]
    DelimiterInRoom,
    #[error("filename contains a reserved delimiter")]
    DelimiterInFilename,
}

/// Error decoding a frame. Recoverable: the caller drops the frame and must
/// not append anything to any room log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized frame type")]
    UnknownType,
    #[error("truncated frame header")]
    TruncatedHeader,
    #[error("missing header field")]
    MissingField,
    #[error("header field is not valid utf-8")]
    InvalidUtf8,
}

/// Encode one message for one room into a single byte frame.
///
/// Text uses the legacy two-field colon form `<room>:<text>`; voice, image
/// and file use typed multi-field frames. Room labels must not contain `|`
/// or `:`, and filenames must not contain `|`.
pub fn encode(room: &RoomKey, payload: &Payload) -> Result<Vec<u8>, EncodeError> {
    check_room_label(room)?;
    let room = room.as_str().as_bytes();
    match payload {
        Payload::Text(text) => {
            let mut out = Vec::with_capacity(room.len() + 1 + text.len());
            out.extend_from_slice(room);
            out.push(TEXT_DELIM);
            out.extend_from_slice(text.as_bytes());
            Ok(out)
        }
        Payload::Voice(bytes) => Ok(typed_frame(VOICE_PREFIX, room, None, bytes)),
        Payload::Image(bytes) => Ok(typed_frame(IMAGE_PREFIX, room, None, bytes)),
        Payload::File { name, bytes } => {
            if name.as_bytes().contains(&FIELD_DELIM) {
                debug_assert!(false, "filename contains '|': {name}");
                return Err(EncodeError::DelimiterInFilename);
            }
            Ok(typed_frame(FILE_PREFIX, room, Some(name.as_bytes()), bytes))
        }
    }
}

/// Decode a byte frame back into a room and payload.
///
/// Typed prefixes (`VOICE|`, `IMAGE|`, `FILE|`) are checked first; anything
/// else falls back to the colon-delimited text form. Pure, performs no I/O,
/// and is total over arbitrary input.
pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if let Some(rest) = bytes.strip_prefix(VOICE_PREFIX) {
        let (room, payload) = split_field(rest).ok_or(DecodeError::TruncatedHeader)?;
        return Ok(Frame {
            room: field_utf8(room)?.into(),
            payload: Payload::Voice(payload.to_vec()),
        });
    }
    if let Some(rest) = bytes.strip_prefix(IMAGE_PREFIX) {
        let (room, payload) = split_field(rest).ok_or(DecodeError::TruncatedHeader)?;
        return Ok(Frame {
            room: field_utf8(room)?.into(),
            payload: Payload::Image(payload.to_vec()),
        });
    }
    if let Some(rest) = bytes.strip_prefix(FILE_PREFIX) {
        let (room, rest) = split_field(rest).ok_or(DecodeError::TruncatedHeader)?;
        let (name, payload) = split_field(rest).ok_or(DecodeError::MissingField)?;
        return Ok(Frame {
            room: field_utf8(room)?.into(),
            payload: Payload::File {
                name: field_utf8(name)?.to_string(),
                bytes: payload.to_vec(),
            },
        });
    }
    // Legacy text form: "<room>:<utf8-text>". No typed prefix and no colon
    // means the frame is unclassifiable.
    let colon = bytes
        .iter()
        .position(|&b| b == TEXT_DELIM)
        .ok_or(DecodeError::UnknownType)?;
    let room = field_utf8(&bytes[..colon])?;
    let text = field_utf8(&bytes[colon + 1..])?;
    Ok(Frame {
        room: room.into(),
        payload: Payload::Text(text.to_string()),
    })
}

fn typed_frame(prefix: &[u8], room: &[u8], name: Option<&[u8]>, payload: &[u8]) -> Vec<u8> {
    let name_len = name.map(|n| n.len() + 1).unwrap_or(0);
    let mut out = Vec::with_capacity(prefix.len() + room.len() + 1 + name_len + payload.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(room);
    out.push(FIELD_DELIM);
    if let Some(name) = name {
        out.extend_from_slice(name);
        out.push(FIELD_DELIM);
    }
    out.extend_from_slice(payload);
    out
}

fn check_room_label(room: &RoomKey) -> Result<(), EncodeError> {
    let bytes = room.as_str().as_bytes();
    if bytes.contains(&FIELD_DELIM) || bytes.contains(&TEXT_DELIM) {
        debug_assert!(false, "room label contains a delimiter: {room}");
        return Err(EncodeError::DelimiterInRoom);
    }
    Ok(())
}

/// Split at the first `|`, yielding the header field and the remainder.
fn split_field(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let i = bytes.iter().position(|&b| b == FIELD_DELIM)?;
    Some((&bytes[..i], &bytes[i + 1..]))
}

fn field_utf8(bytes: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}
