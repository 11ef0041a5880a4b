//! Binary frame encoding for the document sync websocket.
//!
//! Every server→client packet starts with a 1-byte type tag: `1` for
//! CHANGE (a 4-byte big-endian length prefix followed by that many bytes
//! of opaque change data) or `2` for BACKLOG_COMPLETE (no payload).
//! Multiple CHANGE blocks may be concatenated in one websocket message;
//! the length prefix lets a reader recover framing even if a transport
//! splits or merges messages.

use bytes::{Buf, BufMut, Bytes, BytesMut};

const TAG_CHANGE: u8 = 1;
const TAG_BACKLOG_COMPLETE: u8 = 2;

/// One decoded server→client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One opaque document change.
    Change(Bytes),
    /// Marks the end of backlog replay; sent exactly once per connection.
    BacklogComplete,
}

impl Frame {
    /// Append this frame's wire representation onto `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Self::Change(bytes) => {
                buf.put_u8(TAG_CHANGE);
                #[allow(clippy::cast_possible_truncation)]
                buf.put_u32(bytes.len() as u32);
                buf.put_slice(bytes);
            }
            Self::BacklogComplete => buf.put_u8(TAG_BACKLOG_COMPLETE),
        }
    }

    /// Encode this frame as a standalone websocket message.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }
}

/// Error decoding a frame stream.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown frame tag {0}")]
    UnknownTag(u8),
    #[error("truncated frame")]
    Truncated,
}

/// Decode every frame concatenated in `buf`, in order.
///
/// # Errors
///
/// Returns [`DecodeError`] on an unrecognized tag or a length prefix
/// that overruns the buffer.
pub fn decode_all(mut buf: Bytes) -> Result<Vec<Frame>, DecodeError> {
    let mut frames = Vec::new();
    while buf.has_remaining() {
        let tag = buf.get_u8();
        match tag {
            TAG_CHANGE => {
                if buf.remaining() < 4 {
                    return Err(DecodeError::Truncated);
                }
                let len = buf.get_u32() as usize;
                if buf.remaining() < len {
                    return Err(DecodeError::Truncated);
                }
                frames.push(Frame::Change(buf.copy_to_bytes(len)));
            }
            TAG_BACKLOG_COMPLETE => frames.push(Frame::BacklogComplete),
            other => return Err(DecodeError::UnknownTag(other)),
        }
    }
    Ok(frames)
}

/// Encode a run of CHANGE frames followed by one BACKLOG_COMPLETE, the
/// shape of a full backlog reply.
#[must_use]
pub fn encode_backlog<'a>(changes: impl IntoIterator<Item = &'a [u8]>) -> Bytes {
    let mut buf = BytesMut::new();
    for change in changes {
        Frame::Change(Bytes::copy_from_slice(change)).encode_into(&mut buf);
    }
    Frame::BacklogComplete.encode_into(&mut buf);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_frame_round_trips() {
        let frame = Frame::Change(Bytes::from_static(b"hello"));
        let encoded = frame.encode();
        assert_eq!(encoded.as_ref(), &[1, 0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
        let decoded = decode_all(encoded).expect("decode");
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn backlog_complete_has_no_payload() {
        let encoded = Frame::BacklogComplete.encode();
        assert_eq!(encoded.as_ref(), &[2]);
        assert_eq!(decode_all(encoded).expect("decode"), vec![Frame::BacklogComplete]);
    }

    #[test]
    fn multiple_changes_concatenate_and_recover_framing() {
        let backlog = encode_backlog([b"one".as_slice(), b"two".as_slice()]);
        let frames = decode_all(backlog).expect("decode");
        assert_eq!(
            frames,
            vec![
                Frame::Change(Bytes::from_static(b"one")),
                Frame::Change(Bytes::from_static(b"two")),
                Frame::BacklogComplete,
            ]
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        let buf = Bytes::from_static(&[9]);
        assert!(matches!(decode_all(buf), Err(DecodeError::UnknownTag(9))));
    }

    #[test]
    fn rejects_truncated_length_prefix() {
        let buf = Bytes::from_static(&[1, 0, 0]);
        assert!(matches!(decode_all(buf), Err(DecodeError::Truncated)));
    }

    #[test]
    fn rejects_truncated_payload() {
        let buf = Bytes::from_static(&[1, 0, 0, 0, 10, b'a', b'b']);
        assert!(matches!(decode_all(buf), Err(DecodeError::Truncated)));
    }
}
