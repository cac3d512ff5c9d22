//! SPDU wire format (EN 50221 §A.4.1.13 session layer).
//!
//! Every SPDU is `[tag:u8][len:u8][body:len bytes]`. The length field is a
//! single byte — bodies never exceed 255 bytes at this layer. Multi-byte
//! integers on the wire are big-endian.
//!
//! ```text
//! ST_OPEN_SESSION_REQ     0x91  len=4  resource_id
//! ST_OPEN_SESSION_RES     0x92  len=7  status, resource_id, session_nb
//! ST_CREATE_SESSION       0x93  len=6  resource_id, session_nb
//! ST_CREATE_SESSION_RES   0x94  len=7  status, resource_id, session_nb
//! ST_CLOSE_SESSION_REQ    0x95  len=2  session_nb
//! ST_CLOSE_SESSION_RES    0x96  len=3  status, session_nb
//! ST_SESSION_NUMBER       0x90  len=2+ session_nb, payload...
//! ```
//!
//! Decode failures (short buffer, wrong `len` field, unknown tag) never
//! panic — they return [`SessionError::MalformedSpdu`] so the caller can
//! log and drop the frame without touching session state.

use crate::error::{MalformedSpduKind, SessionError};

/// SPDU tag bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    SessionNumber = 0x90,
    OpenSessionReq = 0x91,
    OpenSessionRes = 0x92,
    CreateSession = 0x93,
    CreateSessionRes = 0x94,
    CloseSessionReq = 0x95,
    CloseSessionRes = 0x96,
}

impl Tag {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x90 => Self::SessionNumber,
            0x91 => Self::OpenSessionReq,
            0x92 => Self::OpenSessionRes,
            0x93 => Self::CreateSession,
            0x94 => Self::CreateSessionRes,
            0x95 => Self::CloseSessionReq,
            0x96 => Self::CloseSessionRes,
            _ => return None,
        })
    }
}

/// Session-open/close status codes (EN 50221 §A.4.1.13 Table 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Session is open / closed cleanly.
    Open = 0x00,
    /// No resource matching the requested id is available.
    CloseNoResource = 0xF0,
    /// Resource exists but is currently unavailable.
    CloseResourceUnavailable = 0xF1,
    /// Resource exists but its version is too low for the request.
    CloseResourceLowVersion = 0xF2,
    /// Resource exists but is busy (see `Connecting` lifecycle veto, §4.3).
    CloseResourceBusy = 0xF3,
}

impl Status {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Self::Open,
            0xF0 => Self::CloseNoResource,
            0xF1 => Self::CloseResourceUnavailable,
            0xF2 => Self::CloseResourceLowVersion,
            0xF3 => Self::CloseResourceBusy,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A decoded SPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spdu {
    OpenSessionReq {
        resource_id: u32,
    },
    OpenSessionRes {
        status: u8,
        resource_id: u32,
        session_nb: u16,
    },
    CreateSession {
        resource_id: u32,
        session_nb: u16,
    },
    CreateSessionRes {
        status: u8,
        resource_id: u32,
        session_nb: u16,
    },
    CloseSessionReq {
        session_nb: u16,
    },
    CloseSessionRes {
        status: u8,
        session_nb: u16,
    },
    /// User payload framed under a session number. `payload` borrows
    /// directly from the decoded buffer — no copy on the inbound path.
    SessionNumber {
        session_nb: u16,
        payload_len: usize,
    },
}

/// Encode `ST_OPEN_SESSION_REQ`.
pub fn encode_open_session_req(resource_id: u32) -> Vec<u8> {
    let mut out = vec![Tag::OpenSessionReq as u8, 4];
    out.extend_from_slice(&resource_id.to_be_bytes());
    out
}

/// Encode `ST_OPEN_SESSION_RES`.
pub fn encode_open_session_res(status: u8, resource_id: u32, session_nb: u16) -> Vec<u8> {
    let mut out = vec![Tag::OpenSessionRes as u8, 7, status];
    out.extend_from_slice(&resource_id.to_be_bytes());
    out.extend_from_slice(&session_nb.to_be_bytes());
    out
}

/// Encode `ST_CREATE_SESSION`.
pub fn encode_create_session(resource_id: u32, session_nb: u16) -> Vec<u8> {
    let mut out = vec![Tag::CreateSession as u8, 6];
    out.extend_from_slice(&resource_id.to_be_bytes());
    out.extend_from_slice(&session_nb.to_be_bytes());
    out
}

/// Encode `ST_CREATE_SESSION_RES`.
pub fn encode_create_session_res(status: u8, resource_id: u32, session_nb: u16) -> Vec<u8> {
    let mut out = vec![Tag::CreateSessionRes as u8, 7, status];
    out.extend_from_slice(&resource_id.to_be_bytes());
    out.extend_from_slice(&session_nb.to_be_bytes());
    out
}

/// Encode `ST_CLOSE_SESSION_REQ`.
pub fn encode_close_session_req(session_nb: u16) -> Vec<u8> {
    let mut out = vec![Tag::CloseSessionReq as u8, 2];
    out.extend_from_slice(&session_nb.to_be_bytes());
    out
}

/// Encode `ST_CLOSE_SESSION_RES`.
pub fn encode_close_session_res(status: u8, session_nb: u16) -> Vec<u8> {
    let mut out = vec![Tag::CloseSessionRes as u8, 3, status];
    out.extend_from_slice(&session_nb.to_be_bytes());
    out
}

/// Encode the `ST_SESSION_NUMBER` header only (tag, len, session_nb). The
/// caller appends the payload separately (single-segment `send_data`) or
/// via scatter/gather (`send_datav`) — this layer never copies user data
/// to prepend a header.
pub fn encode_session_number_header(session_nb: u16, payload_len: usize) -> Vec<u8> {
    let len = 2usize.saturating_add(payload_len).min(255) as u8;
    let mut out = vec![Tag::SessionNumber as u8, len];
    out.extend_from_slice(&session_nb.to_be_bytes());
    out
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

/// Decode one SPDU from `buf`. On success, returns the SPDU and the number
/// of bytes consumed (`2 + len`, i.e. the whole wire frame).
///
/// For [`Spdu::SessionNumber`], the caller is expected to slice the
/// trailing payload itself as `&buf[4..4 + payload_len]` — this function
/// only validates framing and returns the length, to avoid needing a
/// lifetime on the decoded value.
pub fn decode(buf: &[u8]) -> Result<(Spdu, usize), SessionError> {
    let tag_byte = *buf
        .first()
        .ok_or(SessionError::MalformedSpdu(MalformedSpduKind::EmptyBuffer))?;
    let tag = Tag::from_byte(tag_byte)
        .ok_or(SessionError::MalformedSpdu(MalformedSpduKind::UnknownTag(tag_byte)))?;
    let len = *buf
        .get(1)
        .ok_or(SessionError::MalformedSpdu(MalformedSpduKind::BadLength))? as usize;
    let body = buf
        .get(2..2 + len)
        .ok_or(SessionError::MalformedSpdu(MalformedSpduKind::BadLength))?;

    let bad_len = || SessionError::MalformedSpdu(MalformedSpduKind::BadLength);

    let spdu = match tag {
        Tag::OpenSessionReq => {
            if len != 4 {
                return Err(bad_len());
            }
            Spdu::OpenSessionReq {
                resource_id: be_u32(&body[0..4]),
            }
        }
        Tag::OpenSessionRes => {
            if len != 7 {
                return Err(bad_len());
            }
            Spdu::OpenSessionRes {
                status: body[0],
                resource_id: be_u32(&body[1..5]),
                session_nb: be_u16(&body[5..7]),
            }
        }
        Tag::CreateSession => {
            if len != 6 {
                return Err(bad_len());
            }
            Spdu::CreateSession {
                resource_id: be_u32(&body[0..4]),
                session_nb: be_u16(&body[4..6]),
            }
        }
        Tag::CreateSessionRes => {
            if len != 7 {
                return Err(bad_len());
            }
            Spdu::CreateSessionRes {
                status: body[0],
                resource_id: be_u32(&body[1..5]),
                session_nb: be_u16(&body[5..7]),
            }
        }
        Tag::CloseSessionReq => {
            if len != 2 {
                return Err(bad_len());
            }
            Spdu::CloseSessionReq {
                session_nb: be_u16(&body[0..2]),
            }
        }
        Tag::CloseSessionRes => {
            if len != 3 {
                return Err(bad_len());
            }
            Spdu::CloseSessionRes {
                status: body[0],
                session_nb: be_u16(&body[1..3]),
            }
        }
        Tag::SessionNumber => {
            if len < 2 {
                return Err(bad_len());
            }
            Spdu::SessionNumber {
                session_nb: be_u16(&body[0..2]),
                payload_len: len - 2,
            }
        }
    };

    Ok((spdu, 2 + len))
}

/// Parse a [`Status`] byte, defaulting to `None` on an unrecognised value
/// (the session layer treats an unrecognised status as "not open", per
/// §4.4's `CreateSessionRes(≠0)` edge case — any non-zero byte is a
/// failure status, known or not).
pub fn status_of(byte: u8) -> Option<Status> {
    Status::from_byte(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_open_session_req() {
        let wire = encode_open_session_req(0x0001_0041);
        assert_eq!(wire, [0x91, 0x04, 0x00, 0x01, 0x00, 0x41]);
        let (spdu, consumed) = decode(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(
            spdu,
            Spdu::OpenSessionReq {
                resource_id: 0x0001_0041
            }
        );
    }

    #[test]
    fn round_trip_open_session_res() {
        let wire = encode_open_session_res(0x00, 0x0001_0041, 0);
        assert_eq!(wire, [0x92, 0x07, 0x00, 0x00, 0x01, 0x00, 0x41, 0x00, 0x00]);
        let (spdu, _) = decode(&wire).unwrap();
        assert_eq!(
            spdu,
            Spdu::OpenSessionRes {
                status: 0x00,
                resource_id: 0x0001_0041,
                session_nb: 0
            }
        );
    }

    #[test]
    fn round_trip_create_session_and_res() {
        let wire = encode_create_session(0x0003_0041, 7);
        assert_eq!(wire, [0x93, 0x06, 0x00, 0x03, 0x00, 0x41, 0x00, 0x07]);
        let (spdu, _) = decode(&wire).unwrap();
        assert_eq!(
            spdu,
            Spdu::CreateSession {
                resource_id: 0x0003_0041,
                session_nb: 7
            }
        );

        let wire = encode_create_session_res(0x00, 0x0003_0041, 7);
        let (spdu, _) = decode(&wire).unwrap();
        assert_eq!(
            spdu,
            Spdu::CreateSessionRes {
                status: 0x00,
                resource_id: 0x0003_0041,
                session_nb: 7
            }
        );
    }

    #[test]
    fn round_trip_close_session() {
        let wire = encode_close_session_req(7);
        assert_eq!(wire, [0x95, 0x02, 0x00, 0x07]);
        let (spdu, _) = decode(&wire).unwrap();
        assert_eq!(spdu, Spdu::CloseSessionReq { session_nb: 7 });

        let wire = encode_close_session_res(0x00, 7);
        assert_eq!(wire, [0x96, 0x03, 0x00, 0x00, 0x07]);
        let (spdu, _) = decode(&wire).unwrap();
        assert_eq!(
            spdu,
            Spdu::CloseSessionRes {
                status: 0x00,
                session_nb: 7
            }
        );
    }

    #[test]
    fn session_number_header_and_payload_slice() {
        let hdr = encode_session_number_header(5, 3);
        assert_eq!(hdr, [0x90, 0x05, 0x00, 0x05]);
        let mut wire = hdr;
        wire.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let (spdu, consumed) = decode(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        match spdu {
            Spdu::SessionNumber {
                session_nb,
                payload_len,
            } => {
                assert_eq!(session_nb, 5);
                assert_eq!(&wire[4..4 + payload_len], [0xAA, 0xBB, 0xCC]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_empty_buffer_is_malformed() {
        assert!(matches!(
            decode(&[]),
            Err(SessionError::MalformedSpdu(MalformedSpduKind::EmptyBuffer))
        ));
    }

    #[test]
    fn decode_unknown_tag_is_malformed() {
        assert!(matches!(
            decode(&[0xFF, 0x00]),
            Err(SessionError::MalformedSpdu(MalformedSpduKind::UnknownTag(
                0xFF
            )))
        ));
    }

    #[test]
    fn decode_short_buffer_is_malformed() {
        // Claims len=4 but only 2 bytes follow.
        assert!(matches!(
            decode(&[0x91, 0x04, 0x00, 0x01]),
            Err(SessionError::MalformedSpdu(MalformedSpduKind::BadLength))
        ));
    }

    #[test]
    fn decode_wrong_fixed_length_is_malformed() {
        // OpenSessionReq always has len=4; claiming len=3 is rejected even
        // though the buffer is physically long enough.
        let mut wire = vec![0x91, 0x03, 0x00, 0x01, 0x00];
        wire.push(0x41);
        assert!(matches!(
            decode(&wire),
            Err(SessionError::MalformedSpdu(MalformedSpduKind::BadLength))
        ));
    }

    #[test]
    fn status_decoding() {
        assert_eq!(status_of(0x00), Some(Status::Open));
        assert_eq!(status_of(0xF3), Some(Status::CloseResourceBusy));
        assert_eq!(status_of(0x7F), None);
    }
}
