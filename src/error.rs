//! Error types for the EN 50221 session layer.

use std::fmt;

/// Errors that can occur in the session layer.
///
/// Variants map to the taxonomy the session layer surfaces to callers and
/// to the transport errors it passes through unchanged:
///
/// - **Session table**: [`BadSessionNumber`](Self::BadSessionNumber),
///   [`NoFreeSession`](Self::NoFreeSession).
/// - **Outbound framing**: [`IovLimit`](Self::IovLimit).
/// - **Transport**: [`TransportError`](Self::TransportError) — the
///   transport's own error code.
/// - **Inbound decode**: [`MalformedSpdu`](Self::MalformedSpdu) — never
///   returned to a caller, only logged and recorded as the last error.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum SessionError {
    /// Session number is out of range, or not in a state that permits the
    /// requested operation (e.g. `send_data` on a non-`Active` session).
    #[error("bad session number: {0}")]
    BadSessionNumber(u16),

    /// No `Idle` slot was available to host a new session.
    #[error("no free session slot (capacity {0})")]
    NoFreeSession(usize),

    /// `send_datav` was called with more than 9 user segments.
    #[error("iovec limit exceeded: {0} segments (max 9)")]
    IovLimit(usize),

    /// The underlying transport reported an error.
    #[error("transport error: {0}")]
    TransportError(i32),

    /// An inbound SPDU was malformed (wrong length field, truncated body,
    /// or unrecognised tag). Never changes session state.
    #[error("malformed SPDU: {0}")]
    MalformedSpdu(MalformedSpduKind),
}

/// Specific kind of SPDU decode failure, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedSpduKind {
    /// Buffer was empty.
    EmptyBuffer,
    /// Tag byte did not match any known SPDU.
    UnknownTag(u8),
    /// Declared length field disagreed with the remaining buffer, or with
    /// the fixed length this SPDU requires.
    BadLength,
}

impl fmt::Display for MalformedSpduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyBuffer => write!(f, "empty buffer"),
            Self::UnknownTag(tag) => write!(f, "unknown tag 0x{tag:02x}"),
            Self::BadLength => write!(f, "length field mismatch"),
        }
    }
}

/// Convenience alias for `Result<T, SessionError>`.
pub type Result<T> = std::result::Result<T, SessionError>;
