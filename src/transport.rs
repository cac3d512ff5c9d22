//! Transport layer contract (consumed, not implemented here).
//!
//! Framing, `T_C_*` tokens, polling, and physical I/O to the CI slot device
//! live below this layer and are out of scope (§1). This module only
//! defines the narrow interface the session layer needs: a way to send
//! bytes to a `(slot, connection)` and a single callback subscription for
//! inbound data and connection/slot teardown.

/// Reason code for a transport callback invocation (§4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackReason {
    /// Inbound bytes arrived on `(slot_id, connection_id)`.
    Data,
    /// The transport connection was closed.
    ConnectionClose,
    /// The CI slot was closed (module removed, or slot reset).
    SlotClose,
}

/// One outbound segment for a scatter/gather send.
pub type IoSlice<'a> = &'a [u8];

/// The transport capability the session layer depends on (§6 "Transport
/// contract (consumed)").
///
/// Implementations own framing and physical I/O; `send_data`/`send_datav`
/// return `Ok(())` on success and `Err(code)` with the transport's own
/// error code on failure, per the `tl_get_error`-style contract in §6.
pub trait TransportLayer: Send + Sync {
    /// Send a single contiguous frame to `(slot_id, connection_id)`.
    fn send_data(&self, slot_id: u8, connection_id: u8, data: &[u8]) -> Result<(), i32>;

    /// Send a frame assembled from multiple segments without an
    /// intermediate copy. The default implementation concatenates and
    /// forwards to [`send_data`](Self::send_data); transports that can do
    /// real scatter/gather I/O should override this.
    fn send_datav(&self, slot_id: u8, connection_id: u8, segments: &[IoSlice<'_>]) -> Result<(), i32> {
        let mut buf = Vec::with_capacity(segments.iter().map(|s| s.len()).sum());
        for seg in segments {
            buf.extend_from_slice(seg);
        }
        self.send_data(slot_id, connection_id, &buf)
    }
}
