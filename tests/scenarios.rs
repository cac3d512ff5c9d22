//! End-to-end scenarios A–F against the public API, using the in-memory
//! fixtures in [`en50221_session::testing`] instead of a real transport
//! (out of scope for this crate).

use std::sync::Arc;

use en50221_session::layer::SessionLayer;
use en50221_session::observer::{LifecycleReason, LookupDecision};
use en50221_session::spdu;
use en50221_session::testing::{RecordingTransport, ScriptedObserver};
use en50221_session::transport::CallbackReason;

fn layer_with(max_sessions: usize) -> (SessionLayer, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    (SessionLayer::new(transport.clone(), max_sessions), transport)
}

/// Scenario A — module opens the AI resource; accepted, becomes Active.
#[test]
fn module_opens_ai_resource() {
    let (layer, transport) = layer_with(4);
    let observer = Arc::new(ScriptedObserver::accepting());
    layer.register_lookup(observer.clone());
    layer.register_session_callback(observer.clone());

    layer.on_transport_event(CallbackReason::Data, 3, 0, &[0x91, 0x04, 0x00, 0x01, 0x00, 0x41]);

    assert_eq!(
        transport.sent(),
        vec![vec![0x92, 0x07, 0x00, 0x00, 0x01, 0x00, 0x41, 0x00, 0x00]]
    );
    assert_eq!(
        observer.lifecycle_log(),
        vec![
            (LifecycleReason::Connecting, 3, 0, 0x0001_0041),
            (LifecycleReason::Connected, 3, 0, 0x0001_0041),
        ]
    );
}

/// Scenario B — module opens an unknown resource; rejected, no lifecycle call.
#[test]
fn module_opens_unknown_resource() {
    let (layer, transport) = layer_with(4);
    let observer = Arc::new(ScriptedObserver::rejecting(LookupDecision::NoResource));
    layer.register_lookup(observer.clone());
    layer.register_session_callback(observer.clone());

    layer.on_transport_event(CallbackReason::Data, 3, 0, &[0x91, 0x04, 0x00, 0xFF, 0xFF, 0xFF]);

    assert_eq!(
        transport.sent(),
        vec![vec![0x92, 0x07, 0xF0, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]]
    );
    assert!(observer.lifecycle_log().is_empty());
}

/// Scenario C — the Connecting hook vetoes the open; CloseResourceBusy and ConnectFail.
#[test]
fn connecting_hook_marks_resource_busy() {
    let (layer, transport) = layer_with(4);
    let observer = Arc::new(ScriptedObserver::busy());
    layer.register_lookup(observer.clone());
    layer.register_session_callback(observer.clone());

    layer.on_transport_event(CallbackReason::Data, 3, 0, &[0x91, 0x04, 0x00, 0x01, 0x00, 0x41]);

    assert_eq!(
        transport.sent(),
        vec![vec![0x92, 0x07, 0xF3, 0x00, 0x01, 0x00, 0x41, 0x00, 0x00]]
    );
    assert_eq!(
        observer.lifecycle_log(),
        vec![
            (LifecycleReason::Connecting, 3, 0, 0x0001_0041),
            (LifecycleReason::ConnectFail, 3, 0, 0x0001_0041),
        ]
    );
}

/// Scenario D — host creates a session then tears it down.
#[test]
fn host_creates_then_tears_down() {
    let (layer, transport) = layer_with(4);

    let sn = layer.create_session(2, 0, 0x0003_0041).expect("allocate");
    assert_eq!(transport.sent(), vec![spdu::encode_create_session(0x0003_0041, sn)]);
    transport.clear();

    layer.on_transport_event(CallbackReason::Data, 2, 0, &spdu::encode_create_session_res(0x00, 0x0003_0041, sn));
    layer.send_data(sn, b"ping").expect("session is Active");
    transport.clear();

    layer.destroy_session(sn).expect("session is Active");
    assert_eq!(transport.sent(), vec![spdu::encode_close_session_req(sn)]);
    transport.clear();

    layer.on_transport_event(CallbackReason::Data, 2, 0, &spdu::encode_close_session_res(0x00, sn));
    assert!(layer.send_data(sn, b"late").is_err(), "session is Idle again");
}

/// Scenario E — an active session's payload is routed to its resource callback.
#[test]
fn payload_routing() {
    let (layer, _transport) = layer_with(8);
    let observer = Arc::new(ScriptedObserver::accepting());
    layer.register_lookup(observer.clone());
    layer.register_session_callback(observer.clone());

    layer.on_transport_event(CallbackReason::Data, 1, 0, &[0x91, 0x04, 0x00, 0x01, 0x00, 0x41]);

    let mut wire = vec![0x90, 0x05, 0x00, 0x00];
    wire.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
    layer.on_transport_event(CallbackReason::Data, 1, 0, &wire);

    assert_eq!(observer.data_log(), vec![(1, 0, 0x0001_0041, vec![0xAA, 0xBB, 0xCC])]);
}

/// Scenario F — a slot close tears down only the sessions on that slot.
#[test]
fn slot_close_cascades_to_matching_sessions_only() {
    let (layer, _transport) = layer_with(8);
    let observer = Arc::new(ScriptedObserver::accepting());
    layer.register_lookup(observer.clone());
    layer.register_session_callback(observer.clone());

    for (slot, conn) in [(7u8, 0u8), (8, 0), (7, 0), (8, 0), (7, 0)] {
        layer.on_transport_event(CallbackReason::Data, slot, conn, &[0x91, 0x04, 0x00, 0x01, 0x00, 0x41]);
    }
    observer.clear_lifecycle_log();

    layer.on_transport_event(CallbackReason::SlotClose, 7, 0, &[]);

    let closes = observer.lifecycle_log();
    assert_eq!(closes.len(), 3);
    assert!(closes.iter().all(|(reason, slot, _, _)| *reason == LifecycleReason::Close && *slot == 7));
}
