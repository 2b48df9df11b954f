use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use idlelink::{
    error::{SyncErrorKind, connection_error},
    testing::LoopbackConnector,
    transport::{
        ConnectionState, DisconnectInfo, OutboundFrame, ServerRecord, SocketConnector,
        SocketEvent, Transport, tags,
        wire::{ClientRecord, SlotSwap},
    },
};

const URL: &str = "ws://loopback.test/ws";

fn transport() -> (Arc<LoopbackConnector>, Arc<Transport>) {
    let connector = Arc::new(LoopbackConnector::default());
    let (transport, _events) = Transport::new(Arc::clone(&connector) as Arc<dyn SocketConnector>);
    (connector, transport)
}

fn open(connector: &LoopbackConnector, transport: &Transport) {
    transport.connect(URL).expect("connect should succeed");
    let link = connector.last_link().expect("link opened");
    transport.handle_link_event(link.event(SocketEvent::Opened));
}

#[test]
fn given_offline_transport_when_link_opens_then_connected_and_connect_listeners_fire() {
    let (connector, transport) = transport();
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    transport.registry().register_connect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    transport.connect(URL).expect("connect should succeed");
    assert_eq!(transport.state(), ConnectionState::Connecting);
    assert_eq!(connects.load(Ordering::SeqCst), 0);

    let link = connector.last_link().expect("link opened");
    assert_eq!(link.url, URL);
    transport.handle_link_event(link.event(SocketEvent::Opened));

    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    assert!(link.drain_frames().is_empty(), "transport sends nothing on its own");
}

#[test]
fn given_connecting_transport_when_connect_again_then_connection_error() {
    let (_connector, transport) = transport();
    transport.connect(URL).expect("first connect");
    let err = transport.connect(URL).expect_err("second connect must fail");
    assert_eq!(err.kind, SyncErrorKind::Connection);
    assert_eq!(transport.state(), ConnectionState::Connecting);
}

#[test]
fn given_connector_failure_when_connect_then_back_offline() {
    let (connector, transport) = transport();
    connector.fail_next_open(connection_error("refused"));

    let err = transport.connect(URL).expect_err("connect must fail");
    assert_eq!(err.kind, SyncErrorKind::Connection);
    assert_eq!(transport.state(), ConnectionState::Offline);

    transport.connect(URL).expect("a later connect works");
    assert_eq!(transport.state(), ConnectionState::Connecting);
}

#[test]
fn given_offline_transport_when_send_then_connection_error_and_nothing_written() {
    let (connector, transport) = transport();
    let record = ClientRecord::SwitchItems(SlotSwap {
        first: 0,
        second: 1,
    });
    let err = transport.send(&record).expect_err("offline send must fail");
    assert_eq!(err.kind, SyncErrorKind::Connection);

    transport.connect(URL).expect("connect");
    let err = transport.send(&record).expect_err("connecting send must fail");
    assert_eq!(err.kind, SyncErrorKind::Connection);
    let link = connector.last_link().expect("link opened");
    assert!(link.drain_frames().is_empty());
}

#[test]
fn given_connected_transport_when_send_then_tagged_text_frame_is_written() {
    let (connector, transport) = transport();
    open(&connector, &transport);

    transport
        .send(&ClientRecord::SwitchItems(SlotSwap {
            first: 3,
            second: 1,
        }))
        .expect("send should succeed");

    let link = connector.last_link().expect("link opened");
    assert_eq!(
        link.drain_json(),
        vec![serde_json::json!({"tag": 10, "first": 3, "second": 1})]
    );
}

#[test]
fn given_connected_transport_when_close_then_close_frame_and_disconnect_listeners() {
    let (connector, transport) = transport();
    let seen: Arc<Mutex<Vec<DisconnectInfo>>> = Arc::default();
    let sink = Arc::clone(&seen);
    transport
        .registry()
        .register_disconnect(move |info| sink.lock().expect("lock").push(info.clone()));
    open(&connector, &transport);

    transport.close().expect("close should succeed");
    assert_eq!(transport.state(), ConnectionState::Offline);

    let link = connector.last_link().expect("link opened");
    assert_eq!(
        link.drain_frames(),
        vec![OutboundFrame::Close {
            code: 1000,
            reason: "client closed".to_string(),
        }]
    );
    let seen = seen.lock().expect("lock").clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].was_connected);
    assert_eq!(seen[0].code, 1000);

    transport.close().expect("closing while offline is a no-op");
}

#[test]
fn given_server_close_when_handled_then_offline_with_reported_code() {
    let (connector, transport) = transport();
    let seen: Arc<Mutex<Vec<DisconnectInfo>>> = Arc::default();
    let sink = Arc::clone(&seen);
    transport
        .registry()
        .register_disconnect(move |info| sink.lock().expect("lock").push(info.clone()));
    open(&connector, &transport);

    let link = connector.last_link().expect("link opened");
    transport.handle_link_event(link.event(SocketEvent::Closed {
        code: 4001,
        reason: "kicked".to_string(),
    }));

    assert_eq!(transport.state(), ConnectionState::Offline);
    assert_eq!(
        seen.lock().expect("lock").clone(),
        vec![DisconnectInfo {
            was_connected: true,
            code: 4001,
            reason: "kicked".to_string(),
        }]
    );
}

#[test]
fn given_events_from_previous_link_when_handled_then_ignored() {
    let (connector, transport) = transport();
    let packets = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&packets);
    transport
        .registry()
        .register_packet(tags::TASK_CANCELLED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    open(&connector, &transport);
    let first = connector.last_link().expect("first link");
    transport.handle_link_event(first.event(SocketEvent::Closed {
        code: 1006,
        reason: "dropped".to_string(),
    }));

    transport.connect(URL).expect("reconnect");
    let second = connector.last_link().expect("second link");
    assert_ne!(first.link_id, second.link_id);

    transport.handle_link_event(first.event(SocketEvent::Opened));
    assert_eq!(transport.state(), ConnectionState::Connecting);

    transport.handle_link_event(second.event(SocketEvent::Opened));
    transport.handle_link_event(first.event(SocketEvent::Message(r#"{"tag":22}"#.to_string())));
    assert_eq!(packets.load(Ordering::SeqCst), 0);

    transport.handle_link_event(second.event(SocketEvent::Message(r#"{"tag":22}"#.to_string())));
    assert_eq!(packets.load(Ordering::SeqCst), 1);
}

#[test]
fn given_malformed_or_unknown_records_when_received_then_dropped_without_dispatch() {
    let (connector, transport) = transport();
    let delivered: Arc<Mutex<Vec<ServerRecord>>> = Arc::default();
    for tag in [tags::SWITCH_ITEMS, 4242] {
        let sink = Arc::clone(&delivered);
        transport
            .registry()
            .register_packet(tag, move |record| sink.lock().expect("lock").push(record.clone()));
    }
    open(&connector, &transport);
    let link = connector.last_link().expect("link opened");

    for text in ["not json", "[1]", r#"{"tag":10,"first":"x"}"#, r#"{"tag":4242}"#] {
        transport.handle_link_event(link.event(SocketEvent::Message(text.to_string())));
    }

    assert!(delivered.lock().expect("lock").is_empty());
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[test]
fn given_link_failure_when_handled_then_error_listeners_fire_and_state_is_kept() {
    let (connector, transport) = transport();
    let reasons: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&reasons);
    transport
        .registry()
        .register_error(move |reason| sink.lock().expect("lock").push(reason.to_string()));
    open(&connector, &transport);

    let link = connector.last_link().expect("link opened");
    transport.handle_link_event(link.event(SocketEvent::Failed("tls alert".to_string())));

    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(
        reasons.lock().expect("lock").clone(),
        vec!["tls alert".to_string()]
    );
}
