use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use idlelink::{
    testing::LoopbackConnector,
    transport::{
        ConnectionState, ServerRecord, SocketConnector, SocketEvent, Transport, pump_link_events,
        tags,
    },
};

#[tokio::test]
async fn given_queued_link_events_when_pumped_then_applied_in_arrival_order() {
    let connector = Arc::new(LoopbackConnector::default());
    let (transport, link_events) =
        Transport::new(Arc::clone(&connector) as Arc<dyn SocketConnector>);

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    transport
        .registry()
        .register_packet(tags::SWITCH_ITEMS, move |record| {
            if let ServerRecord::ItemsSwitched(swap) = record {
                let _ = seen_tx.send((swap.first, swap.second));
            }
        });

    let shutdown = CancellationToken::new();
    let pump = tokio::spawn(pump_link_events(
        Arc::clone(&transport),
        link_events,
        shutdown.clone(),
    ));

    transport
        .connect("ws://loopback.test/ws")
        .expect("connect should succeed");
    let link = connector.last_link().expect("link opened");
    assert!(link.emit(SocketEvent::Opened));
    for first in 0..5usize {
        let text = format!(r#"{{"tag":10,"first":{first},"second":7}}"#);
        assert!(link.emit(SocketEvent::Message(text)));
    }

    let mut order = Vec::new();
    for _ in 0..5 {
        let swap = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
            .await
            .expect("dispatch within timeout")
            .expect("listener alive");
        order.push(swap.0);
    }
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert_eq!(transport.state(), ConnectionState::Connected);

    shutdown.cancel();
    let handled = pump.await.expect("pump task should not panic");
    assert_eq!(handled, 6);
}

#[tokio::test]
async fn given_cancelled_token_when_pump_starts_then_returns_without_handling() {
    let connector = Arc::new(LoopbackConnector::default());
    let (transport, link_events) =
        Transport::new(Arc::clone(&connector) as Arc<dyn SocketConnector>);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let handled = pump_link_events(transport, link_events, shutdown).await;
    assert_eq!(handled, 0);
}
