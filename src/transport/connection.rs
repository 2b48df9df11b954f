use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    error::{SyncError, connection_error},
    transport::{
        ports::{
            LinkEvent, LinkEventReceiver, LinkEventSender, LinkId, OutboundFrame, OutboundPort,
            OutboundSender, SocketConnector, SocketEvent,
        },
        registry::{DisconnectInfo, DispatchRegistry},
        wire::{ClientRecord, ServerRecord, decode_server_record, encode_client_record},
    },
};

pub const CLIENT_CLOSE_CODE: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Offline,
    Connecting,
    Connected,
}

struct ConnectionInner {
    state: ConnectionState,
    link_id: LinkId,
    outbound: Option<OutboundSender>,
}

pub struct Transport {
    inner: Mutex<ConnectionInner>,
    registry: DispatchRegistry,
    connector: Arc<dyn SocketConnector>,
    events_tx: LinkEventSender,
}

impl Transport {
    pub fn new(connector: Arc<dyn SocketConnector>) -> (Arc<Self>, LinkEventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Offline,
                link_id: 0,
                outbound: None,
            }),
            registry: DispatchRegistry::new(),
            connector,
            events_tx,
        });
        (transport, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().expect("lock poisoned").state
    }

    pub fn registry(&self) -> &DispatchRegistry {
        &self.registry
    }

    #[tracing::instrument(name = "transport_connect", target = "transport", skip(self))]
    pub fn connect(&self, url: &str) -> Result<(), SyncError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.state != ConnectionState::Offline {
            return Err(connection_error(format!(
                "connect requested while {:?}",
                inner.state
            )));
        }

        let link_id = inner.link_id.saturating_add(1);
        inner.link_id = link_id;
        inner.state = ConnectionState::Connecting;

        match self.connector.open(url, link_id, self.events_tx.clone()) {
            Ok(outbound) => {
                inner.outbound = Some(outbound);
                tracing::info!(target: "transport", link_id = link_id, "link_connecting");
                Ok(())
            }
            Err(err) => {
                inner.state = ConnectionState::Offline;
                inner.outbound = None;
                tracing::warn!(
                    target: "transport",
                    link_id = link_id,
                    error = %err,
                    "link_open_failed"
                );
                Err(err)
            }
        }
    }

    pub fn send(&self, record: &ClientRecord) -> Result<(), SyncError> {
        let outbound = {
            let inner = self.inner.lock().expect("lock poisoned");
            if inner.state != ConnectionState::Connected {
                return Err(connection_error(format!(
                    "cannot send record tag {} while {:?}",
                    record.tag(),
                    inner.state
                )));
            }
            inner
                .outbound
                .clone()
                .ok_or_else(|| connection_error("connected link has no outbound channel"))?
        };

        let text = encode_client_record(record)?;
        outbound
            .send(OutboundFrame::Text(text))
            .map_err(|_| connection_error("outbound link is closed"))?;
        tracing::trace!(target: "transport", tag = record.tag(), "record_sent");
        Ok(())
    }

    pub fn close(&self) -> Result<(), SyncError> {
        let info = {
            let mut inner = self.inner.lock().expect("lock poisoned");
            if inner.state == ConnectionState::Offline {
                return Ok(());
            }
            let was_connected = inner.state == ConnectionState::Connected;
            if let Some(outbound) = inner.outbound.take() {
                let _ = outbound.send(OutboundFrame::Close {
                    code: CLIENT_CLOSE_CODE,
                    reason: "client closed".to_string(),
                });
            }
            inner.state = ConnectionState::Offline;
            DisconnectInfo {
                was_connected,
                code: CLIENT_CLOSE_CODE,
                reason: "client closed".to_string(),
            }
        };

        tracing::info!(target: "transport", was_connected = info.was_connected, "link_closed_by_client");
        self.registry.dispatch_disconnect(&info);
        Ok(())
    }

    /// Applies one socket event. Callers deliver events one at a time.
    pub fn handle_link_event(&self, link_event: LinkEvent) {
        let LinkEvent { link_id, event } = link_event;
        {
            let inner = self.inner.lock().expect("lock poisoned");
            if link_id != inner.link_id || inner.state == ConnectionState::Offline {
                tracing::debug!(
                    target: "transport",
                    link_id = link_id,
                    current_link_id = inner.link_id,
                    "stale_link_event_dropped"
                );
                return;
            }
        }

        match event {
            SocketEvent::Opened => self.on_opened(link_id),
            SocketEvent::Message(text) => self.on_message(&text),
            SocketEvent::Closed { code, reason } => self.on_closed(link_id, code, reason),
            SocketEvent::Failed(reason) => {
                tracing::warn!(target: "transport", link_id = link_id, reason = %reason, "link_error");
                self.registry.dispatch_error(&reason);
            }
        }
    }

    fn on_opened(&self, link_id: LinkId) {
        {
            let mut inner = self.inner.lock().expect("lock poisoned");
            if inner.state != ConnectionState::Connecting {
                return;
            }
            inner.state = ConnectionState::Connected;
        }
        tracing::info!(target: "transport", link_id = link_id, "link_connected");
        self.registry.dispatch_connect();
    }

    fn on_message(&self, text: &str) {
        if self.state() != ConnectionState::Connected {
            tracing::debug!(target: "transport", "message_before_open_dropped");
            return;
        }

        let record = match decode_server_record(text) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(target: "transport", error = %err, "malformed_record_dropped");
                return;
            }
        };

        if let ServerRecord::Unrecognized { tag } = record {
            tracing::warn!(target: "transport", tag = tag, "unknown_record_dropped");
            return;
        }

        let delivered = self.registry.dispatch_packet(&record);
        if delivered == 0 {
            tracing::debug!(target: "transport", tag = record.tag(), "record_without_listener");
        }
    }

    fn on_closed(&self, link_id: LinkId, code: u16, reason: String) {
        let was_connected = {
            let mut inner = self.inner.lock().expect("lock poisoned");
            let was_connected = inner.state == ConnectionState::Connected;
            inner.state = ConnectionState::Offline;
            inner.outbound = None;
            was_connected
        };

        tracing::info!(
            target: "transport",
            link_id = link_id,
            code = code,
            reason = %reason,
            was_connected = was_connected,
            "link_closed"
        );
        self.registry.dispatch_disconnect(&DisconnectInfo {
            was_connected,
            code,
            reason,
        });
    }
}

impl OutboundPort for Transport {
    fn send(&self, record: &ClientRecord) -> Result<(), SyncError> {
        Transport::send(self, record)
    }
}
