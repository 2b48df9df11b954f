use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, frame::coding::CloseCode};

use crate::{
    error::{SyncError, connection_error},
    transport::ports::{
        LinkEvent, LinkEventSender, LinkId, OutboundFrame, OutboundSender, SocketConnector,
        SocketEvent,
    },
};

const ABNORMAL_CLOSE_CODE: u16 = 1006;
const NO_STATUS_CLOSE_CODE: u16 = 1005;

/// Text-frame WebSocket links, one tokio task per link.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl SocketConnector for WebSocketConnector {
    fn open(
        &self,
        url: &str,
        link_id: LinkId,
        events: LinkEventSender,
    ) -> Result<OutboundSender, SyncError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| connection_error(format!("no async runtime for websocket link: {err}")))?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_link(url.to_string(), link_id, events, outbound_rx));
        Ok(outbound_tx)
    }
}

struct LinkReporter {
    link_id: LinkId,
    events: LinkEventSender,
}

impl LinkReporter {
    fn emit(&self, event: SocketEvent) {
        // The receiver only goes away when the client is shutting down.
        let _ = self.events.send(LinkEvent {
            link_id: self.link_id,
            event,
        });
    }

    fn fail(&self, reason: String) {
        self.emit(SocketEvent::Failed(reason.clone()));
        self.emit(SocketEvent::Closed {
            code: ABNORMAL_CLOSE_CODE,
            reason,
        });
    }
}

async fn run_link(
    url: String,
    link_id: LinkId,
    events: LinkEventSender,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    let reporter = LinkReporter { link_id, events };

    let socket = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(err) => {
            tracing::warn!(target: "transport", link_id = link_id, url = %url, error = %err, "websocket_connect_failed");
            reporter.fail(format!("connect {url}: {err}"));
            return;
        }
    };
    reporter.emit(SocketEvent::Opened);

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        reporter.fail(format!("websocket write failed: {err}"));
                        return;
                    }
                }
                Some(OutboundFrame::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    let _ = sink.close().await;
                    reporter.emit(SocketEvent::Closed { code, reason });
                    return;
                }
                None => {
                    let _ = sink.close().await;
                    reporter.emit(SocketEvent::Closed {
                        code: NO_STATUS_CLOSE_CODE,
                        reason: "outbound channel dropped".to_string(),
                    });
                    return;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => reporter.emit(SocketEvent::Message(text)),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|frame| (u16::from(frame.code), frame.reason.into_owned()))
                        .unwrap_or((NO_STATUS_CLOSE_CODE, String::new()));
                    reporter.emit(SocketEvent::Closed { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    reporter.fail(format!("websocket read failed: {err}"));
                    return;
                }
                None => {
                    reporter.emit(SocketEvent::Closed {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: "stream ended".to_string(),
                    });
                    return;
                }
            },
        }
    }
}
