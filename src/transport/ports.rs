use tokio::sync::mpsc;

use crate::{error::SyncError, transport::wire::ClientRecord};

pub type LinkId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Closed { code: u16, reason: String },
    Failed(String),
}

/// A socket event stamped with the generation of the link that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub link_id: LinkId,
    pub event: SocketEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;
pub type OutboundSender = mpsc::UnboundedSender<OutboundFrame>;

/// Opens the underlying socket for one link. Implementations report progress
/// through `events` and accept frames on the returned sender.
pub trait SocketConnector: Send + Sync {
    fn open(
        &self,
        url: &str,
        link_id: LinkId,
        events: LinkEventSender,
    ) -> Result<OutboundSender, SyncError>;
}

/// The one thing domain managers need from the transport.
pub trait OutboundPort: Send + Sync {
    fn send(&self, record: &ClientRecord) -> Result<(), SyncError>;
}
