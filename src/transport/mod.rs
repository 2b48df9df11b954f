pub mod adapters;
pub mod connection;
pub mod ports;
pub mod registry;
pub mod runtime;
pub mod wire;

pub use connection::{ConnectionState, Transport};
pub use ports::{
    LinkEvent, LinkEventReceiver, LinkId, OutboundFrame, OutboundPort, SocketConnector,
    SocketEvent,
};
pub use registry::{DisconnectInfo, DispatchRegistry, ListenerCategory, ListenerId};
pub use runtime::pump_link_events;
pub use wire::{ClientRecord, RecordTag, ServerRecord, tags};
