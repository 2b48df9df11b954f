pub mod catalog;
pub mod clan;
pub mod cli;
pub mod config;
pub mod equipment;
pub mod error;
pub mod guard;
pub mod inventory;
pub mod logging;
pub mod notify;
pub mod progress;
pub mod session;
pub mod task;
pub mod testing;
pub mod transport;
