mod manager;
pub mod slots;

pub use manager::InventoryManager;
pub use slots::{InventorySlot, InventorySlots};
