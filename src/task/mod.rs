mod manager;
pub mod pipeline;
pub mod session;

pub use manager::{TaskDependencies, TaskManager};
pub use session::{TaskPhase, TaskSession};
