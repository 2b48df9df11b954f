use serde::Serialize;
use time::OffsetDateTime;

use crate::catalog::TaskRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Idle,
    /// No session yet, but a toggle request is in flight.
    Starting,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSession {
    pub task: TaskRef,
    pub started_at: OffsetDateTime,
}

impl TaskSession {
    pub fn begin(task: TaskRef) -> Self {
        Self {
            task,
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn restart(&mut self) {
        self.started_at = OffsetDateTime::now_utc();
    }

    pub fn elapsed(&self) -> time::Duration {
        OffsetDateTime::now_utc() - self.started_at
    }
}
