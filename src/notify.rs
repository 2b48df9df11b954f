use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    catalog::{EquipmentSlot, ItemId, Skill, TaskRef},
    error::{SyncError, log_handler_error},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStopReason {
    Cancelled,
    OutOfResources,
    Disconnected,
}

/// Domain events for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    InventoryChanged,
    ItemEquipped {
        slot: EquipmentSlot,
        item_id: ItemId,
        count: u64,
    },
    ItemUnequipped {
        slot: EquipmentSlot,
        item_id: ItemId,
        count: u64,
    },
    TaskStarted {
        task: TaskRef,
    },
    TaskStopped {
        task: Option<TaskRef>,
        reason: TaskStopReason,
    },
    TaskCompleted {
        task: TaskRef,
    },
    ExperienceGained {
        skill: Skill,
        amount: u64,
    },
    LevelUp {
        skill: Skill,
        level: u32,
    },
    ClanChanged,
    ClanDiscarded,
    ServerError {
        message: String,
        code: Option<String>,
    },
    /// Generic failure after a desync; details are in the logs.
    Failure {
        message: String,
    },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Listener wrapper tail: logs a failed handler and tells the UI layer when
/// the failure left local state suspect.
pub(crate) fn report_handler_result(
    notifier: &dyn NotificationSink,
    target_module: &'static str,
    handler: &str,
    result: Result<(), SyncError>,
) {
    if let Err(err) = result
        && log_handler_error(target_module, handler, &err)
    {
        notifier.notify(Notification::Failure {
            message: err.to_string(),
        });
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn notify(&self, _notification: Notification) {}
}

#[derive(Debug, Clone)]
pub struct ChannelNotificationSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotificationSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!(target: "notify", "notification_receiver_gone");
        }
    }
}
