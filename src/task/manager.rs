use std::sync::{Arc, Mutex};

use crate::{
    catalog::{GameCatalog, TaskCategory, TaskDefinition, TaskId, TaskRef},
    equipment::EquipmentManager,
    error::SyncError,
    guard::{ActionOutcome, GuardTable, GuardedRequest},
    inventory::InventoryManager,
    notify::{Notification, NotificationSink, TaskStopReason, report_handler_result},
    progress::ProgressManager,
    task::{
        pipeline::{self, CostLine, PipelineContext},
        session::{TaskPhase, TaskSession},
    },
    transport::{
        ports::OutboundPort,
        registry::{DispatchRegistry, ListenerId},
        wire::{ClientRecord, ServerRecord, TaskCompletion, tags},
    },
};

const TOGGLE_TASK: GuardedRequest = GuardedRequest::new("toggle_task");

/// Collaborators the task lifecycle reads from and settles into.
#[derive(Clone)]
pub struct TaskDependencies {
    pub catalog: Arc<dyn GameCatalog>,
    pub inventory: InventoryManager,
    pub equipment: EquipmentManager,
    pub progress: ProgressManager,
    pub outbound: Arc<dyn OutboundPort>,
    pub guards: GuardTable,
    pub notifier: Arc<dyn NotificationSink>,
}

#[derive(Clone)]
pub struct TaskManager {
    session: Arc<Mutex<Option<TaskSession>>>,
    deps: TaskDependencies,
}

impl TaskManager {
    pub fn new(deps: TaskDependencies) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            deps,
        }
    }

    pub fn phase(&self) -> TaskPhase {
        if self.session.lock().expect("lock poisoned").is_some() {
            TaskPhase::Active
        } else if self.deps.guards.is_locked(TOGGLE_TASK.key) {
            TaskPhase::Starting
        } else {
            TaskPhase::Idle
        }
    }

    pub fn active_task(&self) -> Option<TaskRef> {
        self.session
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|session| session.task)
    }

    /// Time since the current repetition started.
    pub fn elapsed(&self) -> Option<time::Duration> {
        self.session
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(TaskSession::elapsed)
    }

    /// Starts a task, or stops it when it is already the active one. Nothing
    /// changes locally until the server confirms.
    #[tracing::instrument(name = "activate_task", target = "task", skip(self))]
    pub fn activate_task(
        &self,
        category: TaskCategory,
        task_id: TaskId,
    ) -> Result<ActionOutcome, SyncError> {
        let task_ref = TaskRef { category, task_id };
        if self.active_task() == Some(task_ref) {
            return self.send_toggle(task_ref);
        }

        let Some(task) = self.deps.catalog.task(task_ref) else {
            tracing::warn!(target: "task", task = %task_ref, "activate_rejected_unknown_task");
            return Ok(ActionOutcome::Rejected);
        };
        let level = self.deps.progress.level(task.skill);
        if level < task.level_required {
            tracing::debug!(
                target: "task",
                task = %task_ref,
                level = level,
                level_required = task.level_required,
                "activate_rejected_level"
            );
            return Ok(ActionOutcome::Rejected);
        }
        if !self.can_afford(task) {
            tracing::debug!(target: "task", task = %task_ref, "activate_rejected_unaffordable");
            return Ok(ActionOutcome::Rejected);
        }

        self.send_toggle(task_ref)
    }

    pub fn stop_task(&self) -> Result<ActionOutcome, SyncError> {
        match self.active_task() {
            Some(task_ref) => self.send_toggle(task_ref),
            None => Ok(ActionOutcome::Rejected),
        }
    }

    pub fn handle_record(&self, record: &ServerRecord) -> Result<(), SyncError> {
        match record {
            ServerRecord::TaskStarted(task_ref) => {
                self.confirm_started(*task_ref);
                Ok(())
            }
            ServerRecord::TaskCancelled => {
                self.confirm_cancelled();
                Ok(())
            }
            ServerRecord::TaskCompleted(completion) => {
                self.complete(completion);
                Ok(())
            }
            ServerRecord::PlayerSnapshot(snapshot) => {
                let session = snapshot
                    .active_task
                    .filter(|task_ref| self.deps.catalog.task(*task_ref).is_some())
                    .map(TaskSession::begin);
                *self.session.lock().expect("lock poisoned") = session;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Drops the session without waiting for the server.
    pub fn reset(&self) {
        let previous = self.session.lock().expect("lock poisoned").take();
        if let Some(session) = previous {
            self.deps.notifier.notify(Notification::TaskStopped {
                task: Some(session.task),
                reason: TaskStopReason::Disconnected,
            });
        }
    }

    pub fn install(&self, registry: &DispatchRegistry) -> Vec<ListenerId> {
        [
            tags::PLAYER_SNAPSHOT,
            tags::TASK_STARTED,
            tags::TASK_CANCELLED,
            tags::TASK_COMPLETED,
        ]
        .into_iter()
        .map(|tag| {
            let manager = self.clone();
            registry.register_packet(tag, move |record| {
                let result = manager.handle_record(record);
                report_handler_result(manager.deps.notifier.as_ref(), "task", "task_record", result);
            })
        })
        .collect()
    }

    fn send_toggle(&self, task_ref: TaskRef) -> Result<ActionOutcome, SyncError> {
        TOGGLE_TASK.send(
            &self.deps.guards,
            self.deps.outbound.as_ref(),
            &ClientRecord::ToggleTask(task_ref),
        )
    }

    fn standing_costs(&self, task: &TaskDefinition) -> Vec<CostLine> {
        let upgrades = self.deps.progress.owned_upgrades();
        let equipped = self.deps.equipment.equipped_item_ids();
        let context = PipelineContext {
            catalog: self.deps.catalog.as_ref(),
            upgrades: &upgrades,
            equipped: &equipped,
        };
        pipeline::standing_costs(&context, task)
    }

    fn can_afford(&self, task: &TaskDefinition) -> bool {
        let costs: Vec<_> = self
            .standing_costs(task)
            .into_iter()
            .map(|line| (line.item_id, line.amount))
            .collect();
        self.deps.inventory.can_afford(&costs)
    }

    fn confirm_started(&self, task_ref: TaskRef) {
        self.deps.guards.release(TOGGLE_TASK.key);
        if self.deps.catalog.task(task_ref).is_none() {
            tracing::warn!(target: "task", task = %task_ref, "started_task_unknown");
            return;
        }
        *self.session.lock().expect("lock poisoned") = Some(TaskSession::begin(task_ref));
        tracing::info!(target: "task", task = %task_ref, "task_started");
        self.deps
            .notifier
            .notify(Notification::TaskStarted { task: task_ref });
    }

    fn confirm_cancelled(&self) {
        self.deps.guards.release(TOGGLE_TASK.key);
        let previous = self.session.lock().expect("lock poisoned").take();
        tracing::info!(
            target: "task",
            task = ?previous.map(|session| session.task),
            "task_cancelled"
        );
        self.deps.notifier.notify(Notification::TaskStopped {
            task: previous.map(|session| session.task),
            reason: TaskStopReason::Cancelled,
        });
    }

    #[tracing::instrument(
        name = "task_completed",
        target = "task",
        skip(self, completion),
        fields(task = %completion.task_ref())
    )]
    fn complete(&self, completion: &TaskCompletion) {
        let task_ref = completion.task_ref();
        let Some(task) = self.deps.catalog.task(task_ref) else {
            tracing::warn!(target: "task", task = %task_ref, "completed_task_unknown");
            return;
        };

        let upgrades = self.deps.progress.owned_upgrades();
        let equipped = self.deps.equipment.equipped_item_ids();
        let context = PipelineContext {
            catalog: self.deps.catalog.as_ref(),
            upgrades: &upgrades,
            equipped: &equipped,
        };
        let related = completion
            .chained_bonus()
            .and_then(|related_ref| self.deps.catalog.task(related_ref))
            .filter(|related| self.deps.progress.level(related.skill) >= related.level_required);

        self.settle_items(&context, task, related, completion);
        self.settle_experience(&context, task, related, completion);
        self.deps
            .notifier
            .notify(Notification::TaskCompleted { task: task_ref });
        self.continue_or_stop(task);
    }

    fn settle_items(
        &self,
        context: &PipelineContext<'_>,
        task: &TaskDefinition,
        related: Option<&TaskDefinition>,
        completion: &TaskCompletion,
    ) {
        let inventory = &self.deps.inventory;
        let notifier = self.deps.notifier.as_ref();

        if let Some(consumable_id) = completion.consumable_id {
            report_handler_result(
                notifier,
                "task",
                "consume_item",
                inventory.remove_item(consumable_id, 1),
            );
        }

        for line in pipeline::modified_costs(context, task, &completion.fired_procs()) {
            if line.amount <= 0 {
                tracing::warn!(
                    target: "task",
                    item_id = line.item_id,
                    amount = line.amount,
                    "non_positive_cost_skipped"
                );
                continue;
            }
            report_handler_result(
                notifier,
                "task",
                "subtract_cost",
                inventory.remove_item(line.item_id, line.amount),
            );
        }

        let reward = pipeline::primary_reward(context, task, completion);
        report_handler_result(
            notifier,
            "task",
            "grant_reward",
            inventory.add_item(reward.item_id, reward.amount),
        );
        if let Some(related) = related {
            report_handler_result(
                notifier,
                "task",
                "grant_chained_reward",
                inventory.add_item(related.reward.item_id, related.reward.amount),
            );
        }
    }

    fn settle_experience(
        &self,
        context: &PipelineContext<'_>,
        task: &TaskDefinition,
        related: Option<&TaskDefinition>,
        completion: &TaskCompletion,
    ) {
        let experience = pipeline::completion_experience(context, task, completion);
        self.deps.progress.grant_experience(task.skill, experience);
        if let Some(related) = related {
            let related_experience = pipeline::related_experience(context, related);
            self.deps
                .progress
                .grant_experience(related.skill, related_experience);
        }
    }

    fn continue_or_stop(&self, task: &TaskDefinition) {
        let task_ref = task.task_ref();
        if self.active_task() != Some(task_ref) {
            return;
        }

        if self.can_afford(task) {
            if let Some(session) = self.session.lock().expect("lock poisoned").as_mut() {
                session.restart();
            }
            return;
        }

        self.session.lock().expect("lock poisoned").take();
        tracing::info!(target: "task", task = %task_ref, "task_stopped_out_of_resources");
        self.deps.notifier.notify(Notification::TaskStopped {
            task: Some(task_ref),
            reason: TaskStopReason::OutOfResources,
        });
    }
}
