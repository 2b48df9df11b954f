use serde_json::json;

use idlelink::{
    catalog::TaskCategory,
    guard::ActionOutcome,
    notify::{Notification, TaskStopReason},
    task::TaskPhase,
    testing::{SessionHarness, items, tasks},
};

#[test]
fn given_idle_session_when_task_started_then_phase_moves_through_starting_to_active() {
    let harness = SessionHarness::connected();
    let task_manager = harness.client.tasks();
    assert_eq!(task_manager.phase(), TaskPhase::Idle);

    let outcome = task_manager
        .activate_task(tasks::OAK_LOGS.category, tasks::OAK_LOGS.task_id)
        .expect("activation request");
    assert_eq!(outcome, ActionOutcome::Sent);
    assert_eq!(task_manager.phase(), TaskPhase::Starting);
    assert_eq!(
        harness.sent(),
        vec![json!({"tag": 20, "category": "woodcutting", "task_id": 1})]
    );

    harness.deliver(json!({"tag": 21, "category": "woodcutting", "task_id": 1}));

    assert_eq!(task_manager.phase(), TaskPhase::Active);
    assert_eq!(task_manager.active_task(), Some(tasks::OAK_LOGS));
    assert!(task_manager.elapsed().is_some());
    assert!(
        harness
            .notifications
            .notifications()
            .contains(&Notification::TaskStarted {
                task: tasks::OAK_LOGS,
            })
    );
}

#[test]
fn given_active_task_when_activated_again_then_stop_is_sent_and_cancel_clears_session() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({"tag": 21, "category": "woodcutting", "task_id": 1}));
    let task_manager = harness.client.tasks();

    let outcome = task_manager
        .activate_task(TaskCategory::Woodcutting, 1)
        .expect("toggle request");
    assert_eq!(outcome, ActionOutcome::Sent);
    assert_eq!(task_manager.phase(), TaskPhase::Active, "stays active until confirmed");

    harness.deliver(json!({"tag": 22}));

    assert_eq!(task_manager.phase(), TaskPhase::Idle);
    assert_eq!(task_manager.active_task(), None);
    assert!(
        harness
            .notifications
            .notifications()
            .contains(&Notification::TaskStopped {
                task: Some(tasks::OAK_LOGS),
                reason: TaskStopReason::Cancelled,
            })
    );
}

#[test]
fn given_unknown_task_when_start_confirmed_then_session_stays_idle() {
    let harness = SessionHarness::connected();
    harness.notifications.take();

    harness.deliver(json!({"tag": 21, "category": "mining", "task_id": 99}));

    let task_manager = harness.client.tasks();
    assert_eq!(task_manager.phase(), TaskPhase::Idle);
    assert_eq!(task_manager.active_task(), None);
    assert!(
        !harness
            .notifications
            .notifications()
            .iter()
            .any(|notification| matches!(notification, Notification::TaskStarted { .. }))
    );
}

#[test]
fn given_unmet_requirements_when_activating_then_rejected_without_frame() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({
        "tag": 3,
        "username": "ada",
        "inventory": [
            {"item_id": items::OAK_LOG, "amount": 3},
            {"item_id": items::COPPER_ORE, "amount": 2},
        ],
        "gold": 100,
    }));
    let task_manager = harness.client.tasks();

    let cases = [
        (TaskCategory::Crafting, 1, "crafting level 1 is below 5"),
        (TaskCategory::Smelting, 1, "two copper ore cannot cover six"),
        (TaskCategory::Brewing, 7, "no such task"),
    ];
    for (category, task_id, why) in cases {
        assert_eq!(
            task_manager.activate_task(category, task_id),
            Ok(ActionOutcome::Rejected),
            "{why}"
        );
    }
    assert!(harness.sent().is_empty());
    assert_eq!(task_manager.phase(), TaskPhase::Idle);
}

#[test]
fn given_pending_toggle_when_activating_another_task_then_busy() {
    let harness = SessionHarness::connected();
    let task_manager = harness.client.tasks();

    assert_eq!(
        task_manager.activate_task(tasks::SHRIMP.category, tasks::SHRIMP.task_id),
        Ok(ActionOutcome::Sent)
    );
    assert_eq!(
        task_manager.activate_task(tasks::OAK_LOGS.category, tasks::OAK_LOGS.task_id),
        Ok(ActionOutcome::Busy)
    );
    assert_eq!(harness.sent().len(), 1);
}

#[test]
fn given_snapshot_with_active_task_when_applied_then_session_resumes() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({
        "tag": 3,
        "username": "ada",
        "active_task": {"category": "fishing", "task_id": 1},
    }));

    let task_manager = harness.client.tasks();
    assert_eq!(task_manager.active_task(), Some(tasks::SHRIMP));
    assert_eq!(task_manager.stop_task(), Ok(ActionOutcome::Sent));
    assert_eq!(
        harness.sent(),
        vec![json!({"tag": 20, "category": "fishing", "task_id": 1})]
    );
}

#[test]
fn given_no_active_task_when_stopping_then_rejected() {
    let harness = SessionHarness::connected();
    assert_eq!(
        harness.client.tasks().stop_task(),
        Ok(ActionOutcome::Rejected)
    );
    assert!(harness.sent().is_empty());
}
