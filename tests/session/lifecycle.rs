use serde_json::json;

use idlelink::{
    catalog::Skill,
    inventory::InventorySlot,
    notify::{Notification, TaskStopReason},
    task::TaskPhase,
    testing::{SessionHarness, TEST_URL, items, tasks},
    transport::{ConnectionState, ListenerCategory, tags},
};

#[test]
fn given_new_session_when_link_opens_then_authenticate_is_the_first_frame() {
    let harness = SessionHarness::new(true);
    harness.client.connect(TEST_URL).expect("connect");
    assert_eq!(harness.client.connection_state(), ConnectionState::Connecting);

    let link = harness.link();
    harness
        .transport
        .handle_link_event(link.event(idlelink::transport::SocketEvent::Opened));

    assert_eq!(harness.client.connection_state(), ConnectionState::Connected);
    assert_eq!(
        harness.sent(),
        vec![json!({
            "tag": 1,
            "session_credential": "test-credential",
            "client_version": "0.1.0-test",
            "config_version": 1,
        })]
    );
}

#[test]
fn given_populated_session_when_link_drops_then_all_server_state_is_discarded() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({
        "tag": 3,
        "username": "ada",
        "gold": 70,
        "inventory": [{"item_id": items::OAK_LOG, "amount": 4}],
        "equipment": {"tool": items::LUCKY_AXE},
        "skills": {"woodcutting": 500},
        "active_task": {"category": "woodcutting", "task_id": 1},
    }));
    harness.deliver(json!({
        "tag": 40,
        "name": "Lumberjacks",
        "members": [{"username": "ada", "rank": "leader"}],
    }));
    harness
        .client
        .inventory()
        .switch_slots(0, 1)
        .expect("switch request");
    harness.notifications.take();

    harness.drop_link(1006, "abnormal closure");

    let client = &harness.client;
    assert_eq!(client.connection_state(), ConnectionState::Offline);
    assert_eq!(client.inventory().currency(), 0);
    assert!(client
        .inventory()
        .slots()
        .iter()
        .all(|slot| *slot == InventorySlot::Empty));
    assert!(client.equipment().equipped_item_ids().is_empty());
    assert_eq!(client.progress().experience(Skill::Woodcutting), 0);
    assert_eq!(client.clan().aggregate(), None);
    assert_eq!(client.clan().local_username(), None);
    assert_eq!(client.tasks().phase(), TaskPhase::Idle);
    assert!(!client.guards().is_locked("switch_item"));
    assert!(harness.notifications.notifications().contains(&Notification::TaskStopped {
        task: Some(tasks::OAK_LOGS),
        reason: TaskStopReason::Disconnected,
    }));
}

#[test]
fn given_dropped_link_when_reconnecting_then_records_from_old_link_are_ignored() {
    let harness = SessionHarness::connected();
    let old_link = harness.link();
    harness.drop_link(1006, "abnormal closure");

    let new_link = harness.open();
    assert_ne!(old_link.link_id, new_link.link_id);

    harness.transport.handle_link_event(old_link.event(
        idlelink::transport::SocketEvent::Message(
            json!({"tag": 13, "items": [{"item_id": items::OAK_LOG, "amount": 9}]}).to_string(),
        ),
    ));
    assert_eq!(harness.client.inventory().count(items::OAK_LOG), 0);

    harness.deliver(json!({"tag": 13, "items": [{"item_id": items::OAK_LOG, "amount": 2}]}));
    assert_eq!(harness.client.inventory().count(items::OAK_LOG), 2);
}

#[test]
fn given_server_error_record_when_received_then_ui_is_notified() {
    let harness = SessionHarness::connected();

    harness.deliver(json!({"tag": 99, "message": "inventory full", "code": "E_FULL"}));

    assert_eq!(
        harness.notifications.take(),
        vec![Notification::ServerError {
            message: "inventory full".to_string(),
            code: Some("E_FULL".to_string()),
        }]
    );
}

#[test]
fn given_unknown_or_malformed_record_when_received_then_session_is_unaffected() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({"tag": 13, "items": [{"item_id": items::OAK_LOG, "amount": 1}]}));
    harness.notifications.take();

    harness.deliver(json!({"tag": 777, "surprise": true}));
    harness.deliver(json!({"tag": 14, "items": "many"}));

    assert_eq!(harness.client.inventory().count(items::OAK_LOG), 1);
    assert!(harness.notifications.take().is_empty());
    assert_eq!(harness.client.connection_state(), ConnectionState::Connected);
}

#[test]
fn given_session_when_shut_down_then_its_listeners_are_gone() {
    let harness = SessionHarness::connected();
    let registry = harness.transport.registry();
    assert!(registry.listener_count(ListenerCategory::Packet(tags::PLAYER_SNAPSHOT)) > 0);
    assert_eq!(registry.listener_count(ListenerCategory::Connect), 1);

    let removed = harness.client.shutdown();
    assert!(removed > 0);
    assert_eq!(
        registry.listener_count(ListenerCategory::Packet(tags::PLAYER_SNAPSHOT)),
        0
    );
    assert_eq!(registry.listener_count(ListenerCategory::Disconnect), 0);

    harness.deliver(json!({"tag": 3, "username": "ada", "gold": 5}));
    assert_eq!(harness.client.inventory().currency(), 0);
    assert_eq!(harness.client.shutdown(), 0);
}
