use serde_json::json;

use idlelink::{
    catalog::EquipmentSlot,
    guard::ActionOutcome,
    testing::{SessionHarness, items},
};

#[test]
fn given_equip_then_unequip_when_both_confirmed_then_inventory_is_restored() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({
        "tag": 3,
        "username": "ada",
        "inventory": [
            {"item_id": items::OAK_LOG, "amount": 2},
            {"item_id": items::CARVING_KNIFE, "amount": 1},
            {"item_id": items::RAW_SHRIMP, "amount": 6},
        ],
    }));
    let inventory = harness.client.inventory();
    let equipment = harness.client.equipment();
    let before = inventory.slots();

    equipment
        .equip_item(items::CARVING_KNIFE, 1)
        .expect("equip request");
    harness.deliver(json!({"tag": 11, "item_id": items::CARVING_KNIFE, "amount": 1}));
    assert_eq!(
        equipment.equipped(EquipmentSlot::OffHand),
        Some(items::CARVING_KNIFE)
    );

    assert_eq!(
        equipment.unequip_item(items::CARVING_KNIFE),
        Ok(ActionOutcome::Sent)
    );
    assert_eq!(
        harness.sent(),
        vec![
            json!({"tag": 11, "item_id": items::CARVING_KNIFE, "amount": 1}),
            json!({"tag": 12, "item_id": items::CARVING_KNIFE}),
        ]
    );
    harness.deliver(json!({"tag": 12, "item_id": items::CARVING_KNIFE}));

    assert_eq!(equipment.equipped(EquipmentSlot::OffHand), None);
    assert_eq!(inventory.slots(), before);
    assert!(!harness.client.guards().is_locked("unequip_item"));
}

#[test]
fn given_equipped_arrows_when_unequip_confirmed_then_whole_stack_returns() {
    let harness = SessionHarness::connected();
    harness.deliver(json!({
        "tag": 3,
        "username": "ada",
        "equipment": {"ammunition": items::BRONZE_ARROW},
        "ammunition_count": 75,
    }));

    harness.deliver(json!({"tag": 12, "item_id": items::BRONZE_ARROW}));

    let equipment = harness.client.equipment();
    assert_eq!(equipment.equipped(EquipmentSlot::Ammunition), None);
    assert_eq!(equipment.ammunition_count(), 0);
    assert_eq!(harness.client.inventory().count(items::BRONZE_ARROW), 75);
}

#[test]
fn given_nothing_equipped_when_unequip_requested_or_confirmed_then_rejected_and_failure() {
    let harness = SessionHarness::connected();
    let equipment = harness.client.equipment();

    assert_eq!(
        equipment.unequip_item(items::BRONZE_HELM),
        Ok(ActionOutcome::Rejected)
    );
    assert!(harness.sent().is_empty());

    harness.notifications.take();
    harness.deliver(json!({"tag": 12, "item_id": items::BRONZE_HELM}));
    assert_eq!(harness.notifications.failures(), 1);
    assert_eq!(harness.client.inventory().count(items::BRONZE_HELM), 0);
}
