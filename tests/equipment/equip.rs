use serde_json::{Value, json};

use idlelink::{
    catalog::EquipmentSlot,
    guard::ActionOutcome,
    inventory::InventorySlot,
    notify::Notification,
    testing::{SessionHarness, items},
};

fn session_with(inventory: Value, equipment: Value, ammunition_count: u64) -> SessionHarness {
    let harness = SessionHarness::connected();
    harness.deliver(json!({
        "tag": 3,
        "username": "ada",
        "inventory": inventory,
        "equipment": equipment,
        "ammunition_count": ammunition_count,
    }));
    harness.notifications.take();
    harness
}

#[test]
fn given_held_helm_when_equip_confirmed_then_slot_filled_and_unit_removed() {
    let harness = session_with(
        json!([{"item_id": items::BRONZE_HELM, "amount": 1}]),
        json!({}),
        0,
    );
    let equipment = harness.client.equipment();

    assert_eq!(
        equipment.equip_item(items::BRONZE_HELM, 3),
        Ok(ActionOutcome::Sent)
    );
    assert_eq!(
        harness.sent(),
        vec![json!({"tag": 11, "item_id": items::BRONZE_HELM, "amount": 1})]
    );
    assert_eq!(equipment.equipped(EquipmentSlot::Head), None);

    harness.deliver(json!({"tag": 11, "item_id": items::BRONZE_HELM, "amount": 1}));

    assert_eq!(
        equipment.equipped(EquipmentSlot::Head),
        Some(items::BRONZE_HELM)
    );
    assert_eq!(harness.client.inventory().count(items::BRONZE_HELM), 0);
    assert!(!harness.client.guards().is_locked("equip_item"));
    assert!(harness.notifications.notifications().contains(&Notification::ItemEquipped {
        slot: EquipmentSlot::Head,
        item_id: items::BRONZE_HELM,
        count: 1,
    }));
}

#[test]
fn given_occupied_slot_when_equip_confirmed_then_occupant_returns_to_inventory() {
    let harness = session_with(
        json!([{"item_id": items::BRONZE_HELM, "amount": 1}]),
        json!({"head": items::IRON_HELM}),
        0,
    );

    harness.deliver(json!({"tag": 11, "item_id": items::BRONZE_HELM, "amount": 1}));

    let equipment = harness.client.equipment();
    assert_eq!(
        equipment.equipped(EquipmentSlot::Head),
        Some(items::BRONZE_HELM)
    );
    let inventory = harness.client.inventory();
    assert_eq!(inventory.count(items::IRON_HELM), 1);
    assert_eq!(inventory.count(items::BRONZE_HELM), 0);

    let events: Vec<Notification> = harness
        .notifications
        .take()
        .into_iter()
        .filter(|notification| {
            matches!(
                notification,
                Notification::ItemEquipped { .. } | Notification::ItemUnequipped { .. }
            )
        })
        .collect();
    assert_eq!(
        events,
        vec![
            Notification::ItemUnequipped {
                slot: EquipmentSlot::Head,
                item_id: items::IRON_HELM,
                count: 1,
            },
            Notification::ItemEquipped {
                slot: EquipmentSlot::Head,
                item_id: items::BRONZE_HELM,
                count: 1,
            },
        ]
    );
}

#[test]
fn given_full_inventory_when_equip_evicts_occupant_then_occupant_takes_the_freed_slot() {
    let mut inventory = vec![json!({"item_id": items::BRONZE_HELM, "amount": 1})];
    inventory.extend((0..7).map(|offset| json!({"item_id": 100 + offset, "amount": 2})));
    let harness = session_with(Value::Array(inventory), json!({"head": items::IRON_HELM}), 0);
    let before = harness.client.inventory().total_units();

    harness.deliver(json!({"tag": 11, "item_id": items::BRONZE_HELM, "amount": 1}));

    let inventory = harness.client.inventory();
    assert_eq!(
        inventory.slots()[0],
        InventorySlot::Stack {
            item_id: items::IRON_HELM,
            count: 1,
        }
    );
    assert_eq!(inventory.total_units(), before);
    assert_eq!(
        harness.client.equipment().equipped(EquipmentSlot::Head),
        Some(items::BRONZE_HELM)
    );
    assert_eq!(harness.notifications.failures(), 0);
}

#[test]
fn given_equipped_arrows_when_same_arrows_equipped_then_counts_accumulate() {
    let harness = session_with(
        json!([{"item_id": items::BRONZE_ARROW, "amount": 100}]),
        json!({}),
        0,
    );
    let equipment = harness.client.equipment();

    equipment
        .equip_item(items::BRONZE_ARROW, 40)
        .expect("equip request");
    harness.deliver(json!({"tag": 11, "item_id": items::BRONZE_ARROW, "amount": 40}));
    assert_eq!(equipment.ammunition_count(), 40);

    equipment
        .equip_item(items::BRONZE_ARROW, 10)
        .expect("equip request");
    harness.deliver(json!({"tag": 11, "item_id": items::BRONZE_ARROW, "amount": 10}));

    assert_eq!(equipment.ammunition_count(), 50);
    assert_eq!(
        equipment.equipped(EquipmentSlot::Ammunition),
        Some(items::BRONZE_ARROW)
    );
    assert_eq!(harness.client.inventory().count(items::BRONZE_ARROW), 50);
}

#[test]
fn given_unequippable_or_missing_item_when_equipping_then_rejected_without_frame() {
    let harness = session_with(
        json!([{"item_id": items::OAK_LOG, "amount": 5}, {"item_id": items::BRONZE_ARROW, "amount": 3}]),
        json!({}),
        0,
    );
    let equipment = harness.client.equipment();

    assert_eq!(equipment.equip_item(items::OAK_LOG, 1), Ok(ActionOutcome::Rejected));
    assert_eq!(
        equipment.equip_item(items::IRON_HELM, 1),
        Ok(ActionOutcome::Rejected)
    );
    assert_eq!(
        equipment.equip_item(items::BRONZE_ARROW, 4),
        Ok(ActionOutcome::Rejected)
    );
    assert_eq!(
        equipment.equip_item(items::BRONZE_ARROW, 0),
        Ok(ActionOutcome::Rejected)
    );

    assert!(harness.sent().is_empty());
    assert!(!harness.client.guards().is_locked("equip_item"));
}

#[test]
fn given_snapshot_with_mismatched_slot_when_applied_then_entry_dropped() {
    let harness = session_with(
        json!([]),
        json!({"head": items::LUCKY_AXE, "tool": items::LUCKY_AXE, "hands": items::FURNACE_GLOVES}),
        25,
    );
    let snapshot = harness.client.equipment().snapshot();

    assert_eq!(snapshot.slots.get(&EquipmentSlot::Head), None);
    assert_eq!(
        snapshot.slots.get(&EquipmentSlot::Tool),
        Some(&items::LUCKY_AXE)
    );
    assert_eq!(
        snapshot.slots.get(&EquipmentSlot::Hands),
        Some(&items::FURNACE_GLOVES)
    );
    assert_eq!(snapshot.ammunition_count, 0, "no ammunition equipped");
    assert_eq!(harness.client.inventory().slots()[0], InventorySlot::Empty);
}
