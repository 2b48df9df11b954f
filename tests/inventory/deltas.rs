use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde_json::{Value, json};

use idlelink::{
    error::SyncErrorKind,
    inventory::InventorySlot,
    notify::Notification,
    testing::{SessionHarness, items},
};

fn snapshot(gold: u64, inventory: Value) -> Value {
    json!({
        "tag": 3,
        "username": "ada",
        "gold": gold,
        "inventory": inventory,
    })
}

#[test]
fn given_snapshot_when_applied_then_inventory_is_padded_to_catalog_size() {
    let harness = SessionHarness::connected();
    harness.deliver(snapshot(
        250,
        json!([{"item_id": items::COPPER_ORE, "amount": 4}, null, {"item_id": items::OAK_LOG, "amount": 0}]),
    ));

    let inventory = harness.client.inventory();
    let slots = inventory.slots();
    assert_eq!(slots.len(), 8);
    assert_eq!(
        slots[0],
        InventorySlot::Stack {
            item_id: items::COPPER_ORE,
            count: 4,
        }
    );
    assert_eq!(slots[1], InventorySlot::Empty);
    assert_eq!(
        slots[2],
        InventorySlot::Placeholder {
            item_id: items::OAK_LOG,
        }
    );
    assert!(slots[3..].iter().all(|slot| *slot == InventorySlot::Empty));
    assert_eq!(inventory.currency(), 250);
    assert_eq!(inventory.count(items::GOLD), 250);
}

#[test]
fn given_short_stack_when_removing_more_than_held_then_desync_and_slot_unchanged() {
    let harness = SessionHarness::connected();
    harness.deliver(snapshot(
        500,
        json!([{"item_id": items::COPPER_ORE, "amount": 3}]),
    ));
    let inventory = harness.client.inventory();
    let before = inventory.slots();

    let err = inventory
        .remove_item(items::COPPER_ORE, 5)
        .expect_err("removing 5 of 3 must fail");

    assert_eq!(err.kind, SyncErrorKind::Desync);
    assert_eq!(inventory.slots(), before);
    assert_eq!(inventory.count(items::COPPER_ORE), 3);
    assert_eq!(inventory.currency(), 500);
}

#[test]
fn given_grants_and_removals_when_applied_then_total_units_are_conserved() {
    let harness = SessionHarness::connected();
    harness.deliver(snapshot(
        100,
        json!([{"item_id": items::COPPER_ORE, "amount": 10}, {"item_id": items::OAK_LOG, "amount": 2}]),
    ));
    let inventory = harness.client.inventory();
    let start = inventory.total_units();

    harness.deliver(json!({
        "tag": 13,
        "items": [
            {"item_id": items::COPPER_ORE, "amount": 5},
            {"item_id": items::RAW_SHRIMP, "amount": 7},
            {"item_id": items::GOLD, "amount": 40},
        ],
    }));
    harness.deliver(json!({
        "tag": 14,
        "items": [
            {"item_id": items::COPPER_ORE, "amount": 15},
            {"item_id": items::GOLD, "amount": 90},
        ],
    }));

    assert_eq!(inventory.total_units(), start + 5 + 7 + 40 - 15 - 90);
    assert_eq!(inventory.count(items::COPPER_ORE), 0);
    assert_eq!(inventory.count(items::RAW_SHRIMP), 7);
    assert_eq!(inventory.currency(), 50);
    assert_eq!(harness.notifications.failures(), 0);
}

#[test]
fn given_generated_delta_sequences_when_applied_then_units_are_conserved() {
    const POOL: [u32; 5] = [
        items::GOLD,
        items::COPPER_ORE,
        items::OAK_LOG,
        items::RAW_SHRIMP,
        items::BRONZE_BAR,
    ];

    for seed in 0..24 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let harness = SessionHarness::connected();
        harness.deliver(snapshot(
            rng.gen_range(0..50),
            json!([{"item_id": items::COPPER_ORE, "amount": rng.gen_range(1..6)}]),
        ));
        let inventory = harness.client.inventory();
        let mut expected = inventory.total_units();

        for step in 0..60 {
            let item_id = POOL[rng.gen_range(0..POOL.len())];
            if rng.gen_bool(0.5) {
                let amount = rng.gen_range(1..=5);
                inventory
                    .add_item(item_id, amount)
                    .expect("five item kinds always fit in eight slots");
                expected += amount;
            } else {
                let held = inventory.count(item_id);
                // Half the removals take the whole stack so placeholders appear.
                let amount = if held > 0 && rng.gen_bool(0.5) {
                    held
                } else {
                    rng.gen_range(1..=6)
                };
                let before = inventory.slots();
                match inventory.remove_item(item_id, amount as i64) {
                    Ok(()) => expected -= amount,
                    Err(err) => {
                        assert_eq!(err.kind, SyncErrorKind::Desync, "seed {seed} step {step}");
                        assert!(amount > held, "seed {seed} step {step}");
                        assert_eq!(inventory.slots(), before, "seed {seed} step {step}");
                    }
                }
            }

            assert_eq!(inventory.total_units(), expected, "seed {seed} step {step}");
            let slots = inventory.slots();
            for item_id in POOL.iter().filter(|item_id| **item_id != items::GOLD) {
                let holders = slots
                    .iter()
                    .filter(|slot| slot.item_id() == Some(*item_id))
                    .count();
                assert!(holders <= 1, "seed {seed} step {step}: item {item_id} split");
            }
            assert!(
                !slots
                    .iter()
                    .any(|slot| matches!(slot, InventorySlot::Stack { count: 0, .. })),
                "seed {seed} step {step}: zero-count stack"
            );
        }
    }
}

#[test]
fn given_depleted_stack_when_regranted_then_item_returns_to_same_slot() {
    let harness = SessionHarness::connected();
    harness.deliver(snapshot(
        0,
        json!([
            {"item_id": items::COPPER_ORE, "amount": 2},
            {"item_id": items::OAK_LOG, "amount": 1},
            {"item_id": items::RAW_SHRIMP, "amount": 3},
        ]),
    ));
    let inventory = harness.client.inventory();

    inventory
        .remove_item(items::OAK_LOG, 1)
        .expect("removing the whole stack succeeds");
    let slots = inventory.slots();
    assert_eq!(
        slots[1],
        InventorySlot::Placeholder {
            item_id: items::OAK_LOG,
        }
    );
    assert_eq!(slots[2].item_id(), Some(items::RAW_SHRIMP));

    inventory
        .add_item(items::BRONZE_BAR, 1)
        .expect("fresh item takes the first empty slot");
    inventory
        .add_item(items::OAK_LOG, 4)
        .expect("depleted item merges into its placeholder");

    let slots = inventory.slots();
    assert_eq!(
        slots[1],
        InventorySlot::Stack {
            item_id: items::OAK_LOG,
            count: 4,
        }
    );
    assert_eq!(slots[3].item_id(), Some(items::BRONZE_BAR));
}

#[test]
fn given_placeholders_disabled_when_stack_depleted_then_slot_is_emptied() {
    let harness = SessionHarness::new(false);
    harness.open();
    harness.deliver(snapshot(
        0,
        json!([{"item_id": items::OAK_LOG, "amount": 1}, {"item_id": items::RAW_SHRIMP, "amount": 1}]),
    ));

    harness.deliver(json!({"tag": 14, "items": [{"item_id": items::OAK_LOG, "amount": 1}]}));

    let slots = harness.client.inventory().slots();
    assert_eq!(slots[0], InventorySlot::Empty);
    assert_eq!(slots[1].item_id(), Some(items::RAW_SHRIMP));
}

#[test]
fn given_full_inventory_when_grant_arrives_then_failure_is_reported() {
    let harness = SessionHarness::connected();
    let full: Vec<Value> = (100..108)
        .map(|item_id| json!({"item_id": item_id, "amount": 1}))
        .collect();
    harness.deliver(snapshot(0, Value::Array(full)));
    harness.notifications.take();

    harness.deliver(json!({"tag": 13, "items": [{"item_id": items::OAK_LOG, "amount": 1}]}));

    assert_eq!(harness.client.inventory().count(items::OAK_LOG), 0);
    assert_eq!(harness.notifications.failures(), 1);
    assert!(
        !harness
            .notifications
            .notifications()
            .contains(&Notification::InventoryChanged)
    );
}
