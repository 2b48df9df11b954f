use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::{
    catalog::{EquipmentSlot, GameCatalog, ItemId},
    error::{SyncError, catalog_error, desync},
    guard::{ActionOutcome, GuardTable, GuardedRequest},
    inventory::InventoryManager,
    notify::{Notification, NotificationSink, report_handler_result},
    transport::{
        ports::OutboundPort,
        registry::{DispatchRegistry, ListenerId},
        wire::{ClientRecord, EquipItem, PlayerSnapshot, ServerRecord, UnequipItem, tags},
    },
};

const EQUIP_ITEM: GuardedRequest = GuardedRequest::new("equip_item");
const UNEQUIP_ITEM: GuardedRequest = GuardedRequest::new("unequip_item");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentState {
    pub slots: BTreeMap<EquipmentSlot, ItemId>,
    pub ammunition_count: u64,
}

impl EquipmentState {
    fn occupant_count(&self, slot: EquipmentSlot) -> u64 {
        if slot.carries_stack() {
            self.ammunition_count
        } else {
            1
        }
    }
}

#[derive(Clone)]
pub struct EquipmentManager {
    state: Arc<Mutex<EquipmentState>>,
    catalog: Arc<dyn GameCatalog>,
    inventory: InventoryManager,
    outbound: Arc<dyn OutboundPort>,
    guards: GuardTable,
    notifier: Arc<dyn NotificationSink>,
}

impl EquipmentManager {
    pub fn new(
        catalog: Arc<dyn GameCatalog>,
        inventory: InventoryManager,
        outbound: Arc<dyn OutboundPort>,
        guards: GuardTable,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(EquipmentState::default())),
            catalog,
            inventory,
            outbound,
            guards,
            notifier,
        }
    }

    pub fn snapshot(&self) -> EquipmentState {
        self.state.lock().expect("lock poisoned").clone()
    }

    pub fn equipped(&self, slot: EquipmentSlot) -> Option<ItemId> {
        self.state
            .lock()
            .expect("lock poisoned")
            .slots
            .get(&slot)
            .copied()
    }

    pub fn equipped_item_ids(&self) -> Vec<ItemId> {
        self.state
            .lock()
            .expect("lock poisoned")
            .slots
            .values()
            .copied()
            .collect()
    }

    pub fn ammunition_count(&self) -> u64 {
        self.state.lock().expect("lock poisoned").ammunition_count
    }

    /// Requests equipping `amount` of an item. Only ammunition keeps the
    /// requested amount; every other slot takes exactly one.
    pub fn equip_item(&self, item_id: ItemId, amount: u64) -> Result<ActionOutcome, SyncError> {
        let Some(slot) = self.slot_of(item_id) else {
            tracing::debug!(target: "equipment", item_id = item_id, "equip_rejected_not_equippable");
            return Ok(ActionOutcome::Rejected);
        };
        let amount = if slot.carries_stack() { amount } else { 1 };
        if amount == 0 || self.inventory.count(item_id) < amount {
            tracing::debug!(
                target: "equipment",
                item_id = item_id,
                amount = amount,
                "equip_rejected_not_held"
            );
            return Ok(ActionOutcome::Rejected);
        }

        EQUIP_ITEM.send(
            &self.guards,
            self.outbound.as_ref(),
            &ClientRecord::EquipItem(EquipItem { item_id, amount }),
        )
    }

    pub fn unequip_item(&self, item_id: ItemId) -> Result<ActionOutcome, SyncError> {
        if self.slot_holding(item_id).is_none() {
            tracing::debug!(target: "equipment", item_id = item_id, "unequip_rejected_not_equipped");
            return Ok(ActionOutcome::Rejected);
        }
        UNEQUIP_ITEM.send(
            &self.guards,
            self.outbound.as_ref(),
            &ClientRecord::UnequipItem(UnequipItem { item_id }),
        )
    }

    pub fn handle_record(&self, record: &ServerRecord) -> Result<(), SyncError> {
        match record {
            ServerRecord::PlayerSnapshot(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(())
            }
            ServerRecord::ItemEquipped(confirmation) => self.confirm_equip(*confirmation),
            ServerRecord::ItemUnequipped(confirmation) => self.confirm_unequip(*confirmation),
            _ => Ok(()),
        }
    }

    pub fn reset(&self) {
        *self.state.lock().expect("lock poisoned") = EquipmentState::default();
    }

    pub fn install(&self, registry: &DispatchRegistry) -> Vec<ListenerId> {
        [tags::PLAYER_SNAPSHOT, tags::EQUIP_ITEM, tags::UNEQUIP_ITEM]
            .into_iter()
            .map(|tag| {
                let manager = self.clone();
                registry.register_packet(tag, move |record| {
                    let result = manager.handle_record(record);
                    report_handler_result(
                        manager.notifier.as_ref(),
                        "equipment",
                        "equipment_record",
                        result,
                    );
                })
            })
            .collect()
    }

    fn slot_of(&self, item_id: ItemId) -> Option<EquipmentSlot> {
        self.catalog
            .item(item_id)
            .and_then(|definition| definition.equipment_slot)
    }

    fn slot_holding(&self, item_id: ItemId) -> Option<EquipmentSlot> {
        self.state
            .lock()
            .expect("lock poisoned")
            .slots
            .iter()
            .find_map(|(slot, held)| (*held == item_id).then_some(*slot))
    }

    fn apply_snapshot(&self, snapshot: &PlayerSnapshot) {
        let mut slots = BTreeMap::new();
        for (slot, item_id) in &snapshot.equipment {
            if self.slot_of(*item_id) == Some(*slot) {
                slots.insert(*slot, *item_id);
            } else {
                tracing::warn!(
                    target: "equipment",
                    slot = ?slot,
                    item_id = item_id,
                    "snapshot_slot_mismatch_dropped"
                );
            }
        }
        let ammunition_count = if slots.contains_key(&EquipmentSlot::Ammunition) {
            snapshot.ammunition_count
        } else {
            0
        };
        *self.state.lock().expect("lock poisoned") = EquipmentState {
            slots,
            ammunition_count,
        };
    }

    fn confirm_equip(&self, confirmation: EquipItem) -> Result<(), SyncError> {
        self.guards.release(EQUIP_ITEM.key);
        let EquipItem { item_id, amount } = confirmation;
        let slot = self
            .slot_of(item_id)
            .ok_or_else(|| catalog_error(format!("item {item_id} has no equipment slot")))?;
        let amount = if slot.carries_stack() { amount } else { 1 };

        let (occupant, occupant_count) = {
            let state = self.state.lock().expect("lock poisoned");
            (
                state.slots.get(&slot).copied(),
                state.occupant_count(slot),
            )
        };

        let freed = self
            .inventory
            .take_item(item_id, i64::try_from(amount).unwrap_or(i64::MAX))?;

        if slot.carries_stack() && occupant == Some(item_id) {
            let count = {
                let mut state = self.state.lock().expect("lock poisoned");
                state.ammunition_count = state.ammunition_count.saturating_add(amount);
                state.ammunition_count
            };
            self.notifier.notify(Notification::ItemEquipped {
                slot,
                item_id,
                count,
            });
            return Ok(());
        }

        let mut eviction = Ok(());
        if let Some(evicted) = occupant {
            eviction = self.inventory.add_item_into(evicted, occupant_count, freed);
            self.notifier.notify(Notification::ItemUnequipped {
                slot,
                item_id: evicted,
                count: occupant_count,
            });
        }

        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.slots.insert(slot, item_id);
            if slot.carries_stack() {
                state.ammunition_count = amount;
            }
        }
        tracing::debug!(target: "equipment", slot = ?slot, item_id = item_id, "item_equipped");
        self.notifier.notify(Notification::ItemEquipped {
            slot,
            item_id,
            count: amount,
        });
        eviction
    }

    fn confirm_unequip(&self, confirmation: UnequipItem) -> Result<(), SyncError> {
        self.guards.release(UNEQUIP_ITEM.key);
        let item_id = confirmation.item_id;

        let (slot, count) = {
            let mut state = self.state.lock().expect("lock poisoned");
            let slot = state
                .slots
                .iter()
                .find_map(|(slot, held)| (*held == item_id).then_some(*slot))
                .ok_or_else(|| desync(format!("unequip confirmed for unequipped item {item_id}")))?;
            let count = state.occupant_count(slot);
            state.slots.remove(&slot);
            if slot.carries_stack() {
                state.ammunition_count = 0;
            }
            (slot, count)
        };

        tracing::debug!(target: "equipment", slot = ?slot, item_id = item_id, "item_unequipped");
        self.notifier.notify(Notification::ItemUnequipped {
            slot,
            item_id,
            count,
        });
        self.inventory.add_item(item_id, count)
    }
}
