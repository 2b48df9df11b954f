use std::sync::{Arc, Mutex};

use crate::{
    catalog::{GameCatalog, ItemId, ItemStack},
    error::{SyncError, desync},
    guard::{ActionOutcome, GuardTable, GuardTimeout, GuardedRequest},
    inventory::slots::{InventorySlot, InventorySlots},
    notify::{Notification, NotificationSink, report_handler_result},
    transport::{
        ports::OutboundPort,
        registry::{DispatchRegistry, ListenerId},
        wire::{ClientRecord, PlayerSnapshot, ServerRecord, SlotSwap, tags},
    },
};

const SWITCH_ITEM: GuardedRequest = GuardedRequest::new("switch_item");

/// Owner of the player's slots and currency counter.
#[derive(Clone)]
pub struct InventoryManager {
    state: Arc<Mutex<InventorySlots>>,
    catalog: Arc<dyn GameCatalog>,
    outbound: Arc<dyn OutboundPort>,
    guards: GuardTable,
    notifier: Arc<dyn NotificationSink>,
}

impl InventoryManager {
    pub fn new(
        catalog: Arc<dyn GameCatalog>,
        outbound: Arc<dyn OutboundPort>,
        guards: GuardTable,
        notifier: Arc<dyn NotificationSink>,
        placeholders: bool,
    ) -> Self {
        let settings = catalog.settings();
        let slots = InventorySlots::new(
            settings.inventory_size,
            settings.currency_item_id,
            placeholders,
        );
        Self {
            state: Arc::new(Mutex::new(slots)),
            catalog,
            outbound,
            guards,
            notifier,
        }
    }

    pub fn slots(&self) -> Vec<InventorySlot> {
        self.state.lock().expect("lock poisoned").slots().to_vec()
    }

    pub fn count(&self, item_id: ItemId) -> u64 {
        self.state.lock().expect("lock poisoned").count(item_id)
    }

    pub fn currency(&self) -> u64 {
        self.state.lock().expect("lock poisoned").currency()
    }

    pub fn total_units(&self) -> u64 {
        self.state.lock().expect("lock poisoned").total_units()
    }

    /// True when every positive cost line is covered. Non-positive lines
    /// cost nothing.
    pub fn can_afford(&self, costs: &[(ItemId, i64)]) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        costs
            .iter()
            .filter(|(_, amount)| *amount > 0)
            .all(|(item_id, amount)| state.count(*item_id) >= *amount as u64)
    }

    pub fn switch_slots(&self, first: usize, second: usize) -> Result<ActionOutcome, SyncError> {
        self.switch_slots_within(first, second, GuardTimeout::Default)
    }

    /// `switch_slots` with its own give-up window for the confirmation.
    pub fn switch_slots_within(
        &self,
        first: usize,
        second: usize,
        timeout: GuardTimeout,
    ) -> Result<ActionOutcome, SyncError> {
        {
            let state = self.state.lock().expect("lock poisoned");
            state.check_index(first)?;
            state.check_index(second)?;
        }
        SWITCH_ITEM.with_timeout(timeout).send(
            &self.guards,
            self.outbound.as_ref(),
            &ClientRecord::SwitchItems(SlotSwap { first, second }),
        )
    }

    pub fn add_item(&self, item_id: ItemId, amount: u64) -> Result<(), SyncError> {
        self.add_item_into(item_id, amount, None)
    }

    pub fn remove_item(&self, item_id: ItemId, amount: i64) -> Result<(), SyncError> {
        self.take_item(item_id, amount).map(|_| ())
    }

    /// Removes an item and reports the slot the removal depleted, so an
    /// item coming back in the same step can take it over.
    pub fn take_item(&self, item_id: ItemId, amount: i64) -> Result<Option<usize>, SyncError> {
        let freed = self
            .state
            .lock()
            .expect("lock poisoned")
            .take(item_id, amount)?;
        if amount > 0 {
            tracing::debug!(target: "inventory", item_id = item_id, amount = amount, "item_removed");
            self.notifier.notify(Notification::InventoryChanged);
        }
        Ok(freed)
    }

    pub fn add_item_into(
        &self,
        item_id: ItemId,
        amount: u64,
        freed: Option<usize>,
    ) -> Result<(), SyncError> {
        self.state
            .lock()
            .expect("lock poisoned")
            .add_into_freed(item_id, amount, freed)?;
        tracing::debug!(target: "inventory", item_id = item_id, amount = amount, "item_added");
        self.notifier.notify(Notification::InventoryChanged);
        Ok(())
    }

    pub fn handle_record(&self, record: &ServerRecord) -> Result<(), SyncError> {
        match record {
            ServerRecord::PlayerSnapshot(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(())
            }
            ServerRecord::ItemsSwitched(swap) => self.confirm_switch(*swap),
            ServerRecord::ItemsGranted(delta) => self.apply_delta(&delta.items, |stack| {
                self.add_item(stack.item_id, stack.amount)
            }),
            ServerRecord::ItemsRemoved(delta) => self.apply_delta(&delta.items, |stack| {
                self.remove_item(stack.item_id, i64::try_from(stack.amount).unwrap_or(i64::MAX))
            }),
            _ => Ok(()),
        }
    }

    /// Drops everything derived from the server.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        let settings = self.catalog.settings();
        *state = InventorySlots::new(
            settings.inventory_size,
            settings.currency_item_id,
            state.placeholders_enabled(),
        );
    }

    pub fn install(&self, registry: &DispatchRegistry) -> Vec<ListenerId> {
        [
            tags::PLAYER_SNAPSHOT,
            tags::SWITCH_ITEMS,
            tags::ITEMS_GRANTED,
            tags::ITEMS_REMOVED,
        ]
        .into_iter()
        .map(|tag| {
            let manager = self.clone();
            registry.register_packet(tag, move |record| {
                let result = manager.handle_record(record);
                report_handler_result(
                    manager.notifier.as_ref(),
                    "inventory",
                    "inventory_record",
                    result,
                );
            })
        })
        .collect()
    }

    fn apply_snapshot(&self, snapshot: &PlayerSnapshot) {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            let settings = self.catalog.settings();
            *state = InventorySlots::from_snapshot(
                &snapshot.inventory,
                snapshot.gold,
                settings.inventory_size,
                settings.currency_item_id,
                state.placeholders_enabled(),
            );
        }
        tracing::info!(
            target: "inventory",
            slots = snapshot.inventory.len(),
            gold = snapshot.gold,
            "inventory_snapshot_applied"
        );
        self.notifier.notify(Notification::InventoryChanged);
    }

    fn confirm_switch(&self, swap: SlotSwap) -> Result<(), SyncError> {
        self.guards.release(SWITCH_ITEM.key);
        let result = self
            .state
            .lock()
            .expect("lock poisoned")
            .swap(swap.first, swap.second);
        if let Err(err) = result {
            return Err(desync(format!(
                "switch confirmation rejected: {}",
                err.message
            )));
        }
        self.notifier.notify(Notification::InventoryChanged);
        Ok(())
    }

    /// Applies every line and reports the first failure.
    fn apply_delta(
        &self,
        items: &[ItemStack],
        apply: impl Fn(&ItemStack) -> Result<(), SyncError>,
    ) -> Result<(), SyncError> {
        let mut first_error = None;
        for stack in items {
            if let Err(err) = apply(stack)
                && first_error.is_none()
            {
                first_error = Some(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
