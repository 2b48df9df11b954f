use serde::Serialize;

use crate::{
    catalog::{ItemId, ItemStack},
    error::{SyncError, desync, validation_error},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventorySlot {
    Empty,
    Stack { item_id: ItemId, count: u64 },
    /// Depleted stack kept in place so the other slots do not move.
    Placeholder { item_id: ItemId },
}

impl InventorySlot {
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            InventorySlot::Empty => None,
            InventorySlot::Stack { item_id, .. } | InventorySlot::Placeholder { item_id } => {
                Some(*item_id)
            }
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            InventorySlot::Stack { count, .. } => *count,
            InventorySlot::Empty | InventorySlot::Placeholder { .. } => 0,
        }
    }

    fn from_record(entry: Option<ItemStack>) -> Self {
        match entry {
            None => InventorySlot::Empty,
            Some(ItemStack { item_id, amount: 0 }) => InventorySlot::Placeholder { item_id },
            Some(ItemStack { item_id, amount }) => InventorySlot::Stack {
                item_id,
                count: amount,
            },
        }
    }
}

/// Fixed-length slot sequence plus the scalar currency counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySlots {
    slots: Vec<InventorySlot>,
    currency: u64,
    currency_item_id: ItemId,
    placeholders: bool,
}

impl InventorySlots {
    pub fn new(size: usize, currency_item_id: ItemId, placeholders: bool) -> Self {
        Self {
            slots: vec![InventorySlot::Empty; size],
            currency: 0,
            currency_item_id,
            placeholders,
        }
    }

    pub fn from_snapshot(
        entries: &[Option<ItemStack>],
        currency: u64,
        size: usize,
        currency_item_id: ItemId,
        placeholders: bool,
    ) -> Self {
        let mut slots: Vec<InventorySlot> = entries
            .iter()
            .copied()
            .map(InventorySlot::from_record)
            .collect();
        if slots.len() < size {
            slots.resize(size, InventorySlot::Empty);
        }
        Self {
            slots,
            currency,
            currency_item_id,
            placeholders,
        }
    }

    pub fn slots(&self) -> &[InventorySlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn currency(&self) -> u64 {
        self.currency
    }

    pub fn currency_item_id(&self) -> ItemId {
        self.currency_item_id
    }

    pub fn placeholders_enabled(&self) -> bool {
        self.placeholders
    }

    pub fn count(&self, item_id: ItemId) -> u64 {
        if item_id == self.currency_item_id {
            return self.currency;
        }
        self.slots
            .iter()
            .filter(|slot| slot.item_id() == Some(item_id))
            .map(InventorySlot::count)
            .sum()
    }

    /// Sum of every slot count plus the currency counter.
    pub fn total_units(&self) -> u64 {
        self.currency + self.slots.iter().map(InventorySlot::count).sum::<u64>()
    }

    pub fn add(&mut self, item_id: ItemId, amount: u64) -> Result<(), SyncError> {
        if amount == 0 {
            return Ok(());
        }
        if item_id == self.currency_item_id {
            self.currency = self.currency.saturating_add(amount);
            return Ok(());
        }

        let target = self
            .slots
            .iter()
            .position(|slot| slot.item_id() == Some(item_id))
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|slot| matches!(slot, InventorySlot::Empty))
            })
            .ok_or_else(|| {
                desync(format!(
                    "no slot available for item {item_id} (amount {amount})"
                ))
            })?;

        let count = self.slots[target].count().saturating_add(amount);
        self.slots[target] = InventorySlot::Stack { item_id, count };
        Ok(())
    }

    /// Adds `amount` of an item, filling the `freed` slot when the item has
    /// no slot of its own. Used when one item leaves the inventory and
    /// another comes back in the same step.
    pub fn add_into_freed(
        &mut self,
        item_id: ItemId,
        amount: u64,
        freed: Option<usize>,
    ) -> Result<(), SyncError> {
        let has_own_slot = self
            .slots
            .iter()
            .any(|slot| slot.item_id() == Some(item_id));
        match freed {
            Some(index)
                if amount > 0
                    && item_id != self.currency_item_id
                    && !has_own_slot
                    && self.slots.get(index).is_some_and(|slot| slot.count() == 0) =>
            {
                self.slots[index] = InventorySlot::Stack {
                    item_id,
                    count: amount,
                };
                Ok(())
            }
            _ => self.add(item_id, amount),
        }
    }

    /// Removes `amount` of an item. Non-positive amounts are skipped with a
    /// warning; a missing or short slot leaves everything unchanged.
    pub fn remove(&mut self, item_id: ItemId, amount: i64) -> Result<(), SyncError> {
        self.take(item_id, amount).map(|_| ())
    }

    /// Like [`InventorySlots::remove`], returning the index of the slot the
    /// removal depleted, if any.
    pub fn take(&mut self, item_id: ItemId, amount: i64) -> Result<Option<usize>, SyncError> {
        if amount <= 0 {
            tracing::warn!(
                target: "inventory",
                item_id = item_id,
                amount = amount,
                "non_positive_removal_skipped"
            );
            return Ok(None);
        }
        let amount = amount as u64;

        if item_id == self.currency_item_id {
            if self.currency < amount {
                return Err(desync(format!(
                    "currency {} below removal amount {amount}",
                    self.currency
                )));
            }
            self.currency -= amount;
            return Ok(None);
        }

        let index = self
            .slots
            .iter()
            .position(|slot| matches!(slot, InventorySlot::Stack { item_id: id, .. } if *id == item_id))
            .or_else(|| {
                self.slots
                    .iter()
                    .position(|slot| slot.item_id() == Some(item_id))
            })
            .ok_or_else(|| desync(format!("no slot holds item {item_id}")))?;

        let held = self.slots[index].count();
        if held < amount {
            return Err(desync(format!(
                "slot {index} holds {held} of item {item_id}, cannot remove {amount}"
            )));
        }

        if held == amount {
            self.slots[index] = if self.placeholders {
                InventorySlot::Placeholder { item_id }
            } else {
                InventorySlot::Empty
            };
            return Ok(Some(index));
        }
        self.slots[index] = InventorySlot::Stack {
            item_id,
            count: held - amount,
        };
        Ok(None)
    }

    pub fn check_index(&self, index: usize) -> Result<(), SyncError> {
        if index >= self.slots.len() {
            return Err(validation_error(format!(
                "slot index {index} out of range (inventory has {} slots)",
                self.slots.len()
            )));
        }
        Ok(())
    }

    pub fn swap(&mut self, first: usize, second: usize) -> Result<(), SyncError> {
        self.check_index(first)?;
        self.check_index(second)?;
        self.slots.swap(first, second);
        Ok(())
    }
}
