use std::fmt;

use serde::{Deserialize, Serialize};

pub type ItemId = u32;
pub type TaskId = u32;
pub type UpgradeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Woodcutting,
    Mining,
    Fishing,
    Foraging,
    Smithing,
    Cooking,
    Crafting,
    Alchemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Woodcutting,
    Mining,
    Fishing,
    Foraging,
    Smelting,
    Smithing,
    Cooking,
    Crafting,
    Brewing,
}

impl TaskCategory {
    /// Harvesting categories whose flat experience boost is gated on an upgrade.
    pub fn has_gated_flat_boost(self) -> bool {
        matches!(self, TaskCategory::Woodcutting | TaskCategory::Mining)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Head,
    Body,
    Legs,
    Feet,
    Hands,
    Neck,
    Ring,
    MainHand,
    OffHand,
    Tool,
    Ammunition,
}

impl EquipmentSlot {
    pub fn carries_stack(self) -> bool {
        matches!(self, EquipmentSlot::Ammunition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub category: TaskCategory,
    pub task_id: TaskId,
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.category, self.task_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: ItemId,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    /// Passive while equipped.
    ExperienceBoost { skill: Skill, percent: f64 },
    /// Applies only on completions where the server reports the proc fired.
    CostReductionProc { skill: Skill, percent: f64 },
    /// Applies on completions that consumed this item.
    ConsumableExperienceBoost { percent: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub equipment_slot: Option<EquipmentSlot>,
    #[serde(default)]
    pub value: u64,
    #[serde(default)]
    pub counterpart: Option<ItemId>,
    #[serde(default)]
    pub effects: Vec<ItemEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub category: TaskCategory,
    pub id: TaskId,
    pub name: String,
    pub skill: Skill,
    #[serde(default = "default_level_required")]
    pub level_required: u32,
    pub time_ms: u64,
    pub experience: f64,
    pub reward: ItemStack,
    #[serde(default)]
    pub costs: Vec<ItemStack>,
}

impl TaskDefinition {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            category: self.category,
            task_id: self.id,
        }
    }
}

fn default_level_required() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeBenefit {
    CostReduction { category: TaskCategory, percent: f64 },
    ExperienceBoost { skill: Skill, percent: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UpgradeTier {
    #[serde(default)]
    pub benefits: Vec<UpgradeBenefit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDefinition {
    pub id: UpgradeId,
    pub name: String,
    #[serde(default)]
    pub tiers: Vec<UpgradeTier>,
}

impl UpgradeDefinition {
    /// Benefits of an owned tier. Tiers are 1-based; tier 0 means not owned.
    pub fn benefits_at(&self, tier: u32) -> &[UpgradeBenefit] {
        if tier == 0 {
            return &[];
        }
        self.tiers
            .get(tier as usize - 1)
            .map(|tier| tier.benefits.as_slice())
            .unwrap_or(&[])
    }
}

fn default_currency_item_id() -> ItemId {
    1
}

fn default_inventory_size() -> usize {
    28
}

fn default_chained_bonus_experience_percent() -> f64 {
    10.0
}

fn default_experience_table() -> Vec<u64> {
    // Cumulative thresholds for levels 2..=20.
    (1..20u64).map(|level| level * level * 100).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    #[serde(default = "default_currency_item_id")]
    pub currency_item_id: ItemId,
    #[serde(default = "default_inventory_size")]
    pub inventory_size: usize,
    #[serde(default)]
    pub harvest_boost_upgrade: Option<UpgradeId>,
    #[serde(default)]
    pub harvest_flat_experience: f64,
    #[serde(default = "default_chained_bonus_experience_percent")]
    pub chained_bonus_experience_percent: f64,
    #[serde(default = "default_experience_table")]
    pub experience_table: Vec<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            currency_item_id: default_currency_item_id(),
            inventory_size: default_inventory_size(),
            harvest_boost_upgrade: None,
            harvest_flat_experience: 0.0,
            chained_bonus_experience_percent: default_chained_bonus_experience_percent(),
            experience_table: default_experience_table(),
        }
    }
}

impl GameSettings {
    pub fn level_for_experience(&self, experience: u64) -> u32 {
        let reached = self
            .experience_table
            .iter()
            .take_while(|threshold| **threshold <= experience)
            .count();
        1 + reached as u32
    }
}
