pub mod types;

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

pub use types::{
    EquipmentSlot, GameSettings, ItemDefinition, ItemEffect, ItemId, ItemStack, Skill,
    TaskCategory, TaskDefinition, TaskId, TaskRef, UpgradeBenefit, UpgradeDefinition,
    UpgradeId, UpgradeTier,
};

/// Read-only view of the pre-loaded game data.
pub trait GameCatalog: Send + Sync {
    fn item(&self, item_id: ItemId) -> Option<&ItemDefinition>;
    fn item_by_name(&self, name: &str) -> Option<&ItemDefinition>;
    fn task(&self, task: TaskRef) -> Option<&TaskDefinition>;
    fn upgrade(&self, upgrade_id: UpgradeId) -> Option<&UpgradeDefinition>;
    fn settings(&self) -> &GameSettings;
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    settings: GameSettings,
    #[serde(default)]
    items: Vec<ItemDefinition>,
    #[serde(default)]
    tasks: Vec<TaskDefinition>,
    #[serde(default)]
    upgrades: Vec<UpgradeDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    settings: GameSettings,
    items: BTreeMap<ItemId, ItemDefinition>,
    item_names: BTreeMap<String, ItemId>,
    tasks: BTreeMap<TaskRef, TaskDefinition>,
    upgrades: BTreeMap<UpgradeId, UpgradeDefinition>,
}

impl StaticCatalog {
    pub fn new(
        settings: GameSettings,
        items: Vec<ItemDefinition>,
        tasks: Vec<TaskDefinition>,
        upgrades: Vec<UpgradeDefinition>,
    ) -> Result<Self> {
        let mut catalog = Self {
            settings,
            ..Self::default()
        };

        for item in items {
            if catalog.items.contains_key(&item.id) {
                return Err(anyhow!("duplicate item id {}", item.id));
            }
            catalog
                .item_names
                .insert(item.name.to_ascii_lowercase(), item.id);
            catalog.items.insert(item.id, item);
        }

        for task in tasks {
            let task_ref = task.task_ref();
            if catalog.tasks.contains_key(&task_ref) {
                return Err(anyhow!("duplicate task {task_ref}"));
            }
            catalog.tasks.insert(task_ref, task);
        }

        for upgrade in upgrades {
            if catalog.upgrades.contains_key(&upgrade.id) {
                return Err(anyhow!("duplicate upgrade id {}", upgrade.id));
            }
            catalog.upgrades.insert(upgrade.id, upgrade);
        }

        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let document: CatalogDocument =
            serde_json::from_str(text).context("failed to parse game catalog")?;
        Self::new(
            document.settings,
            document.items,
            document.tasks,
            document.upgrades,
        )
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = Self::from_json(&text)
            .with_context(|| format!("failed to load catalog {}", path.display()))?;
        tracing::info!(
            target: "catalog",
            path = %path.display(),
            items = catalog.items.len(),
            tasks = catalog.tasks.len(),
            upgrades = catalog.upgrades.len(),
            "catalog_loaded"
        );
        Ok(catalog)
    }
}

impl GameCatalog for StaticCatalog {
    fn item(&self, item_id: ItemId) -> Option<&ItemDefinition> {
        self.items.get(&item_id)
    }

    fn item_by_name(&self, name: &str) -> Option<&ItemDefinition> {
        self.item_names
            .get(&name.to_ascii_lowercase())
            .and_then(|id| self.items.get(id))
    }

    fn task(&self, task: TaskRef) -> Option<&TaskDefinition> {
        self.tasks.get(&task)
    }

    fn upgrade(&self, upgrade_id: UpgradeId) -> Option<&UpgradeDefinition> {
        self.upgrades.get(&upgrade_id)
    }

    fn settings(&self) -> &GameSettings {
        &self.settings
    }
}
