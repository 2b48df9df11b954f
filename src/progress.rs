use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::{
    catalog::{GameCatalog, Skill, UpgradeId},
    error::{SyncError, catalog_error},
    notify::{Notification, NotificationSink, report_handler_result},
    transport::{
        registry::{DispatchRegistry, ListenerId},
        wire::{ServerRecord, UpgradeUnlock, tags},
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub skills: BTreeMap<Skill, u64>,
    pub upgrades: BTreeMap<UpgradeId, u32>,
}

/// Skill experience and owned upgrade tiers.
#[derive(Clone)]
pub struct ProgressManager {
    state: Arc<Mutex<ProgressState>>,
    catalog: Arc<dyn GameCatalog>,
    notifier: Arc<dyn NotificationSink>,
}

impl ProgressManager {
    pub fn new(catalog: Arc<dyn GameCatalog>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgressState::default())),
            catalog,
            notifier,
        }
    }

    pub fn snapshot(&self) -> ProgressState {
        self.state.lock().expect("lock poisoned").clone()
    }

    pub fn experience(&self, skill: Skill) -> u64 {
        self.state
            .lock()
            .expect("lock poisoned")
            .skills
            .get(&skill)
            .copied()
            .unwrap_or(0)
    }

    pub fn level(&self, skill: Skill) -> u32 {
        self.catalog
            .settings()
            .level_for_experience(self.experience(skill))
    }

    pub fn owned_upgrades(&self) -> BTreeMap<UpgradeId, u32> {
        self.state.lock().expect("lock poisoned").upgrades.clone()
    }

    pub fn grant_experience(&self, skill: Skill, amount: u64) {
        if amount == 0 {
            return;
        }
        let (before, after) = {
            let mut state = self.state.lock().expect("lock poisoned");
            let experience = state.skills.entry(skill).or_insert(0);
            let before = *experience;
            *experience = experience.saturating_add(amount);
            (before, *experience)
        };

        self.notifier
            .notify(Notification::ExperienceGained { skill, amount });
        let settings = self.catalog.settings();
        let (old_level, new_level) = (
            settings.level_for_experience(before),
            settings.level_for_experience(after),
        );
        if new_level > old_level {
            tracing::info!(
                target: "progress",
                skill = ?skill,
                level = new_level,
                "level_up"
            );
            self.notifier.notify(Notification::LevelUp {
                skill,
                level: new_level,
            });
        }
    }

    pub fn handle_record(&self, record: &ServerRecord) -> Result<(), SyncError> {
        match record {
            ServerRecord::PlayerSnapshot(snapshot) => {
                *self.state.lock().expect("lock poisoned") = ProgressState {
                    skills: snapshot.skills.clone(),
                    upgrades: snapshot.upgrades.clone(),
                };
                Ok(())
            }
            ServerRecord::UpgradeUnlocked(unlock) => self.unlock_upgrade(*unlock),
            _ => Ok(()),
        }
    }

    pub fn reset(&self) {
        *self.state.lock().expect("lock poisoned") = ProgressState::default();
    }

    pub fn install(&self, registry: &DispatchRegistry) -> Vec<ListenerId> {
        [tags::PLAYER_SNAPSHOT, tags::UPGRADE_UNLOCKED]
            .into_iter()
            .map(|tag| {
                let manager = self.clone();
                registry.register_packet(tag, move |record| {
                    let result = manager.handle_record(record);
                    report_handler_result(
                        manager.notifier.as_ref(),
                        "progress",
                        "progress_record",
                        result,
                    );
                })
            })
            .collect()
    }

    fn unlock_upgrade(&self, unlock: UpgradeUnlock) -> Result<(), SyncError> {
        if self.catalog.upgrade(unlock.upgrade_id).is_none() {
            return Err(catalog_error(format!(
                "unknown upgrade {}",
                unlock.upgrade_id
            )));
        }
        self.state
            .lock()
            .expect("lock poisoned")
            .upgrades
            .insert(unlock.upgrade_id, unlock.tier);
        tracing::info!(
            target: "progress",
            upgrade_id = unlock.upgrade_id,
            tier = unlock.tier,
            "upgrade_unlocked"
        );
        Ok(())
    }
}
