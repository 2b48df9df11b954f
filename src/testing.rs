//! Fakes and fixtures shared by unit and integration tests.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::{
    catalog::{
        EquipmentSlot, GameSettings, ItemDefinition, ItemEffect, ItemStack, Skill, StaticCatalog,
        TaskCategory, TaskDefinition, TaskRef, UpgradeBenefit, UpgradeDefinition, UpgradeTier,
    },
    error::SyncError,
    guard::GuardTable,
    notify::{Notification, NotificationSink},
    session::{GameClient, SessionOptions},
    transport::{
        connection::Transport,
        ports::{
            LinkEvent, LinkEventReceiver, LinkEventSender, LinkId, OutboundFrame, OutboundPort,
            OutboundSender, SocketConnector, SocketEvent,
        },
        wire::ClientRecord,
    },
};

/// Captures every record a manager sends.
#[derive(Default)]
pub struct RecordingOutbound {
    records: Mutex<Vec<ClientRecord>>,
    failure: Mutex<Option<SyncError>>,
}

impl RecordingOutbound {
    pub fn records(&self) -> Vec<ClientRecord> {
        self.records.lock().expect("lock poisoned").clone()
    }

    /// Every later send fails with `err` until `recover` is called.
    pub fn fail_with(&self, err: SyncError) {
        *self.failure.lock().expect("lock poisoned") = Some(err);
    }

    pub fn recover(&self) {
        self.failure.lock().expect("lock poisoned").take();
    }
}

impl OutboundPort for RecordingOutbound {
    fn send(&self, record: &ClientRecord) -> Result<(), SyncError> {
        if let Some(err) = self.failure.lock().expect("lock poisoned").clone() {
            return Err(err);
        }
        self.records.lock().expect("lock poisoned").push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().expect("lock poisoned").clone()
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock().expect("lock poisoned"))
    }

    pub fn failures(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|notification| matches!(notification, Notification::Failure { .. }))
            .count()
    }
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .expect("lock poisoned")
            .push(notification);
    }
}

/// One link opened through the loopback connector.
pub struct LoopbackLink {
    pub url: String,
    pub link_id: LinkId,
    events: LinkEventSender,
    frames: Mutex<mpsc::UnboundedReceiver<OutboundFrame>>,
}

impl LoopbackLink {
    /// Stamps an event with this link's generation.
    pub fn event(&self, event: SocketEvent) -> LinkEvent {
        LinkEvent {
            link_id: self.link_id,
            event,
        }
    }

    /// Queues an event on the transport's event channel.
    pub fn emit(&self, event: SocketEvent) -> bool {
        self.events.send(self.event(event)).is_ok()
    }

    pub fn drain_frames(&self) -> Vec<OutboundFrame> {
        let mut frames = self.frames.lock().expect("lock poisoned");
        let mut drained = Vec::new();
        while let Ok(frame) = frames.try_recv() {
            drained.push(frame);
        }
        drained
    }

    /// Outbound text frames parsed as JSON.
    pub fn drain_json(&self) -> Vec<serde_json::Value> {
        self.drain_frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
                OutboundFrame::Close { .. } => None,
            })
            .collect()
    }
}

/// In-process connector: no socket, the test plays the server.
#[derive(Default)]
pub struct LoopbackConnector {
    links: Mutex<Vec<Arc<LoopbackLink>>>,
    failure: Mutex<Option<SyncError>>,
}

impl LoopbackConnector {
    pub fn fail_next_open(&self, err: SyncError) {
        *self.failure.lock().expect("lock poisoned") = Some(err);
    }

    pub fn links(&self) -> Vec<Arc<LoopbackLink>> {
        self.links.lock().expect("lock poisoned").clone()
    }

    pub fn last_link(&self) -> Option<Arc<LoopbackLink>> {
        self.links.lock().expect("lock poisoned").last().cloned()
    }
}

impl SocketConnector for LoopbackConnector {
    fn open(
        &self,
        url: &str,
        link_id: LinkId,
        events: LinkEventSender,
    ) -> Result<OutboundSender, SyncError> {
        if let Some(err) = self.failure.lock().expect("lock poisoned").take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.links
            .lock()
            .expect("lock poisoned")
            .push(Arc::new(LoopbackLink {
                url: url.to_string(),
                link_id,
                events,
                frames: Mutex::new(rx),
            }));
        Ok(tx)
    }
}

pub const TEST_URL: &str = "ws://loopback.test/ws";

/// A full session over a loopback link. Events are applied synchronously
/// through `Transport::handle_link_event`, so tests never need the pump.
pub struct SessionHarness {
    pub connector: Arc<LoopbackConnector>,
    pub transport: Arc<Transport>,
    pub client: GameClient,
    pub notifications: Arc<RecordingNotifications>,
    pub link_events: LinkEventReceiver,
}

impl SessionHarness {
    pub fn new(placeholders: bool) -> Self {
        let connector = Arc::new(LoopbackConnector::default());
        let (transport, link_events) = Transport::new(Arc::clone(&connector) as Arc<dyn SocketConnector>);
        let notifications = Arc::new(RecordingNotifications::default());
        let client = GameClient::new(
            Arc::clone(&transport),
            Arc::new(sample_catalog()),
            GuardTable::default(),
            Arc::clone(&notifications) as Arc<dyn NotificationSink>,
            SessionOptions {
                session_credential: "test-credential".to_string(),
                client_version: "0.1.0-test".to_string(),
                config_version: 1,
                placeholders,
            },
        );
        Self {
            connector,
            transport,
            client,
            notifications,
            link_events,
        }
    }

    /// Connected session with the authentication frame already drained.
    pub fn connected() -> Self {
        let harness = Self::new(true);
        harness.open();
        harness
    }

    pub fn open(&self) -> Arc<LoopbackLink> {
        self.transport
            .connect(TEST_URL)
            .expect("loopback connect should succeed");
        let link = self.link();
        self.transport.handle_link_event(link.event(SocketEvent::Opened));
        link.drain_frames();
        link
    }

    pub fn link(&self) -> Arc<LoopbackLink> {
        self.connector
            .last_link()
            .expect("a link has been opened")
    }

    /// Delivers one server record as a text frame on the current link.
    pub fn deliver(&self, record: serde_json::Value) {
        let link = self.link();
        self.transport
            .handle_link_event(link.event(SocketEvent::Message(record.to_string())));
    }

    pub fn sent(&self) -> Vec<serde_json::Value> {
        self.link().drain_json()
    }

    pub fn drop_link(&self, code: u16, reason: &str) {
        let link = self.link();
        self.transport.handle_link_event(link.event(SocketEvent::Closed {
            code,
            reason: reason.to_string(),
        }));
    }
}

pub mod items {
    use crate::catalog::ItemId;

    pub const GOLD: ItemId = 1;
    pub const COPPER_ORE: ItemId = 10;
    pub const BRONZE_BAR: ItemId = 12;
    pub const OAK_LOG: ItemId = 20;
    pub const OAK_PLANK: ItemId = 21;
    pub const RAW_SHRIMP: ItemId = 30;
    pub const FURNACE_GLOVES: ItemId = 40;
    pub const LUCKY_AXE: ItemId = 41;
    pub const CARVING_KNIFE: ItemId = 42;
    pub const BRONZE_HELM: ItemId = 43;
    pub const IRON_HELM: ItemId = 44;
    pub const BRONZE_ARROW: ItemId = 45;
    pub const FOCUS_POTION: ItemId = 50;
}

pub mod tasks {
    use crate::catalog::{TaskCategory, TaskRef};

    pub const OAK_LOGS: TaskRef = TaskRef {
        category: TaskCategory::Woodcutting,
        task_id: 1,
    };
    pub const SHRIMP: TaskRef = TaskRef {
        category: TaskCategory::Fishing,
        task_id: 1,
    };
    pub const SMELT_BRONZE: TaskRef = TaskRef {
        category: TaskCategory::Smelting,
        task_id: 1,
    };
    /// Requires Crafting level 5.
    pub const OAK_PLANKS: TaskRef = TaskRef {
        category: TaskCategory::Crafting,
        task_id: 1,
    };
}

pub mod upgrades {
    use crate::catalog::UpgradeId;

    pub const SMELTING_DISCOUNT: UpgradeId = 1;
    pub const HARVEST_BOOST: UpgradeId = 2;
}

fn item(id: u32, name: &str, slot: Option<EquipmentSlot>, effects: Vec<ItemEffect>) -> ItemDefinition {
    ItemDefinition {
        id,
        name: name.to_string(),
        equipment_slot: slot,
        value: 1,
        counterpart: None,
        effects,
    }
}

fn task(
    task_ref: TaskRef,
    name: &str,
    skill: Skill,
    level_required: u32,
    experience: f64,
    reward: ItemStack,
    costs: Vec<ItemStack>,
) -> TaskDefinition {
    TaskDefinition {
        category: task_ref.category,
        id: task_ref.task_id,
        name: name.to_string(),
        skill,
        level_required,
        time_ms: 3_000,
        experience,
        reward,
        costs,
    }
}

fn stack(item_id: u32, amount: u64) -> ItemStack {
    ItemStack { item_id, amount }
}

/// Small catalog covering every pipeline path. Eight inventory slots;
/// levels at 100, 400, 900, 1600 experience and so on.
pub fn sample_catalog() -> StaticCatalog {
    let settings = GameSettings {
        currency_item_id: items::GOLD,
        inventory_size: 8,
        harvest_boost_upgrade: Some(upgrades::HARVEST_BOOST),
        harvest_flat_experience: 5.0,
        chained_bonus_experience_percent: 10.0,
        ..GameSettings::default()
    };

    let mut oak_log = item(items::OAK_LOG, "Oak Log", None, vec![]);
    oak_log.counterpart = Some(items::OAK_PLANK);

    let item_list = vec![
        item(items::GOLD, "Gold", None, vec![]),
        item(items::COPPER_ORE, "Copper Ore", None, vec![]),
        item(items::BRONZE_BAR, "Bronze Bar", None, vec![]),
        oak_log,
        item(items::OAK_PLANK, "Oak Plank", None, vec![]),
        item(items::RAW_SHRIMP, "Raw Shrimp", None, vec![]),
        item(
            items::FURNACE_GLOVES,
            "Furnace Gloves",
            Some(EquipmentSlot::Hands),
            vec![ItemEffect::CostReductionProc {
                skill: Skill::Smithing,
                percent: 50.0,
            }],
        ),
        item(
            items::LUCKY_AXE,
            "Lucky Axe",
            Some(EquipmentSlot::Tool),
            vec![ItemEffect::ExperienceBoost {
                skill: Skill::Woodcutting,
                percent: 10.0,
            }],
        ),
        item(
            items::CARVING_KNIFE,
            "Carving Knife",
            Some(EquipmentSlot::OffHand),
            vec![ItemEffect::ExperienceBoost {
                skill: Skill::Crafting,
                percent: 15.0,
            }],
        ),
        item(items::BRONZE_HELM, "Bronze Helm", Some(EquipmentSlot::Head), vec![]),
        item(items::IRON_HELM, "Iron Helm", Some(EquipmentSlot::Head), vec![]),
        item(
            items::BRONZE_ARROW,
            "Bronze Arrow",
            Some(EquipmentSlot::Ammunition),
            vec![],
        ),
        item(
            items::FOCUS_POTION,
            "Focus Potion",
            None,
            vec![ItemEffect::ConsumableExperienceBoost { percent: 20.0 }],
        ),
    ];

    let task_list = vec![
        task(
            tasks::OAK_LOGS,
            "Oak Tree",
            Skill::Woodcutting,
            1,
            25.0,
            stack(items::OAK_LOG, 1),
            vec![],
        ),
        task(
            tasks::SHRIMP,
            "Shrimp",
            Skill::Fishing,
            1,
            10.0,
            stack(items::RAW_SHRIMP, 1),
            vec![],
        ),
        task(
            tasks::SMELT_BRONZE,
            "Bronze Bar",
            Skill::Smithing,
            1,
            15.0,
            stack(items::BRONZE_BAR, 1),
            vec![stack(items::COPPER_ORE, 6), stack(items::GOLD, 5)],
        ),
        task(
            tasks::OAK_PLANKS,
            "Oak Plank",
            Skill::Crafting,
            5,
            12.0,
            stack(items::OAK_PLANK, 1),
            vec![stack(items::OAK_LOG, 1)],
        ),
    ];

    let upgrade_list = vec![
        UpgradeDefinition {
            id: upgrades::SMELTING_DISCOUNT,
            name: "Efficient Furnace".to_string(),
            tiers: vec![
                UpgradeTier {
                    benefits: vec![UpgradeBenefit::CostReduction {
                        category: TaskCategory::Smelting,
                        percent: 10.0,
                    }],
                },
                UpgradeTier {
                    benefits: vec![UpgradeBenefit::CostReduction {
                        category: TaskCategory::Smelting,
                        percent: 20.0,
                    }],
                },
            ],
        },
        UpgradeDefinition {
            id: upgrades::HARVEST_BOOST,
            name: "Seasoned Harvester".to_string(),
            tiers: vec![UpgradeTier::default()],
        },
    ];

    StaticCatalog::new(settings, item_list, task_list, upgrade_list)
        .expect("sample catalog ids are unique")
}
