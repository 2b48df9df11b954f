use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    catalog::{EquipmentSlot, ItemId, ItemStack, Skill, TaskCategory, TaskId, TaskRef, UpgradeId},
    clan::types::{ClanApplication, ClanMember, ClanSnapshot, Username},
    error::{SyncError, protocol_error},
};

pub type RecordTag = u16;

pub mod tags {
    use super::RecordTag;

    pub const AUTHENTICATE: RecordTag = 1;
    pub const AUTHENTICATED: RecordTag = 2;
    pub const PLAYER_SNAPSHOT: RecordTag = 3;

    pub const SWITCH_ITEMS: RecordTag = 10;
    pub const EQUIP_ITEM: RecordTag = 11;
    pub const UNEQUIP_ITEM: RecordTag = 12;
    pub const ITEMS_GRANTED: RecordTag = 13;
    pub const ITEMS_REMOVED: RecordTag = 14;

    pub const TOGGLE_TASK: RecordTag = 20;
    pub const TASK_STARTED: RecordTag = 21;
    pub const TASK_CANCELLED: RecordTag = 22;
    pub const TASK_COMPLETED: RecordTag = 23;
    pub const UPGRADE_UNLOCKED: RecordTag = 24;

    pub const CLAN_RECRUITMENT: RecordTag = 30;
    pub const CLAN_CATEGORY: RecordTag = 31;
    pub const CLAN_LANGUAGE: RecordTag = 32;
    pub const CLAN_MESSAGE: RecordTag = 33;
    pub const CLAN_MIN_LEVEL: RecordTag = 34;
    pub const CLAN_TAG: RecordTag = 35;

    pub const CLAN_STATE: RecordTag = 40;
    pub const CLAN_MEMBER_JOINED: RecordTag = 41;
    pub const CLAN_MEMBER_LEFT: RecordTag = 42;
    pub const CLAN_LEADER_LEFT: RecordTag = 43;
    pub const CLAN_VAULT_UPDATED: RecordTag = 44;
    pub const CLAN_PVM_STATS_UPDATED: RecordTag = 45;
    pub const CLAN_APPLICATIONS_UPDATED: RecordTag = 46;

    pub const SERVER_ERROR: RecordTag = 99;
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("record is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record is not a json object")]
    NotAnObject,
    #[error("record has no tag field")]
    MissingTag,
    #[error("record tag is not a valid record tag: {0}")]
    InvalidTag(Value),
    #[error("record with tag {tag} has an invalid payload: {source}")]
    Payload {
        tag: RecordTag,
        source: serde_json::Error,
    },
}

impl From<WireError> for SyncError {
    fn from(err: WireError) -> Self {
        protocol_error(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticate {
    pub session_credential: String,
    pub client_version: String,
    pub config_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticated {
    pub username: Username,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSwap {
    pub first: usize,
    pub second: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipItem {
    pub item_id: ItemId,
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnequipItem {
    pub item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDelta {
    pub items: Vec<ItemStack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeUnlock {
    pub upgrade_id: UpgradeId,
    pub tier: u32,
}

/// Everything the server knows about the player, sent after authentication.
/// Inventory entries are `null` for empty slots and `amount: 0` for placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub username: Username,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub inventory: Vec<Option<ItemStack>>,
    #[serde(default)]
    pub equipment: BTreeMap<EquipmentSlot, ItemId>,
    #[serde(default)]
    pub ammunition_count: u64,
    #[serde(default)]
    pub skills: BTreeMap<Skill, u64>,
    #[serde(default)]
    pub upgrades: BTreeMap<UpgradeId, u32>,
    #[serde(default)]
    pub active_task: Option<TaskRef>,
}

/// Server-decided side effects that fired on a task completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    /// An equipped item's cost-reduction proc fired.
    CostProc { item_id: ItemId },
    /// The reward is replaced by the reward item's counterpart.
    CounterpartReward,
    /// A related task's reward is granted as well.
    ChainedBonus {
        category: TaskCategory,
        task_id: TaskId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub category: TaskCategory,
    pub task_id: TaskId,
    #[serde(default)]
    pub consumable_id: Option<ItemId>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl TaskCompletion {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            category: self.category,
            task_id: self.task_id,
        }
    }

    pub fn chained_bonus(&self) -> Option<TaskRef> {
        self.interactions.iter().find_map(|interaction| match interaction {
            Interaction::ChainedBonus { category, task_id } => Some(TaskRef {
                category: *category,
                task_id: *task_id,
            }),
            _ => None,
        })
    }

    pub fn has_counterpart_reward(&self) -> bool {
        self.interactions
            .iter()
            .any(|interaction| matches!(interaction, Interaction::CounterpartReward))
    }

    pub fn fired_procs(&self) -> Vec<ItemId> {
        self.interactions
            .iter()
            .filter_map(|interaction| match interaction {
                Interaction::CostProc { item_id } => Some(*item_id),
                _ => None,
            })
            .collect()
    }
}

/// One clan setting, used both as the request and as its confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClanFieldUpdate {
    Recruitment(bool),
    Category(String),
    Language(String),
    Message(String),
    MinLevel(u32),
    Tag(String),
}

impl ClanFieldUpdate {
    pub fn tag(&self) -> RecordTag {
        match self {
            ClanFieldUpdate::Recruitment(_) => tags::CLAN_RECRUITMENT,
            ClanFieldUpdate::Category(_) => tags::CLAN_CATEGORY,
            ClanFieldUpdate::Language(_) => tags::CLAN_LANGUAGE,
            ClanFieldUpdate::Message(_) => tags::CLAN_MESSAGE,
            ClanFieldUpdate::MinLevel(_) => tags::CLAN_MIN_LEVEL,
            ClanFieldUpdate::Tag(_) => tags::CLAN_TAG,
        }
    }

    pub fn guard_key(&self) -> &'static str {
        match self {
            ClanFieldUpdate::Recruitment(_) => "clan_recruitment",
            ClanFieldUpdate::Category(_) => "clan_category",
            ClanFieldUpdate::Language(_) => "clan_language",
            ClanFieldUpdate::Message(_) => "clan_message",
            ClanFieldUpdate::MinLevel(_) => "clan_min_level",
            ClanFieldUpdate::Tag(_) => "clan_tag",
        }
    }

    fn payload(&self) -> Value {
        match self {
            ClanFieldUpdate::Recruitment(open) => serde_json::json!({ "open": open }),
            ClanFieldUpdate::Category(category) => serde_json::json!({ "category": category }),
            ClanFieldUpdate::Language(language) => serde_json::json!({ "language": language }),
            ClanFieldUpdate::Message(message) => serde_json::json!({ "message": message }),
            ClanFieldUpdate::MinLevel(min_level) => serde_json::json!({ "min_level": min_level }),
            ClanFieldUpdate::Tag(clan_tag) => serde_json::json!({ "clan_tag": clan_tag }),
        }
    }

    fn decode(tag: RecordTag, body: Value) -> Result<Self, WireError> {
        #[derive(Deserialize)]
        struct Open {
            open: bool,
        }
        #[derive(Deserialize)]
        struct Category {
            category: String,
        }
        #[derive(Deserialize)]
        struct Language {
            language: String,
        }
        #[derive(Deserialize)]
        struct Message {
            message: String,
        }
        #[derive(Deserialize)]
        struct MinLevel {
            min_level: u32,
        }
        #[derive(Deserialize)]
        struct Tag {
            clan_tag: String,
        }

        let update = match tag {
            tags::CLAN_RECRUITMENT => {
                ClanFieldUpdate::Recruitment(payload::<Open>(tag, body)?.open)
            }
            tags::CLAN_CATEGORY => {
                ClanFieldUpdate::Category(payload::<Category>(tag, body)?.category)
            }
            tags::CLAN_LANGUAGE => {
                ClanFieldUpdate::Language(payload::<Language>(tag, body)?.language)
            }
            tags::CLAN_MESSAGE => ClanFieldUpdate::Message(payload::<Message>(tag, body)?.message),
            tags::CLAN_MIN_LEVEL => {
                ClanFieldUpdate::MinLevel(payload::<MinLevel>(tag, body)?.min_level)
            }
            tags::CLAN_TAG => ClanFieldUpdate::Tag(payload::<Tag>(tag, body)?.clan_tag),
            other => return Err(WireError::InvalidTag(Value::from(other))),
        };
        Ok(update)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientRecord {
    Authenticate(Authenticate),
    SwitchItems(SlotSwap),
    EquipItem(EquipItem),
    UnequipItem(UnequipItem),
    ToggleTask(TaskRef),
    UpdateClanField(ClanFieldUpdate),
}

impl ClientRecord {
    pub fn tag(&self) -> RecordTag {
        match self {
            ClientRecord::Authenticate(_) => tags::AUTHENTICATE,
            ClientRecord::SwitchItems(_) => tags::SWITCH_ITEMS,
            ClientRecord::EquipItem(_) => tags::EQUIP_ITEM,
            ClientRecord::UnequipItem(_) => tags::UNEQUIP_ITEM,
            ClientRecord::ToggleTask(_) => tags::TOGGLE_TASK,
            ClientRecord::UpdateClanField(update) => update.tag(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerRecord {
    Authenticated(Authenticated),
    PlayerSnapshot(Box<PlayerSnapshot>),
    ItemsSwitched(SlotSwap),
    ItemEquipped(EquipItem),
    ItemUnequipped(UnequipItem),
    ItemsGranted(ItemDelta),
    ItemsRemoved(ItemDelta),
    TaskStarted(TaskRef),
    TaskCancelled,
    TaskCompleted(TaskCompletion),
    UpgradeUnlocked(UpgradeUnlock),
    ClanFieldUpdated(ClanFieldUpdate),
    ClanState(Box<ClanSnapshot>),
    ClanMemberJoined {
        member: ClanMember,
    },
    ClanMemberLeft {
        username: Username,
    },
    ClanLeaderLeft {
        username: Username,
        successor: Username,
    },
    ClanVaultUpdated {
        vault: BTreeMap<ItemId, u64>,
    },
    ClanPvmStatsUpdated {
        stats: BTreeMap<String, u64>,
    },
    ClanApplicationsUpdated {
        applications: Vec<ClanApplication>,
    },
    ServerError {
        message: String,
        code: Option<String>,
    },
    Unrecognized {
        tag: RecordTag,
    },
}

impl ServerRecord {
    pub fn tag(&self) -> RecordTag {
        match self {
            ServerRecord::Authenticated(_) => tags::AUTHENTICATED,
            ServerRecord::PlayerSnapshot(_) => tags::PLAYER_SNAPSHOT,
            ServerRecord::ItemsSwitched(_) => tags::SWITCH_ITEMS,
            ServerRecord::ItemEquipped(_) => tags::EQUIP_ITEM,
            ServerRecord::ItemUnequipped(_) => tags::UNEQUIP_ITEM,
            ServerRecord::ItemsGranted(_) => tags::ITEMS_GRANTED,
            ServerRecord::ItemsRemoved(_) => tags::ITEMS_REMOVED,
            ServerRecord::TaskStarted(_) => tags::TASK_STARTED,
            ServerRecord::TaskCancelled => tags::TASK_CANCELLED,
            ServerRecord::TaskCompleted(_) => tags::TASK_COMPLETED,
            ServerRecord::UpgradeUnlocked(_) => tags::UPGRADE_UNLOCKED,
            ServerRecord::ClanFieldUpdated(update) => update.tag(),
            ServerRecord::ClanState(_) => tags::CLAN_STATE,
            ServerRecord::ClanMemberJoined { .. } => tags::CLAN_MEMBER_JOINED,
            ServerRecord::ClanMemberLeft { .. } => tags::CLAN_MEMBER_LEFT,
            ServerRecord::ClanLeaderLeft { .. } => tags::CLAN_LEADER_LEFT,
            ServerRecord::ClanVaultUpdated { .. } => tags::CLAN_VAULT_UPDATED,
            ServerRecord::ClanPvmStatsUpdated { .. } => tags::CLAN_PVM_STATS_UPDATED,
            ServerRecord::ClanApplicationsUpdated { .. } => tags::CLAN_APPLICATIONS_UPDATED,
            ServerRecord::ServerError { .. } => tags::SERVER_ERROR,
            ServerRecord::Unrecognized { tag } => *tag,
        }
    }
}

fn payload<T: DeserializeOwned>(tag: RecordTag, body: Value) -> Result<T, WireError> {
    serde_json::from_value(body).map_err(|source| WireError::Payload { tag, source })
}

pub fn decode_server_record(text: &str) -> Result<ServerRecord, WireError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(WireError::NotAnObject);
    };

    let raw_tag = object.remove("tag").ok_or(WireError::MissingTag)?;
    let tag = raw_tag
        .as_u64()
        .and_then(|tag| RecordTag::try_from(tag).ok())
        .ok_or_else(|| WireError::InvalidTag(raw_tag.clone()))?;
    let body = Value::Object(object);

    #[derive(Deserialize)]
    struct MemberJoined {
        member: ClanMember,
    }
    #[derive(Deserialize)]
    struct MemberLeft {
        username: Username,
    }
    #[derive(Deserialize)]
    struct LeaderLeft {
        username: Username,
        successor: Username,
    }
    #[derive(Deserialize)]
    struct Vault {
        vault: BTreeMap<ItemId, u64>,
    }
    #[derive(Deserialize)]
    struct PvmStats {
        stats: BTreeMap<String, u64>,
    }
    #[derive(Deserialize)]
    struct Applications {
        applications: Vec<ClanApplication>,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
        #[serde(default)]
        code: Option<String>,
    }

    let record = match tag {
        tags::AUTHENTICATED => ServerRecord::Authenticated(payload(tag, body)?),
        tags::PLAYER_SNAPSHOT => ServerRecord::PlayerSnapshot(Box::new(payload(tag, body)?)),
        tags::SWITCH_ITEMS => ServerRecord::ItemsSwitched(payload(tag, body)?),
        tags::EQUIP_ITEM => ServerRecord::ItemEquipped(payload(tag, body)?),
        tags::UNEQUIP_ITEM => ServerRecord::ItemUnequipped(payload(tag, body)?),
        tags::ITEMS_GRANTED => ServerRecord::ItemsGranted(payload(tag, body)?),
        tags::ITEMS_REMOVED => ServerRecord::ItemsRemoved(payload(tag, body)?),
        tags::TASK_STARTED => ServerRecord::TaskStarted(payload(tag, body)?),
        tags::TASK_CANCELLED => ServerRecord::TaskCancelled,
        tags::TASK_COMPLETED => ServerRecord::TaskCompleted(payload(tag, body)?),
        tags::UPGRADE_UNLOCKED => ServerRecord::UpgradeUnlocked(payload(tag, body)?),
        tags::CLAN_RECRUITMENT
        | tags::CLAN_CATEGORY
        | tags::CLAN_LANGUAGE
        | tags::CLAN_MESSAGE
        | tags::CLAN_MIN_LEVEL
        | tags::CLAN_TAG => ServerRecord::ClanFieldUpdated(ClanFieldUpdate::decode(tag, body)?),
        tags::CLAN_STATE => ServerRecord::ClanState(Box::new(payload(tag, body)?)),
        tags::CLAN_MEMBER_JOINED => {
            let MemberJoined { member } = payload(tag, body)?;
            ServerRecord::ClanMemberJoined { member }
        }
        tags::CLAN_MEMBER_LEFT => {
            let MemberLeft { username } = payload(tag, body)?;
            ServerRecord::ClanMemberLeft { username }
        }
        tags::CLAN_LEADER_LEFT => {
            let LeaderLeft {
                username,
                successor,
            } = payload(tag, body)?;
            ServerRecord::ClanLeaderLeft {
                username,
                successor,
            }
        }
        tags::CLAN_VAULT_UPDATED => {
            let Vault { vault } = payload(tag, body)?;
            ServerRecord::ClanVaultUpdated { vault }
        }
        tags::CLAN_PVM_STATS_UPDATED => {
            let PvmStats { stats } = payload(tag, body)?;
            ServerRecord::ClanPvmStatsUpdated { stats }
        }
        tags::CLAN_APPLICATIONS_UPDATED => {
            let Applications { applications } = payload(tag, body)?;
            ServerRecord::ClanApplicationsUpdated { applications }
        }
        tags::SERVER_ERROR => {
            let ErrorBody { message, code } = payload(tag, body)?;
            ServerRecord::ServerError { message, code }
        }
        other => ServerRecord::Unrecognized { tag: other },
    };
    Ok(record)
}

pub fn encode_client_record(record: &ClientRecord) -> Result<String, WireError> {
    let body = match record {
        ClientRecord::Authenticate(auth) => serde_json::to_value(auth)?,
        ClientRecord::SwitchItems(swap) => serde_json::to_value(swap)?,
        ClientRecord::EquipItem(equip) => serde_json::to_value(equip)?,
        ClientRecord::UnequipItem(unequip) => serde_json::to_value(unequip)?,
        ClientRecord::ToggleTask(task) => serde_json::to_value(task)?,
        ClientRecord::UpdateClanField(update) => update.payload(),
    };
    let Value::Object(fields) = body else {
        return Err(WireError::NotAnObject);
    };

    let mut object = Map::with_capacity(fields.len() + 1);
    object.insert("tag".to_string(), Value::from(record.tag()));
    object.extend(fields);
    Ok(serde_json::to_string(&Value::Object(object))?)
}
