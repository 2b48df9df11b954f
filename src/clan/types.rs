use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{ItemId, Skill, UpgradeId};

pub type Username = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClanRank {
    Leader,
    Officer,
    Member,
    Recruit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanMember {
    pub username: Username,
    pub rank: ClanRank,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanQuest {
    pub id: u32,
    #[serde(default)]
    pub progress: u64,
    pub goal: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanApplication {
    pub username: Username,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RecruitmentSettings {
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default)]
    pub clan_tag: String,
}

/// Full clan state as the server sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanSnapshot {
    pub name: String,
    #[serde(default)]
    pub members: Vec<ClanMember>,
    #[serde(default)]
    pub credits: u64,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub vault: BTreeMap<ItemId, u64>,
    #[serde(default)]
    pub quests: Vec<ClanQuest>,
    #[serde(default)]
    pub upgrades: BTreeSet<UpgradeId>,
    #[serde(default)]
    pub applications: Vec<ClanApplication>,
    #[serde(default)]
    pub skills: BTreeMap<Skill, u64>,
    #[serde(default)]
    pub tickets: u32,
    #[serde(default)]
    pub recruitment: RecruitmentSettings,
    #[serde(default)]
    pub pvm_stats: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanAggregate {
    pub name: String,
    pub members: BTreeMap<Username, ClanMember>,
    pub credits: u64,
    pub gold: u64,
    pub vault: BTreeMap<ItemId, u64>,
    pub quests: Vec<ClanQuest>,
    pub upgrades: BTreeSet<UpgradeId>,
    pub applications: Vec<ClanApplication>,
    pub skills: BTreeMap<Skill, u64>,
    pub tickets: u32,
    pub recruitment: RecruitmentSettings,
    pub pvm_stats: BTreeMap<String, u64>,
}

impl From<ClanSnapshot> for ClanAggregate {
    fn from(snapshot: ClanSnapshot) -> Self {
        Self {
            name: snapshot.name,
            members: snapshot
                .members
                .into_iter()
                .map(|member| (member.username.clone(), member))
                .collect(),
            credits: snapshot.credits,
            gold: snapshot.gold,
            vault: snapshot.vault,
            quests: snapshot.quests,
            upgrades: snapshot.upgrades,
            applications: snapshot.applications,
            skills: snapshot.skills,
            tickets: snapshot.tickets,
            recruitment: snapshot.recruitment,
            pvm_stats: snapshot.pvm_stats,
        }
    }
}

impl ClanAggregate {
    pub fn leader(&self) -> Option<&ClanMember> {
        self.members
            .values()
            .find(|member| member.rank == ClanRank::Leader)
    }
}
