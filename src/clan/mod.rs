mod manager;
pub mod types;

pub use manager::ClanManager;
pub use types::{
    ClanAggregate, ClanApplication, ClanMember, ClanQuest, ClanRank, ClanSnapshot,
    RecruitmentSettings, Username,
};
