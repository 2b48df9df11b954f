use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::{
    catalog::ItemId,
    clan::types::{ClanAggregate, ClanApplication, ClanMember, ClanRank, Username},
    error::{SyncError, desync},
    guard::{ActionOutcome, GuardTable, GuardedRequest},
    notify::{Notification, NotificationSink, report_handler_result},
    transport::{
        ports::OutboundPort,
        registry::{DispatchRegistry, ListenerId},
        wire::{ClanFieldUpdate, ClientRecord, ServerRecord, tags},
    },
};

#[derive(Debug, Default)]
struct ClanState {
    aggregate: Option<ClanAggregate>,
    local_username: Option<Username>,
}

/// What a patch did to the aggregate.
enum PatchOutcome {
    Applied,
    Discarded,
    Ignored,
}

#[derive(Clone)]
pub struct ClanManager {
    state: Arc<Mutex<ClanState>>,
    outbound: Arc<dyn OutboundPort>,
    guards: GuardTable,
    notifier: Arc<dyn NotificationSink>,
}

impl ClanManager {
    pub fn new(
        outbound: Arc<dyn OutboundPort>,
        guards: GuardTable,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClanState::default())),
            outbound,
            guards,
            notifier,
        }
    }

    pub fn aggregate(&self) -> Option<ClanAggregate> {
        self.state.lock().expect("lock poisoned").aggregate.clone()
    }

    pub fn local_username(&self) -> Option<Username> {
        self.state.lock().expect("lock poisoned").local_username.clone()
    }

    /// Requests a recruitment setting change. Rejected outside a clan.
    pub fn update_field(&self, update: ClanFieldUpdate) -> Result<ActionOutcome, SyncError> {
        if self.state.lock().expect("lock poisoned").aggregate.is_none() {
            tracing::debug!(target: "clan", key = update.guard_key(), "clan_update_rejected_no_clan");
            return Ok(ActionOutcome::Rejected);
        }
        GuardedRequest::new(update.guard_key()).send(
            &self.guards,
            self.outbound.as_ref(),
            &ClientRecord::UpdateClanField(update),
        )
    }

    pub fn set_recruitment_open(&self, open: bool) -> Result<ActionOutcome, SyncError> {
        self.update_field(ClanFieldUpdate::Recruitment(open))
    }

    pub fn set_min_level(&self, min_level: u32) -> Result<ActionOutcome, SyncError> {
        self.update_field(ClanFieldUpdate::MinLevel(min_level))
    }

    pub fn handle_record(&self, record: &ServerRecord) -> Result<(), SyncError> {
        let outcome = match record {
            ServerRecord::Authenticated(authenticated) => {
                self.set_local_username(&authenticated.username);
                PatchOutcome::Ignored
            }
            ServerRecord::PlayerSnapshot(snapshot) => {
                self.set_local_username(&snapshot.username);
                PatchOutcome::Ignored
            }
            ServerRecord::ClanState(snapshot) => {
                let aggregate = ClanAggregate::from(snapshot.as_ref().clone());
                tracing::info!(
                    target: "clan",
                    name = %aggregate.name,
                    members = aggregate.members.len(),
                    "clan_state_replaced"
                );
                self.state.lock().expect("lock poisoned").aggregate = Some(aggregate);
                PatchOutcome::Applied
            }
            ServerRecord::ClanFieldUpdated(update) => {
                self.guards.release(update.guard_key());
                self.patch("field_updated", |aggregate, _| {
                    apply_field(aggregate, update);
                    Ok(PatchOutcome::Applied)
                })?
            }
            ServerRecord::ClanMemberJoined { member } => {
                self.patch("member_joined", |aggregate, local| {
                    Ok(member_joined(aggregate, member, local))
                })?
            }
            ServerRecord::ClanMemberLeft { username } => {
                self.patch("member_left", |aggregate, local| {
                    Ok(member_left(aggregate, username, local))
                })?
            }
            ServerRecord::ClanLeaderLeft {
                username,
                successor,
            } => self.patch("leader_left", |aggregate, local| {
                leader_left(aggregate, username, successor, local)
            })?,
            ServerRecord::ClanVaultUpdated { vault } => {
                self.patch("vault_updated", |aggregate, _| {
                    replace_vault(aggregate, vault);
                    Ok(PatchOutcome::Applied)
                })?
            }
            ServerRecord::ClanPvmStatsUpdated { stats } => {
                self.patch("pvm_stats_updated", |aggregate, _| {
                    aggregate.pvm_stats = stats.clone();
                    Ok(PatchOutcome::Applied)
                })?
            }
            ServerRecord::ClanApplicationsUpdated { applications } => {
                self.patch("applications_updated", |aggregate, _| {
                    replace_applications(aggregate, applications);
                    Ok(PatchOutcome::Applied)
                })?
            }
            _ => PatchOutcome::Ignored,
        };

        match outcome {
            PatchOutcome::Applied => self.notifier.notify(Notification::ClanChanged),
            PatchOutcome::Discarded => self.notifier.notify(Notification::ClanDiscarded),
            PatchOutcome::Ignored => {}
        }
        Ok(())
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.aggregate = None;
        state.local_username = None;
    }

    pub fn install(&self, registry: &DispatchRegistry) -> Vec<ListenerId> {
        [
            tags::AUTHENTICATED,
            tags::PLAYER_SNAPSHOT,
            tags::CLAN_RECRUITMENT,
            tags::CLAN_CATEGORY,
            tags::CLAN_LANGUAGE,
            tags::CLAN_MESSAGE,
            tags::CLAN_MIN_LEVEL,
            tags::CLAN_TAG,
            tags::CLAN_STATE,
            tags::CLAN_MEMBER_JOINED,
            tags::CLAN_MEMBER_LEFT,
            tags::CLAN_LEADER_LEFT,
            tags::CLAN_VAULT_UPDATED,
            tags::CLAN_PVM_STATS_UPDATED,
            tags::CLAN_APPLICATIONS_UPDATED,
        ]
        .into_iter()
        .map(|tag| {
            let manager = self.clone();
            registry.register_packet(tag, move |record| {
                let result = manager.handle_record(record);
                report_handler_result(manager.notifier.as_ref(), "clan", "clan_record", result);
            })
        })
        .collect()
    }

    fn set_local_username(&self, username: &str) {
        self.state.lock().expect("lock poisoned").local_username = Some(username.to_string());
    }

    /// Runs a partial update against the aggregate. A discard outcome drops
    /// the aggregate; no aggregate means the patch is ignored.
    fn patch(
        &self,
        patch: &'static str,
        apply: impl FnOnce(&mut ClanAggregate, Option<&str>) -> Result<PatchOutcome, SyncError>,
    ) -> Result<PatchOutcome, SyncError> {
        let mut state = self.state.lock().expect("lock poisoned");
        let ClanState {
            aggregate,
            local_username,
        } = &mut *state;
        let Some(current) = aggregate.as_mut() else {
            tracing::debug!(target: "clan", patch = patch, "clan_patch_without_aggregate");
            return Ok(PatchOutcome::Ignored);
        };

        let outcome = apply(current, local_username.as_deref())?;
        if matches!(outcome, PatchOutcome::Discarded) {
            tracing::info!(target: "clan", patch = patch, "clan_aggregate_discarded");
            *aggregate = None;
        }
        Ok(outcome)
    }
}

fn apply_field(aggregate: &mut ClanAggregate, update: &ClanFieldUpdate) {
    let recruitment = &mut aggregate.recruitment;
    match update {
        ClanFieldUpdate::Recruitment(open) => recruitment.open = *open,
        ClanFieldUpdate::Category(category) => recruitment.category = category.clone(),
        ClanFieldUpdate::Language(language) => recruitment.language = language.clone(),
        ClanFieldUpdate::Message(message) => recruitment.message = message.clone(),
        ClanFieldUpdate::MinLevel(min_level) => recruitment.min_level = *min_level,
        ClanFieldUpdate::Tag(clan_tag) => recruitment.clan_tag = clan_tag.clone(),
    }
}

fn is_local(username: &str, local: Option<&str>) -> bool {
    local == Some(username)
}

fn member_joined(
    aggregate: &mut ClanAggregate,
    member: &ClanMember,
    local: Option<&str>,
) -> PatchOutcome {
    if is_local(&member.username, local) {
        return PatchOutcome::Discarded;
    }
    aggregate
        .members
        .insert(member.username.clone(), member.clone());
    PatchOutcome::Applied
}

fn member_left(aggregate: &mut ClanAggregate, username: &str, local: Option<&str>) -> PatchOutcome {
    if is_local(username, local) {
        return PatchOutcome::Discarded;
    }
    if aggregate.members.remove(username).is_none() {
        tracing::debug!(target: "clan", username = username, "departed_member_unknown");
    }
    PatchOutcome::Applied
}

fn leader_left(
    aggregate: &mut ClanAggregate,
    username: &str,
    successor: &str,
    local: Option<&str>,
) -> Result<PatchOutcome, SyncError> {
    if !aggregate.members.contains_key(successor) {
        return Err(desync(format!(
            "leader {username} left but successor {successor} is not a member"
        )));
    }
    if is_local(username, local) {
        return Ok(PatchOutcome::Discarded);
    }

    aggregate.members.remove(username);
    if let Some(member) = aggregate.members.get_mut(successor) {
        member.rank = ClanRank::Leader;
    }
    Ok(PatchOutcome::Applied)
}

fn replace_vault(aggregate: &mut ClanAggregate, vault: &BTreeMap<ItemId, u64>) {
    aggregate.vault = vault.clone();
}

fn replace_applications(aggregate: &mut ClanAggregate, applications: &[ClanApplication]) {
    aggregate.applications = applications.to_vec();
}
