//! Reward and cost arithmetic for task completions.
//!
//! Every function here is pure over the catalog plus state the managers
//! expose. Rounding differs per call site and is part of the contract:
//! currency costs round half to even, other costs and experience round half
//! away from zero, proc reductions truncate, related-task experience floors.

use std::collections::BTreeMap;

use crate::{
    catalog::{
        GameCatalog, ItemEffect, ItemId, ItemStack, Skill, TaskCategory, TaskDefinition,
        UpgradeBenefit, UpgradeId,
    },
    transport::wire::TaskCompletion,
};

/// Owned state the pipeline reads.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub catalog: &'a dyn GameCatalog,
    pub upgrades: &'a BTreeMap<UpgradeId, u32>,
    pub equipped: &'a [ItemId],
}

/// One cost line after reductions. `amount` may be zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostLine {
    pub item_id: ItemId,
    pub amount: i64,
}

pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

pub fn round_half_away(value: f64) -> i64 {
    value.round() as i64
}

fn upgrade_benefits<'a>(context: PipelineContext<'a>) -> impl Iterator<Item = &'a UpgradeBenefit> {
    let catalog = context.catalog;
    context
        .upgrades
        .iter()
        .filter_map(move |(upgrade_id, tier)| {
            catalog
                .upgrade(*upgrade_id)
                .map(|definition| definition.benefits_at(*tier))
        })
        .flatten()
}

fn equipped_effects<'a>(context: PipelineContext<'a>) -> impl Iterator<Item = &'a ItemEffect> {
    let catalog = context.catalog;
    context
        .equipped
        .iter()
        .filter_map(move |item_id| catalog.item(*item_id))
        .flat_map(|definition| definition.effects.iter())
}

pub fn upgrade_cost_reduction(context: &PipelineContext<'_>, category: TaskCategory) -> f64 {
    upgrade_benefits(*context)
        .filter_map(|benefit| match benefit {
            UpgradeBenefit::CostReduction {
                category: benefit_category,
                percent,
            } if *benefit_category == category => Some(*percent),
            _ => None,
        })
        .sum()
}

/// Reduction from procs the server reported as fired. Only equipped items
/// whose proc matches the task skill count.
pub fn proc_cost_reduction(context: &PipelineContext<'_>, skill: Skill, fired: &[ItemId]) -> f64 {
    fired
        .iter()
        .filter(|item_id| context.equipped.contains(*item_id))
        .filter_map(|item_id| context.catalog.item(*item_id))
        .flat_map(|definition| definition.effects.iter())
        .filter_map(|effect| match effect {
            ItemEffect::CostReductionProc {
                skill: effect_skill,
                percent,
            } if *effect_skill == skill => Some(*percent),
            _ => None,
        })
        .sum()
}

pub fn reduce_cost(
    amount: u64,
    is_currency: bool,
    upgrade_percent: f64,
    proc_percent: f64,
) -> i64 {
    let scaled = amount as f64 * (100.0 - upgrade_percent) / 100.0;
    let reduced = if is_currency {
        round_half_even(scaled)
    } else {
        round_half_away(scaled)
    };
    if proc_percent > 0.0 {
        (reduced as f64 * (100.0 - proc_percent) / 100.0).trunc() as i64
    } else {
        reduced
    }
}

/// Cost lines after upgrade and proc reductions.
pub fn modified_costs(
    context: &PipelineContext<'_>,
    task: &TaskDefinition,
    fired_procs: &[ItemId],
) -> Vec<CostLine> {
    let currency = context.catalog.settings().currency_item_id;
    let upgrade_percent = upgrade_cost_reduction(context, task.category);
    let proc_percent = proc_cost_reduction(context, task.skill, fired_procs);
    task.costs
        .iter()
        .map(|cost| CostLine {
            item_id: cost.item_id,
            amount: reduce_cost(
                cost.amount,
                cost.item_id == currency,
                upgrade_percent,
                proc_percent,
            ),
        })
        .collect()
}

/// Costs used for start and continuation checks: upgrade reductions only.
pub fn standing_costs(context: &PipelineContext<'_>, task: &TaskDefinition) -> Vec<CostLine> {
    modified_costs(context, task, &[])
}

/// The primary reward, redirected to its counterpart when that fired.
pub fn primary_reward(
    context: &PipelineContext<'_>,
    task: &TaskDefinition,
    completion: &TaskCompletion,
) -> ItemStack {
    if !completion.has_counterpart_reward() {
        return task.reward;
    }
    match context
        .catalog
        .item(task.reward.item_id)
        .and_then(|definition| definition.counterpart)
    {
        Some(counterpart) => ItemStack {
            item_id: counterpart,
            amount: task.reward.amount,
        },
        None => {
            tracing::warn!(
                target: "pipeline",
                item_id = task.reward.item_id,
                "counterpart_missing"
            );
            task.reward
        }
    }
}

pub fn upgrade_experience_percent(context: &PipelineContext<'_>, skill: Skill) -> f64 {
    upgrade_benefits(*context)
        .filter_map(|benefit| match benefit {
            UpgradeBenefit::ExperienceBoost {
                skill: benefit_skill,
                percent,
            } if *benefit_skill == skill => Some(*percent),
            _ => None,
        })
        .sum()
}

pub fn passive_experience_percent(context: &PipelineContext<'_>, skill: Skill) -> f64 {
    equipped_effects(*context)
        .filter_map(|effect| match effect {
            ItemEffect::ExperienceBoost {
                skill: effect_skill,
                percent,
            } if *effect_skill == skill => Some(*percent),
            _ => None,
        })
        .sum()
}

pub fn consumable_experience_percent(
    context: &PipelineContext<'_>,
    consumable_id: Option<ItemId>,
) -> f64 {
    consumable_id
        .and_then(|item_id| context.catalog.item(item_id))
        .map(|definition| {
            definition
                .effects
                .iter()
                .filter_map(|effect| match effect {
                    ItemEffect::ConsumableExperienceBoost { percent } => Some(*percent),
                    _ => None,
                })
                .sum::<f64>()
        })
        .unwrap_or(0.0)
}

fn owns_harvest_boost(context: &PipelineContext<'_>) -> bool {
    context
        .catalog
        .settings()
        .harvest_boost_upgrade
        .is_some_and(|upgrade_id| context.upgrades.get(&upgrade_id).is_some_and(|tier| *tier > 0))
}

/// Experience for the completed task itself.
pub fn completion_experience(
    context: &PipelineContext<'_>,
    task: &TaskDefinition,
    completion: &TaskCompletion,
) -> u64 {
    let settings = context.catalog.settings();
    let mut percent = upgrade_experience_percent(context, task.skill)
        + passive_experience_percent(context, task.skill)
        + consumable_experience_percent(context, completion.consumable_id);
    if completion.chained_bonus().is_some() {
        percent += settings.chained_bonus_experience_percent;
    }

    let mut experience = task.experience * (1.0 + percent / 100.0);
    if task.category.has_gated_flat_boost() && owns_harvest_boost(context) {
        experience += settings.harvest_flat_experience;
    }
    round_half_away(experience).max(0) as u64
}

/// Experience for a chained related task: passive boosts only, floored.
pub fn related_experience(context: &PipelineContext<'_>, related: &TaskDefinition) -> u64 {
    let percent = passive_experience_percent(context, related.skill);
    (related.experience * (1.0 + percent / 100.0)).floor().max(0.0) as u64
}
