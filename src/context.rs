use crate::battle::{simulate_with_policy, BattleOptions, BattleResult, Scenario};
use crate::error::{Error, Result};
use crate::format::{EligibilityFilter, Format};
use crate::model::Dataset;
use crate::policy::{ActionPolicy, StandardPolicy};
use crate::profile::{CombatProfile, CombatantSpec, ProfileCache};
use crate::ranking::{rank, RankOptions, RankingReport};
use std::sync::Arc;
use tracing::info;

/// Dataset snapshot plus the profile cache built from it.
///
/// Runs borrow the context immutably, so the cache can only be flushed or
/// the dataset swapped between runs.
#[derive(Debug)]
pub struct Context {
    dataset: Arc<Dataset>,
    cache: ProfileCache,
}

impl Context {
    pub fn new(dataset: Dataset) -> Self {
        Self::from_shared(Arc::new(dataset))
    }

    pub fn from_shared(dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            cache: ProfileCache::new(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn cache(&self) -> &ProfileCache {
        &self.cache
    }

    /// Replaces the dataset and drops every cached profile.
    pub fn reload(&mut self, dataset: Dataset) {
        self.dataset = Arc::new(dataset);
        self.flush_cache();
    }

    pub fn flush_cache(&mut self) {
        let dropped = self.cache.len();
        self.cache.flush();
        info!(dropped, "profile cache flushed");
    }

    pub fn resolve(&self, spec: &CombatantSpec, cp_cap: Option<u32>) -> Result<Arc<CombatProfile>> {
        self.cache.get_or_resolve(&self.dataset, spec, cp_cap)
    }

    pub fn format(&self, format_id: &str) -> Result<&Format> {
        self.dataset
            .format(format_id)
            .ok_or_else(|| Error::config(format!("unknown format '{format_id}'")))
    }

    /// Battle options seeded from the dataset's damage bonus.
    pub fn battle_options(&self) -> BattleOptions {
        BattleOptions {
            damage_bonus: self.dataset.settings().damage_bonus,
            ..BattleOptions::default()
        }
    }

    pub fn simulate(
        &self,
        a: &CombatantSpec,
        b: &CombatantSpec,
        scenario: &Scenario,
        cp_cap: Option<u32>,
    ) -> Result<BattleResult> {
        self.simulate_with(a, b, scenario, cp_cap, &self.battle_options(), &StandardPolicy::default())
    }

    pub fn simulate_with(
        &self,
        a: &CombatantSpec,
        b: &CombatantSpec,
        scenario: &Scenario,
        cp_cap: Option<u32>,
        options: &BattleOptions,
        policy: &dyn ActionPolicy,
    ) -> Result<BattleResult> {
        let a = self.resolve(a, cp_cap)?;
        let b = self.resolve(b, cp_cap)?;
        simulate_with_policy(&a, &b, scenario, options, policy)
    }

    pub fn rank(
        &self,
        format: &Format,
        filter: &dyn EligibilityFilter,
        options: &RankOptions,
    ) -> Result<RankingReport> {
        rank(&self.dataset, &self.cache, format, filter, options)
    }
}
