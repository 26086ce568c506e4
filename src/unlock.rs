use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::UnlockError;
use crate::models::{Difficulty, Module, ModuleStatus};
use crate::progress::ProgressData;

/// Points needed to open a gated module early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockCosts {
    pub intermediate: u32,
    pub advanced: u32,
}

impl Default for UnlockCosts {
    fn default() -> Self {
        Self {
            intermediate: 800,
            advanced: 1500,
        }
    }
}

impl UnlockCosts {
    /// Beginner and unrecognised tiers are never gated, so they have no price.
    pub fn cost_for(&self, difficulty: Difficulty) -> Option<u32> {
        match difficulty {
            Difficulty::Intermediate => Some(self.intermediate),
            Difficulty::Advanced => Some(self.advanced),
            Difficulty::Beginner | Difficulty::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: String,
    pub difficulty: Difficulty,
    pub status: ModuleStatus,
    pub icon: String,
    pub accent: &'static str,
    pub lesson_count: usize,
    pub progress: u32,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_cost: Option<u32>,
}

impl ModuleView {
    pub fn new(module: &Module, progress: u32) -> Self {
        Self {
            id: module.id.clone(),
            title: module.title.clone(),
            description: module.description.clone(),
            duration: module.duration.clone(),
            difficulty: module.difficulty,
            status: module.status,
            icon: module.icon.clone(),
            accent: module.color.style_token(),
            lesson_count: module.lessons.len(),
            progress,
            locked: false,
            unlock_cost: None,
        }
    }
}

/// Stable sort into gating order, unknown difficulties last.
pub fn sort_by_tier(views: &mut [ModuleView]) {
    views.sort_by_key(|v| v.difficulty.tier());
}

/// Marks modules locked or unlocked. Expects `views` in tier order.
///
/// An Intermediate module needs every Beginner module before it at 100%;
/// an Advanced module needs every Beginner and Intermediate one. Ids in
/// `unlocked_ids` skip the tier rule. Unreleased modules stay locked.
/// Unreleased and lesson-less modules cannot be completed, so they never
/// hold back the tiers after them.
pub fn apply_locks(mut views: Vec<ModuleView>, unlocked_ids: &BTreeSet<String>) -> Vec<ModuleView> {
    let mut beginner_complete = true;
    let mut intermediate_complete = true;

    for view in &mut views {
        let gated = match view.difficulty {
            Difficulty::Intermediate => !beginner_complete,
            Difficulty::Advanced => !beginner_complete || !intermediate_complete,
            Difficulty::Beginner | Difficulty::Unknown => false,
        };
        let released = view.status != ModuleStatus::ComingSoon;
        view.locked = !released || (gated && !unlocked_ids.contains(&view.id));

        let completable = released && view.lesson_count > 0;
        if completable && view.progress < 100 {
            match view.difficulty {
                Difficulty::Beginner => beginner_complete = false,
                Difficulty::Intermediate => intermediate_complete = false,
                Difficulty::Advanced | Difficulty::Unknown => {}
            }
        }
    }
    views
}

/// Dashboard view of every module: ordered by tier, locks applied, and a
/// price attached to modules that can be opened with points.
pub fn module_views(
    modules: &[Module],
    progress: &ProgressData,
    unlocked_ids: &BTreeSet<String>,
    costs: &UnlockCosts,
) -> Vec<ModuleView> {
    let mut views: Vec<ModuleView> = modules
        .iter()
        .map(|m| {
            let pct = progress.module_progress.get(&m.id).copied().unwrap_or(0);
            ModuleView::new(m, pct)
        })
        .collect();
    sort_by_tier(&mut views);

    let mut views = apply_locks(views, unlocked_ids);
    for view in &mut views {
        if view.locked && view.status == ModuleStatus::Available {
            view.unlock_cost = costs.cost_for(view.difficulty);
        }
    }
    views
}

/// Validates an early-unlock request and returns its price.
pub fn unlock_price(view: &ModuleView, costs: &UnlockCosts) -> Result<u32, UnlockError> {
    if view.status == ModuleStatus::ComingSoon {
        return Err(UnlockError::NotPurchasable(view.id.clone()));
    }
    if !view.locked {
        return Err(UnlockError::AlreadyUnlocked(view.id.clone()));
    }
    costs
        .cost_for(view.difficulty)
        .ok_or_else(|| UnlockError::NotPurchasable(view.id.clone()))
}
