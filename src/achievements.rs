//! Achievement, milestone and level evaluation.
//!
//! `evaluate` is a pure function over a ledger snapshot; granting (the
//! mutation) happens in the engine via the store. Conditions are a closed
//! enum matched exhaustively, so the catalog is statically checkable.

use std::collections::BTreeMap;

use crate::catalog::{Achievement, Catalog, Condition};

/// The slice of ledger state achievement conditions can see.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    pub streak: u32,
    pub total_completed: u32,
    pub category_counts: BTreeMap<String, u32>,
    pub earned: Vec<String>,
}

impl LedgerSnapshot {
    fn matches(&self, condition: &Condition) -> bool {
        match condition {
            Condition::StreakAtLeast { n } => self.streak >= *n,
            Condition::TotalAtLeast { n } => self.total_completed >= *n,
            Condition::DistinctCategoriesAtLeast { n } => self.category_counts.len() as u32 >= *n,
            Condition::CategoryCountAtLeast { category, n } => {
                self.category_counts.get(category).copied().unwrap_or(0) >= *n
            }
        }
    }
}

/// Achievements newly earned by this snapshot, in catalog order. Conditions
/// are independent of each other, so ordering never changes the outcome;
/// already-earned ids are skipped, so a second call after granting returns
/// nothing.
pub fn evaluate<'a>(catalog: &'a Catalog, snapshot: &LedgerSnapshot) -> Vec<&'a Achievement> {
    catalog
        .achievements
        .iter()
        .filter(|a| !snapshot.earned.iter().any(|e| e == &a.id))
        .filter(|a| snapshot.matches(&a.condition))
        .collect()
}

/// Celebratory messages for exact streak/total values. Read-only; purely a
/// presentation hook.
pub fn milestones(catalog: &Catalog, streak: u32, total: u32) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(m) = catalog.streak_milestones.iter().find(|m| m.value == streak) {
        out.push(m.message.clone());
    }
    if let Some(m) = catalog.total_milestones.iter().find(|m| m.value == total) {
        out.push(m.message.clone());
    }
    out
}

/// Highest level whose threshold is at or below `total`.
pub fn level_for(catalog: &Catalog, total: u32) -> &str {
    catalog
        .levels
        .iter()
        .filter(|l| total >= l.threshold)
        .max_by_key(|l| l.threshold)
        .map(|l| l.name.as_str())
        .unwrap_or("")
}
