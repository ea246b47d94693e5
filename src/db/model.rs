//! The in-memory override ledger and the page merge it drives.
//!
//! Keep this free of SQL: `repo` owns persistence, this owns the merge
//! semantics applied to every catalog page before it is shown.

use std::collections::BTreeMap;

use crate::model::Product;

/// Snapshot of all local overrides: products created locally, edited
/// replacements keyed by product id, and ids deleted locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideLedger {
    pub added: Vec<Product>,
    pub edited: BTreeMap<u64, Product>,
    pub deleted: Vec<u64>,
}

impl OverrideLedger {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.edited.is_empty() && self.deleted.is_empty()
    }

    /// Merge the ledger into one fetched page, in three fixed steps:
    /// drop deleted ids, substitute edited replacements in place, then
    /// append every locally added product at the tail.
    ///
    /// The tail append is unconditional. Additions land on every page no
    /// matter what filter, sort or pagination produced it, and deletion
    /// wins over an edit recorded for the same id.
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        let mut merged: Vec<Product> = products
            .into_iter()
            .filter(|p| !self.deleted.contains(&p.id))
            .map(|p| self.edited.get(&p.id).cloned().unwrap_or(p))
            .collect();
        merged.extend(self.added.iter().cloned());
        merged
    }
}
