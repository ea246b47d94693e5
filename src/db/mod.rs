//! Storage module: SQLite pool plumbing and the override ledger.
//!
//! Split in two:
//! - `model`: the in-memory ledger and the page merge it drives.
//! - `repo`: pool setup, migrations, and the keyed JSON slots the ledger
//!   persists in.
//!
//! Callers import from `stockroom::db` — the repository API and the ledger
//! type are re-exported here.

pub mod model;
pub mod repo;

pub use model::OverrideLedger;
pub use repo::*;
