//! Inventory toolkit over a remote product catalog: catalog client, local
//! override ledger, page reconciliation, and the query/mutation layer the
//! CLI drives.

pub mod catalog;
pub mod config;
pub mod db;
pub mod filters;
pub mod inventory;
pub mod model;
pub mod validate;
