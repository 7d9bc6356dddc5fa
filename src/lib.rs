//! invsync library interface
//!
//! Reconciles a periodic CSV export of a physical device inventory against a
//! persisted device registry: whitelisted field updates only, checkout/return
//! lifecycle tracked in an interaction ledger, and an immutable audit
//! snapshot recorded after each run.

pub mod config;
pub mod db;
pub mod error;
pub mod import;

pub use crate::config::{Collections, Config};
pub use crate::db::Store;
pub use crate::error::{Error, Result};
pub use crate::import::{run_import, RunSummary};
