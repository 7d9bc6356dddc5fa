//! Inventory import pipeline
//!
//! CSV rows → row normalizer → change classifier → registry/ledger writes,
//! driven by the run orchestrator which records one snapshot per run.

pub mod classify;
pub mod lifecycle;
pub mod row;
pub mod run;
pub mod source;

pub use row::CsvRecord;
pub use run::{run_import, RunSummary};
