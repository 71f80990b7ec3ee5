//! Core domain types and logic.

pub mod audit;
pub mod calendar;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod portfolio;
pub mod position;
pub mod recovery;
pub mod reset;
pub mod retry;
pub mod schedule;
