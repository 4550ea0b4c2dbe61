pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ledger;
pub mod progress;
pub mod runner;
