#![doc = "mr-ledger: contribution-credit reports from GitLab merge-request activity."]

//! The core pipeline fetches merge requests per repository, filters them to a
//! date window and classification, optionally re-derives line counts while
//! excluding test files, and aggregates credited line counts per repository,
//! per contributor and overall, with cooperative cancellation throughout.
//!
//! Entry point: [`report::ReportRun`]. External collaborators are the traits
//! in [`contract`]; production implementations live in [`fetch`], [`store`]
//! and [`history`].

pub mod aggregate;
pub mod cancel;
pub mod cli;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod history;
pub mod load_config;
pub mod model;
pub mod report;
pub mod store;
