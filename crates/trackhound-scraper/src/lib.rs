//! Trackhound Scraper - Runs enabled extensions one after another.
//!
//! The [`ScrapeOrchestrator`] walks a snapshot of extension records, invokes
//! the entry point of every enabled one, and isolates their failures so one
//! broken extension never ends a run.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod orchestrator;

pub use error::ScrapeError;
pub use orchestrator::{ExtensionRunResult, RunSummary, ScrapeOrchestrator};
pub use tokio_util::sync::CancellationToken;
