//! Trackhound Application
//!
//! The consumer of the extension core: a [`Controller`] that runs discovery
//! and scrapes in the background one at a time, keeps the registry and the
//! cutoff, and persists them. The `trackhound` binary is a thin CLI over it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod controller;
pub mod error;

pub use controller::{Controller, WorkerKind};
pub use error::{AppError, Result};

/// Initialize the tracing subscriber for the binary.
///
/// Honors `RUST_LOG`; defaults to `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
