//! Trackhound Extension - The extension contract and its lifecycle.
//!
//! An extension is a self-contained scraping unit. This crate defines what an
//! extension must provide, how extensions are found and loaded, and the
//! contexts and event channel through which they talk to the rest of the
//! application.
//!
//! # Architecture
//!
//! - **Module** ([`module`]): The contract: metadata, entry point, optional scan hook
//! - **Loader** ([`loader`]): Turns candidates in a directory into loaded modules
//! - **Recipe** ([`recipe`]): Declarative TOML extensions driven by CSS selectors
//! - **Discovery** ([`discovery`]): Scans, validates and emits [`ExtensionRecord`]s
//! - **Registry** ([`registry`]): Consumer-owned, insertion-ordered record collection
//! - **Events** ([`events`]): One-way channel from workers to the consumer
//! - **Context** ([`context`]): What an extension sees while it runs
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trackhound_extension::{events, Discovery, Event, RecipeLoader};
//!
//! let discovery = Discovery::new(Arc::new(RecipeLoader), "/path/to/extensions");
//! let (sender, mut receiver) = events::channel();
//! discovery.run(&sender);
//!
//! while let Some(event) = receiver.try_recv() {
//!     if let Event::ExtensionDiscovered(record) = event {
//!         println!("found {}", record.name);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod context;
pub mod discovery;
pub mod error;
pub mod events;
pub mod loader;
pub mod module;
pub mod recipe;
pub mod record;
pub mod registry;

// Re-export commonly used types
pub use context::{DiscoveryContext, ScrapeContext};
pub use discovery::Discovery;
pub use error::{ExtensionError, Result};
pub use events::{Event, EventReceiver, EventSender, RunOutcome};
pub use loader::{BuiltinLoader, ChainLoader, ExtensionLoader, RecipeLoader};
pub use module::{
    EntryPoint, ExtensionModule, ModuleHandle, NativeModule, ScanHook, ENTRY_POINT,
    METADATA_MARKER, SCAN_HOOK,
};
pub use recipe::{RecipeModule, ScanRecipe, ScrapeRecipe};
pub use record::ExtensionRecord;
pub use registry::ExtensionRegistry;
