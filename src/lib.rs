//! # Basil
//!
//! Operator console over several Sensu monitoring backends.
//!
//! The heart of the crate is a concurrent multi-endpoint aggregation
//! engine: one logical query fans out to every configured backend, the
//! answers are merged under partial failure and timeouts, progress is
//! flushed in debounced batches, and the display order survives repeated
//! reloads.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use basil::prelude::*;
//!
//! let set = Arc::new(ConnectionSet::build(&config.connections)?);
//! let (orchestrator, mut updates) = Orchestrator::spawn(client, Duration::from_millis(150));
//!
//! orchestrator.load(ResourceKind::Event, set, Duration::from_secs(8))?;
//! while let Some(update) = updates.recv().await {
//!     events.reload(update.aggregate.into_resources(), &PreprocessParams::default());
//!     if update.is_final() {
//!         break;
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `tui` (default): ratatui/crossterm console and the `basil` binary

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
// Allow unwrap() in tests only - banned in production code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Core Modules
// ============================================================================

/// Error types.
pub mod error;

/// Configuration file.
pub mod config;

/// Tracing subscriber setup.
pub mod logging;

/// Resource kinds and records.
pub mod resource;

/// Connections and the immutable connection set.
pub mod connection;

/// Application context with copy-on-write reconfiguration.
pub mod context;

/// The remote resource client seam.
pub mod client;

/// Single-connection fetches.
pub mod fetcher;

/// Merged results and signals.
pub mod aggregate;

/// The aggregation state machine.
pub mod orchestrator;

/// Sort-stable display collections.
pub mod collection;

// ============================================================================
// Console
// ============================================================================

/// Terminal console (requires `tui` feature).
#[cfg(feature = "tui")]
#[cfg_attr(docsrs, doc(cfg(feature = "tui")))]
pub mod ui;

// ============================================================================
// Prelude
// ============================================================================

/// Convenient re-exports for common usage.
///
/// ```rust
/// use basil::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{
        Aggregate, AggregateUpdate, DegradedSignal, FetchOutcome, Generation, Stage,
        TotalFailureSignal,
    };
    pub use crate::client::{DemoBehaviour, DemoClient, ResourceClient};
    pub use crate::collection::{PreprocessParams, SortDirection, SortStableCollection, SortState};
    pub use crate::config::{Config, ConnectionEntry};
    pub use crate::connection::{Connection, ConnectionSet};
    pub use crate::context::AppContext;
    pub use crate::error::{BasilError, ConfigError, FetchError, Result};
    pub use crate::fetcher::Fetcher;
    pub use crate::orchestrator::Orchestrator;
    pub use crate::resource::{Resource, ResourceKind};
}
