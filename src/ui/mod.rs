//! Terminal console over the aggregation engine.
//!
//! The console is the rendering consumer: it starts loads, drains the
//! orchestrator's updates into one
//! [`SortStableCollection`](crate::collection::SortStableCollection) per tab
//! and draws them with ratatui.

pub mod app;
pub mod input;
pub mod state;
mod theme;

pub use crate::config::Theme;
pub use app::{App, TabStatus};
pub use input::{Action, InputHandler};
pub use state::{View, ViewState};
