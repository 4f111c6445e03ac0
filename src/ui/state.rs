//! View state for the console.

use crate::resource::ResourceKind;
use std::collections::HashMap;

/// Smallest table share of the split, in percent.
pub const MIN_SPLIT: u16 = 10;
/// Largest table share of the split, in percent.
pub const MAX_SPLIT: u16 = 90;
/// Resize step, in percent.
pub const SPLIT_STEP: u16 = 5;

/// A console tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Aggregated resources of one kind.
    Resources(ResourceKind),
    /// Configured connections.
    Connections,
}

impl View {
    /// Tabs in display order.
    pub const ALL: [View; 5] = [
        Self::Resources(ResourceKind::Event),
        Self::Resources(ResourceKind::Entity),
        Self::Resources(ResourceKind::Silence),
        Self::Resources(ResourceKind::Check),
        Self::Connections,
    ];

    /// Tab title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Resources(kind) => kind.title(),
            Self::Connections => "Connections",
        }
    }

    /// Position in [`View::ALL`].
    #[must_use]
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    /// The resource kind, if this is a resource tab.
    #[must_use]
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Resources(kind) => Some(*kind),
            Self::Connections => None,
        }
    }
}

/// Mutable UI state.
#[derive(Debug)]
pub struct ViewState {
    /// Whether the application should quit.
    pub should_quit: bool,
    /// Active tab.
    pub view: View,
    /// Whether the detail pane is open.
    pub show_detail: bool,
    /// Table share of the screen when the detail pane is open, in percent.
    pub split: u16,
    selected: HashMap<View, usize>,
}

impl ViewState {
    /// Creates a state showing the events tab.
    #[must_use]
    pub fn new() -> Self {
        Self {
            should_quit: false,
            view: View::Resources(ResourceKind::Event),
            show_detail: false,
            split: 60,
            selected: HashMap::new(),
        }
    }

    /// Signals that the application should quit.
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Switches tab; the row selection of each tab is remembered.
    pub fn select_view(&mut self, view: View) {
        self.view = view;
    }

    /// Selected row of the active tab.
    #[must_use]
    pub fn selected(&self) -> usize {
        self.selected.get(&self.view).copied().unwrap_or(0)
    }

    /// Selects the next row, wrapping around.
    pub fn next_row(&mut self, len: usize) {
        if len > 0 {
            let next = (self.selected() + 1) % len;
            self.selected.insert(self.view, next);
        }
    }

    /// Selects the previous row, wrapping around.
    pub fn prev_row(&mut self, len: usize) {
        if len > 0 {
            let prev = self.selected().checked_sub(1).unwrap_or(len - 1);
            self.selected.insert(self.view, prev.min(len - 1));
        }
    }

    /// Selects the first row.
    pub fn first_row(&mut self) {
        self.selected.insert(self.view, 0);
    }

    /// Selects the last row.
    pub fn last_row(&mut self, len: usize) {
        self.selected.insert(self.view, len.saturating_sub(1));
    }

    /// Keeps the selection inside a table that may have shrunk.
    pub fn clamp(&mut self, view: View, len: usize) {
        if let Some(sel) = self.selected.get_mut(&view) {
            *sel = (*sel).min(len.saturating_sub(1));
        }
    }

    /// Widens the table side of the split.
    pub fn grow_split(&mut self) {
        self.split = (self.split + SPLIT_STEP).min(MAX_SPLIT);
    }

    /// Narrows the table side of the split.
    pub fn shrink_split(&mut self) {
        self.split = self.split.saturating_sub(SPLIT_STEP).max(MIN_SPLIT);
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_new() {
        let state = ViewState::new();
        assert!(!state.should_quit);
        assert_eq!(state.view, View::Resources(ResourceKind::Event));
        assert_eq!(state.selected(), 0);
    }

    #[test]
    fn test_row_navigation_wraps() {
        let mut state = ViewState::new();

        state.prev_row(3);
        assert_eq!(state.selected(), 2);
        state.next_row(3);
        assert_eq!(state.selected(), 0);

        state.next_row(0);
        assert_eq!(state.selected(), 0);
    }

    #[test]
    fn test_selection_is_per_view() {
        let mut state = ViewState::new();
        state.last_row(10);
        state.select_view(View::Connections);
        assert_eq!(state.selected(), 0);
        state.select_view(View::Resources(ResourceKind::Event));
        assert_eq!(state.selected(), 9);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut state = ViewState::new();
        state.last_row(10);
        state.clamp(state.view, 4);
        assert_eq!(state.selected(), 3);
    }

    #[test]
    fn test_split_bounds() {
        let mut state = ViewState::new();
        for _ in 0..50 {
            state.grow_split();
        }
        assert_eq!(state.split, MAX_SPLIT);
        for _ in 0..50 {
            state.shrink_split();
        }
        assert_eq!(state.split, MIN_SPLIT);
    }

    #[test]
    fn test_view_order() {
        assert_eq!(View::ALL[0].title(), "Events");
        assert_eq!(View::Connections.index(), 4);
        assert_eq!(View::Connections.kind(), None);
    }
}
