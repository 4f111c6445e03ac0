//! Input handling for the console.

use super::state::View;
use crate::resource::ResourceKind;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Input action resulting from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Quit the application.
    Quit,
    /// Previous row.
    Up,
    /// Next row.
    Down,
    /// First row.
    Top,
    /// Last row.
    Bottom,
    /// Open the detail pane for the selected row.
    Select,
    /// Close the detail pane.
    Back,
    /// Switch tab.
    Show(View),
    /// Reload every resource kind now.
    Refresh,
    /// Re-read the configuration file and swap in its connections.
    ReloadConfig,
    /// Widen the table side of the split.
    GrowSplit,
    /// Narrow the table side of the split.
    ShrinkSplit,
    /// Sort by column (0-based).
    Sort(usize),
    /// Return to the default order.
    ClearSort,
    /// No action.
    None,
}

/// Input handler with configurable vim keys.
#[derive(Debug, Clone)]
pub struct InputHandler {
    /// Enable vim-style navigation. Only `j` is mapped: `k` opens the
    /// checks tab.
    pub vim_keys: bool,
}

impl InputHandler {
    /// Creates a new input handler.
    #[must_use]
    pub fn new(vim_keys: bool) -> Self {
        Self { vim_keys }
    }

    /// Handles a key event and returns the corresponding action.
    #[must_use]
    pub fn handle_key(&self, event: KeyEvent) -> Action {
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            return match event.code {
                KeyCode::Char('c') => Action::Quit,
                _ => Action::None,
            };
        }

        match event.code {
            KeyCode::Char('q') => Action::Quit,

            KeyCode::Up => Action::Up,
            KeyCode::Down => Action::Down,
            KeyCode::Home => Action::Top,
            KeyCode::End => Action::Bottom,
            KeyCode::Char('j') if self.vim_keys => Action::Down,
            KeyCode::Char('g') if self.vim_keys => Action::Top,
            KeyCode::Char('G') if self.vim_keys => Action::Bottom,

            KeyCode::Enter => Action::Select,
            KeyCode::Esc => Action::Back,

            KeyCode::Char('e') => Action::Show(View::Resources(ResourceKind::Event)),
            KeyCode::Char('n') => Action::Show(View::Resources(ResourceKind::Entity)),
            KeyCode::Char('s') => Action::Show(View::Resources(ResourceKind::Silence)),
            KeyCode::Char('k') => Action::Show(View::Resources(ResourceKind::Check)),
            KeyCode::Char('c') => Action::Show(View::Connections),

            KeyCode::Char('r') | KeyCode::F(5) => Action::Refresh,
            KeyCode::Char('R') => Action::ReloadConfig,

            KeyCode::Char('[') => Action::ShrinkSplit,
            KeyCode::Char(']') => Action::GrowSplit,

            KeyCode::Char('0') => Action::ClearSort,
            KeyCode::Char(c @ '1'..='9') => c
                .to_digit(10)
                .map_or(Action::None, |d| Action::Sort(d as usize - 1)),

            _ => Action::None,
        }
    }
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::empty())
    }

    fn key_event_ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    #[test]
    fn test_quit_actions() {
        let handler = InputHandler::new(true);

        assert_eq!(handler.handle_key(key_event(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(handler.handle_key(key_event_ctrl(KeyCode::Char('c'))), Action::Quit);
    }

    #[test]
    fn test_esc_closes_detail_instead_of_quitting() {
        let handler = InputHandler::new(true);
        assert_eq!(handler.handle_key(key_event(KeyCode::Esc)), Action::Back);
    }

    #[test]
    fn test_tab_keys() {
        let handler = InputHandler::new(true);

        assert_eq!(
            handler.handle_key(key_event(KeyCode::Char('n'))),
            Action::Show(View::Resources(ResourceKind::Entity))
        );
        assert_eq!(
            handler.handle_key(key_event(KeyCode::Char('k'))),
            Action::Show(View::Resources(ResourceKind::Check))
        );
        assert_eq!(
            handler.handle_key(key_event(KeyCode::Char('c'))),
            Action::Show(View::Connections)
        );
    }

    #[test]
    fn test_vim_keys() {
        let enabled = InputHandler::new(true);
        let disabled = InputHandler::new(false);

        assert_eq!(enabled.handle_key(key_event(KeyCode::Char('j'))), Action::Down);
        assert_eq!(disabled.handle_key(key_event(KeyCode::Char('j'))), Action::None);
        assert_eq!(disabled.handle_key(key_event(KeyCode::Down)), Action::Down);
    }

    #[test]
    fn test_sort_keys() {
        let handler = InputHandler::new(true);

        assert_eq!(handler.handle_key(key_event(KeyCode::Char('1'))), Action::Sort(0));
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('9'))), Action::Sort(8));
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('0'))), Action::ClearSort);
    }

    #[test]
    fn test_refresh_and_reload_config_keys() {
        let handler = InputHandler::new(true);

        assert_eq!(handler.handle_key(key_event(KeyCode::Char('r'))), Action::Refresh);
        assert_eq!(handler.handle_key(key_event(KeyCode::F(5))), Action::Refresh);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('R'))), Action::ReloadConfig);
    }

    #[test]
    fn test_split_keys() {
        let handler = InputHandler::new(true);

        assert_eq!(handler.handle_key(key_event(KeyCode::Char('['))), Action::ShrinkSplit);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char(']'))), Action::GrowSplit);
    }

    #[test]
    fn test_unknown_ctrl_key_is_ignored() {
        let handler = InputHandler::new(true);
        assert_eq!(handler.handle_key(key_event_ctrl(KeyCode::Char('e'))), Action::None);
    }
}
