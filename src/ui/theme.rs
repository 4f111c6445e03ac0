//! Colors for the console.
//!
//! The [`Theme`] itself lives in the configuration file; this module turns
//! its hex strings into ratatui styles.

use crate::config::Theme;
use ratatui::style::{Color, Modifier, Style};

impl Theme {
    /// Returns the foreground color.
    #[must_use]
    pub fn fg(&self) -> Color {
        parse_color(&self.foreground)
    }

    /// Returns the accent color.
    #[must_use]
    pub fn accent(&self) -> Color {
        parse_color(&self.accent)
    }

    /// Row style for a check status.
    #[must_use]
    pub fn severity(&self, status: Option<i64>) -> Style {
        match status {
            Some(0) => Style::default().fg(parse_color(&self.ok)),
            Some(1) => Style::default().fg(parse_color(&self.warning)),
            Some(2) => Style::default()
                .fg(parse_color(&self.critical))
                .add_modifier(Modifier::BOLD),
            Some(_) => Style::default().fg(parse_color(&self.unknown)),
            None => Style::default().fg(self.fg()),
        }
    }

    /// Table header style.
    #[must_use]
    pub fn header(&self) -> Style {
        Style::default().fg(self.accent()).add_modifier(Modifier::BOLD)
    }

    /// Selected row style.
    #[must_use]
    pub fn selected(&self) -> Style {
        Style::default().add_modifier(Modifier::REVERSED)
    }

    /// Error text style.
    #[must_use]
    pub fn error(&self) -> Style {
        Style::default().fg(parse_color(&self.critical))
    }
}

/// Parses a hex color string to a ratatui Color.
fn parse_color(hex: &str) -> Color {
    let hex = hex.trim_start_matches('#');

    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(255)
    };

    if hex.len() != 6 {
        return Color::White;
    }

    Color::Rgb(channel(0..2), channel(2..4), channel(4..6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#FF0000"), Color::Rgb(255, 0, 0));
        assert_eq!(parse_color("#00FF00"), Color::Rgb(0, 255, 0));
        assert_eq!(parse_color("0000FF"), Color::Rgb(0, 0, 255));
    }

    #[test]
    fn test_parse_color_invalid() {
        assert_eq!(parse_color("#FFF"), Color::White);
        assert_eq!(parse_color("#GG0000"), Color::Rgb(255, 0, 0));
    }

    #[test]
    fn test_severity_styles_differ() {
        let theme = Theme::default();

        let ok = theme.severity(Some(0));
        let warn = theme.severity(Some(1));
        let crit = theme.severity(Some(2));
        let other = theme.severity(Some(127));

        assert_ne!(ok.fg, warn.fg);
        assert_ne!(warn.fg, crit.fg);
        assert_ne!(crit.fg, other.fg);
        assert!(crit.add_modifier.contains(Modifier::BOLD));
    }
}
