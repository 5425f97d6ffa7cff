//! cliclack theme
//!
//! Prompts and spinners share the task marker printed before each task in
//! `rigger run`, so interactive output reads as one stream.

use cliclack::ThemeState;
use console::{Emoji, Style};

/// Marker for the active step and for task headers
pub const TASK_MARKER: Emoji<'static, 'static> = Emoji("▸", ">");

const SPINNER: Emoji<'static, 'static> = Emoji("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏", "-\\|/");

#[derive(Debug, Clone, Default)]
pub struct RiggerTheme;

impl cliclack::Theme for RiggerTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().magenta(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().magenta().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().magenta().bold(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green(),
        }
    }

    fn state_symbol(&self, state: &ThemeState) -> String {
        let color = self.state_symbol_color(state);
        match state {
            ThemeState::Active => color.apply_to(TASK_MARKER).to_string(),
            ThemeState::Submit => color.apply_to(Emoji("✓", "+")).to_string(),
            ThemeState::Cancel => color.apply_to(Emoji("■", "x")).to_string(),
            ThemeState::Error(_) => color.apply_to(Emoji("✗", "x")).to_string(),
        }
    }

    fn active_symbol(&self) -> String {
        Style::new().magenta().bold().apply_to(TASK_MARKER).to_string()
    }

    fn spinner_chars(&self) -> String {
        SPINNER.to_string()
    }
}

pub fn init_theme() {
    cliclack::set_theme(RiggerTheme);
}
