//! Keybinding configuration for the TUI.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::Deserialize;

use crate::tui::event::Action;

/// Configuration for all keybindings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeybindingConfig {
    pub quit: Vec<String>,
    pub next_chapter: Vec<String>,
    pub prev_chapter: Vec<String>,
    pub scroll_down: Vec<String>,
    pub scroll_up: Vec<String>,
    pub page_down: Vec<String>,
    pub page_up: Vec<String>,
    pub search: Vec<String>,
    pub versions: Vec<String>,
    pub stats: Vec<String>,
    pub retry: Vec<String>,
    pub set_default_version: Vec<String>,
    pub select: Vec<String>,
    pub cancel: Vec<String>,
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for KeybindingConfig {
    fn default() -> Self {
        Self {
            quit: keys(&["q", "Ctrl+c"]),
            next_chapter: keys(&["n", "Right"]),
            prev_chapter: keys(&["p", "Left"]),
            scroll_down: keys(&["j", "Down"]),
            scroll_up: keys(&["k", "Up"]),
            page_down: keys(&["PageDown", "Space"]),
            page_up: keys(&["PageUp"]),
            search: keys(&["/"]),
            versions: keys(&["v"]),
            stats: keys(&["s"]),
            retry: keys(&["r"]),
            set_default_version: keys(&["d"]),
            select: keys(&["Enter"]),
            cancel: keys(&["Esc"]),
        }
    }
}

impl KeybindingConfig {
    /// Get the action for a key event. Earlier entries win on conflicts.
    pub fn get_action(&self, key: &KeyEvent) -> Action {
        let table: [(&Vec<String>, Action); 14] = [
            (&self.quit, Action::Quit),
            (&self.cancel, Action::Cancel),
            (&self.select, Action::Select),
            (&self.next_chapter, Action::NextChapter),
            (&self.prev_chapter, Action::PrevChapter),
            (&self.scroll_down, Action::ScrollDown),
            (&self.scroll_up, Action::ScrollUp),
            (&self.page_down, Action::PageDown),
            (&self.page_up, Action::PageUp),
            (&self.search, Action::Search),
            (&self.versions, Action::Versions),
            (&self.stats, Action::Stats),
            (&self.retry, Action::Retry),
            (&self.set_default_version, Action::SetDefaultVersion),
        ];

        table
            .iter()
            .find(|(bindings, _)| matches_any(key, bindings))
            .map(|(_, action)| *action)
            .unwrap_or(Action::None)
    }
}

fn matches_any(key: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|s| match parse_key_string(s) {
        Ok(binding) => binding.matches(key),
        Err(e) => {
            tracing::warn!("Ignoring keybinding {:?}: {}", s, e);
            false
        }
    })
}

/// A parsed key binding with code and modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    /// Check if this binding matches a key event. Shift is ignored for
    /// character keys since it is already reflected in the character.
    pub fn matches(&self, key: &KeyEvent) -> bool {
        self.code == key.code
            && (self.modifiers == key.modifiers
                || self.modifiers == (key.modifiers & !KeyModifiers::SHIFT))
    }
}

/// Parse strings like `"j"`, `"PageDown"`, `"Ctrl+c"` or `"Shift+Tab"`.
pub fn parse_key_string(s: &str) -> Result<KeyBinding, String> {
    let s = s.trim();
    // A lone "+" is a key, not a separator.
    let (modifier_parts, key_part) = match s.rsplit_once('+') {
        Some((mods, key)) if !mods.is_empty() && !key.is_empty() => (Some(mods), key),
        _ => (None, s),
    };

    let mut modifiers = KeyModifiers::NONE;
    for part in modifier_parts.into_iter().flat_map(|m| m.split('+')) {
        modifiers |= match part.to_lowercase().as_str() {
            "ctrl" | "control" => KeyModifiers::CONTROL,
            "shift" => KeyModifiers::SHIFT,
            "alt" => KeyModifiers::ALT,
            _ => return Err(format!("Unknown modifier: {}", part)),
        };
    }

    Ok(KeyBinding {
        code: parse_key_code(key_part)?,
        modifiers,
    })
}

fn parse_key_code(s: &str) -> Result<KeyCode, String> {
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(KeyCode::Char(c));
    }

    let lower = s.to_lowercase();
    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=12).contains(&n) {
            return Ok(KeyCode::F(n));
        }
    }

    match lower.as_str() {
        "enter" | "return" => Ok(KeyCode::Enter),
        "tab" => Ok(KeyCode::Tab),
        "backtab" => Ok(KeyCode::BackTab),
        "backspace" | "bs" => Ok(KeyCode::Backspace),
        "delete" | "del" => Ok(KeyCode::Delete),
        "home" => Ok(KeyCode::Home),
        "end" => Ok(KeyCode::End),
        "pageup" | "pgup" => Ok(KeyCode::PageUp),
        "pagedown" | "pgdn" => Ok(KeyCode::PageDown),
        "up" => Ok(KeyCode::Up),
        "down" => Ok(KeyCode::Down),
        "left" => Ok(KeyCode::Left),
        "right" => Ok(KeyCode::Right),
        "esc" | "escape" => Ok(KeyCode::Esc),
        "space" => Ok(KeyCode::Char(' ')),
        _ => Err(format!("Unknown key: {}", s)),
    }
}
