use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::monitor::Monitor;

pub const MSG_TOOL_MISSING: &str = "ddcutil is not installed or not in PATH";
pub const MSG_NO_MONITORS: &str = "No DDC/CI monitors detected";
pub const MSG_DETECTING: &str = "Detecting monitors...";
pub const MSG_DETECTING_INPUTS: &str = "Detecting inputs...";

/// Where detection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuState {
    Detecting,
    ToolMissing,
    ToolError(i32),
    NoMonitors,
    Ready,
}

impl std::fmt::Display for MenuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuState::Detecting => write!(f, "detecting"),
            MenuState::ToolMissing => write!(f, "ddcutil missing"),
            MenuState::ToolError(code) => write!(f, "ddcutil error ({})", code),
            MenuState::NoMonitors => write!(f, "no monitors"),
            MenuState::Ready => write!(f, "ready"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuItem {
    /// Non-reactive monitor title.
    Header { label: String },
    Separator,
    Input { display: u32, code: u16, label: String, active: bool },
    /// Non-reactive line shown while a monitor's inputs are still unknown.
    Placeholder { label: String },
    Message { text: String },
    Refresh,
}

impl MenuItem {
    pub fn is_selectable(&self) -> bool {
        matches!(self, MenuItem::Input { .. } | MenuItem::Refresh)
    }
}

/// Per-monitor presentation overrides, keyed by model name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayPreferences {
    pub label: Option<String>,
    pub hidden_inputs: Vec<u16>,
}

pub fn tool_error_message(code: i32) -> String {
    format!("ddcutil reported an error (exit code {})", code)
}

pub fn build_menu(
    state: MenuState,
    monitors: &[Monitor],
    preferences: &HashMap<String, DisplayPreferences>,
) -> Vec<MenuItem> {
    let mut items = Vec::new();

    let message = match state {
        MenuState::ToolMissing => Some(MSG_TOOL_MISSING.to_string()),
        MenuState::ToolError(code) => Some(tool_error_message(code)),
        MenuState::NoMonitors => Some(MSG_NO_MONITORS.to_string()),
        MenuState::Detecting if monitors.is_empty() => Some(MSG_DETECTING.to_string()),
        MenuState::Detecting | MenuState::Ready => None,
    };

    if let Some(text) = message {
        items.push(MenuItem::Message { text });
        items.push(MenuItem::Refresh);
        return items;
    }

    for (i, monitor) in monitors.iter().enumerate() {
        let prefs = preferences.get(&monitor.name);

        if i != 0 {
            items.push(MenuItem::Separator);
        }
        let label = prefs
            .and_then(|p| p.label.clone())
            .unwrap_or_else(|| monitor.display_name());
        items.push(MenuItem::Header { label });

        if !monitor.initialized {
            items.push(MenuItem::Placeholder { label: MSG_DETECTING_INPUTS.to_string() });
            continue;
        }

        for source in monitor.input_sources() {
            if prefs.is_some_and(|p| p.hidden_inputs.contains(&source.code)) {
                continue;
            }
            items.push(MenuItem::Input {
                display: monitor.number,
                code: source.code,
                label: source.name,
                active: monitor.current_input == Some(source.code),
            });
        }
    }

    items.push(MenuItem::Separator);
    items.push(MenuItem::Refresh);
    items
}

/// The `index`-th selectable entry, counting from 1.
pub fn selectable_entry(items: &[MenuItem], index: usize) -> Option<&MenuItem> {
    if index == 0 {
        return None;
    }
    items.iter().filter(|item| item.is_selectable()).nth(index - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::InputSource;

    fn monitor(number: u32, name: &str, current: Option<u16>) -> Monitor {
        let mut m = Monitor::new(number);
        m.name = name.to_string();
        m.set_inputs(vec![
            InputSource { code: 0x0f, name: "DisplayPort-1".to_string() },
            InputSource { code: 0x11, name: "HDMI-1".to_string() },
        ]);
        m.current_input = current;
        m
    }

    #[test]
    fn test_error_states_replace_menu() {
        let monitors = vec![monitor(1, "DELL U2415", None)];
        let prefs = HashMap::new();

        let items = build_menu(MenuState::ToolMissing, &monitors, &prefs);
        assert_eq!(
            items,
            vec![MenuItem::Message { text: MSG_TOOL_MISSING.to_string() }, MenuItem::Refresh]
        );

        let items = build_menu(MenuState::ToolError(2), &[], &prefs);
        assert_eq!(
            items[0],
            MenuItem::Message { text: "ddcutil reported an error (exit code 2)".to_string() }
        );

        let items = build_menu(MenuState::NoMonitors, &[], &prefs);
        assert_eq!(items[0], MenuItem::Message { text: MSG_NO_MONITORS.to_string() });
    }

    #[test]
    fn test_detecting_without_monitors() {
        let items = build_menu(MenuState::Detecting, &[], &HashMap::new());
        assert_eq!(items[0], MenuItem::Message { text: MSG_DETECTING.to_string() });
    }

    #[test]
    fn test_monitor_sections() {
        let mut pending = Monitor::new(2);
        pending.name = "LG HDR 4K".to_string();
        let monitors = vec![monitor(1, "DELL U2415", Some(0x11)), pending];

        let items = build_menu(MenuState::Detecting, &monitors, &HashMap::new());
        assert_eq!(
            items,
            vec![
                MenuItem::Header { label: "DELL U2415".to_string() },
                MenuItem::Input { display: 1, code: 0x0f, label: "DisplayPort-1".to_string(), active: false },
                MenuItem::Input { display: 1, code: 0x11, label: "HDMI-1".to_string(), active: true },
                MenuItem::Separator,
                MenuItem::Header { label: "LG HDR 4K".to_string() },
                MenuItem::Placeholder { label: MSG_DETECTING_INPUTS.to_string() },
                MenuItem::Separator,
                MenuItem::Refresh,
            ]
        );
    }

    #[test]
    fn test_preferences_rename_and_hide() {
        let monitors = vec![monitor(1, "DELL U2415", None)];
        let mut prefs = HashMap::new();
        prefs.insert(
            "DELL U2415".to_string(),
            DisplayPreferences { label: Some("Desk".to_string()), hidden_inputs: vec![0x0f] },
        );

        let items = build_menu(MenuState::Ready, &monitors, &prefs);
        assert_eq!(items[0], MenuItem::Header { label: "Desk".to_string() });
        let inputs: Vec<_> = items.iter().filter(|i| matches!(i, MenuItem::Input { .. })).collect();
        assert_eq!(inputs.len(), 1);
    }

    #[test]
    fn test_selectable_entry() {
        let monitors = vec![monitor(2, "DELL U2415", None)];
        let items = build_menu(MenuState::Ready, &monitors, &HashMap::new());

        assert_eq!(selectable_entry(&items, 0), None);
        match selectable_entry(&items, 1) {
            Some(MenuItem::Input { display, code, .. }) => {
                assert_eq!(*display, 2);
                assert_eq!(*code, 0x0f);
            }
            other => panic!("Expected input entry, got {:?}", other),
        }
        assert_eq!(selectable_entry(&items, 3), Some(&MenuItem::Refresh));
        assert_eq!(selectable_entry(&items, 4), None);
    }
}
