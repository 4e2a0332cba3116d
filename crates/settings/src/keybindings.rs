use serde::{Deserialize, Serialize};

/// Actions of the find & replace surface that can be bound to a key chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAction {
    Next,
    Previous,
    Replace,
    ReplaceAll,
    Close,
}

const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "meta"];

/// Key chords bound to each search action, e.g. `"Ctrl+Shift+H"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_next")]
    pub next: String,
    #[serde(default = "default_previous")]
    pub previous: String,
    #[serde(default = "default_replace")]
    pub replace: String,
    #[serde(default = "default_replace_all")]
    pub replace_all: String,
    #[serde(default = "default_close")]
    pub close: String,
}

fn default_next() -> String {
    "Enter".to_string()
}

fn default_previous() -> String {
    "Shift+Enter".to_string()
}

fn default_replace() -> String {
    "Ctrl+H".to_string()
}

fn default_replace_all() -> String {
    "Ctrl+Shift+H".to_string()
}

fn default_close() -> String {
    "Escape".to_string()
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            next: default_next(),
            previous: default_previous(),
            replace: default_replace(),
            replace_all: default_replace_all(),
            close: default_close(),
        }
    }
}

impl KeyBindings {
    /// Resolves a chord to its action; modifier order and letter case are ignored.
    pub fn action_for(&self, chord: &str) -> Option<SearchAction> {
        let wanted = normalize_chord(chord)?;
        self.entries()
            .into_iter()
            .find(|(binding, _)| normalize_chord(binding).as_deref() == Some(wanted.as_str()))
            .map(|(_, action)| action)
    }

    /// Chord bound to `action`.
    pub fn chord_for(&self, action: SearchAction) -> &str {
        match action {
            SearchAction::Next => &self.next,
            SearchAction::Previous => &self.previous,
            SearchAction::Replace => &self.replace,
            SearchAction::ReplaceAll => &self.replace_all,
            SearchAction::Close => &self.close,
        }
    }

    pub(crate) fn chord_mut(&mut self, action: SearchAction) -> &mut String {
        match action {
            SearchAction::Next => &mut self.next,
            SearchAction::Previous => &mut self.previous,
            SearchAction::Replace => &mut self.replace,
            SearchAction::ReplaceAll => &mut self.replace_all,
            SearchAction::Close => &mut self.close,
        }
    }

    pub(crate) fn sanitize(&mut self) {
        let defaults = KeyBindings::default();
        if normalize_chord(&self.next).is_none() {
            self.next = defaults.next;
        }
        if normalize_chord(&self.previous).is_none() {
            self.previous = defaults.previous;
        }
        if normalize_chord(&self.replace).is_none() {
            self.replace = defaults.replace;
        }
        if normalize_chord(&self.replace_all).is_none() {
            self.replace_all = defaults.replace_all;
        }
        if normalize_chord(&self.close).is_none() {
            self.close = defaults.close;
        }
    }

    fn entries(&self) -> [(&str, SearchAction); 5] {
        [
            (self.next.as_str(), SearchAction::Next),
            (self.previous.as_str(), SearchAction::Previous),
            (self.replace.as_str(), SearchAction::Replace),
            (self.replace_all.as_str(), SearchAction::ReplaceAll),
            (self.close.as_str(), SearchAction::Close),
        ]
    }
}

/// Canonical `ctrl+alt+shift+meta+key` form, lowercase. `None` for empty or key-less chords.
pub fn normalize_chord(chord: &str) -> Option<String> {
    let mut modifiers = Vec::new();
    let mut key: Option<String> = None;
    for part in chord.split('+').map(str::trim).filter(|part| !part.is_empty()) {
        let lowered = part.to_lowercase();
        let modifier = match lowered.as_str() {
            "ctrl" | "control" => Some("ctrl"),
            "alt" | "option" => Some("alt"),
            "shift" => Some("shift"),
            "meta" | "cmd" | "command" | "super" => Some("meta"),
            _ => None,
        };
        match modifier {
            Some(name) => {
                if !modifiers.contains(&name) {
                    modifiers.push(name);
                }
            }
            None => {
                if key.is_some() {
                    return None;
                }
                key = Some(lowered);
            }
        }
    }
    let key = key?;
    modifiers.sort_by_key(|name| MODIFIER_ORDER.iter().position(|known| known == name));
    let mut parts: Vec<&str> = modifiers;
    parts.push(key.as_str());
    Some(parts.join("+"))
}
