use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::keybindings::{normalize_chord, KeyBindings, SearchAction};

const PREFERENCES_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to read preferences {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse preferences {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize preferences {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write preferences {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{chord}` is not a usable key chord")]
    InvalidChord { chord: String },
    #[error("`{chord}` is already bound to {action:?}")]
    ChordInUse { chord: String, action: SearchAction },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub search: SearchPreferences,
    #[serde(default)]
    pub keys: KeyBindings,
}

fn default_version() -> u32 {
    PREFERENCES_VERSION
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION,
            search: SearchPreferences::default(),
            keys: KeyBindings::default(),
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        if self.version == 0 {
            self.version = PREFERENCES_VERSION;
        }
        self.keys.sanitize();
    }
}

/// Initial state of the find & replace toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPreferences {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    #[serde(default = "default_true")]
    pub scroll_into_view: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SearchPreferences {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            scroll_into_view: true,
        }
    }
}

/// Search defaults and key bindings backed by a JSON file.
///
/// Every setter validates, writes the whole file and only then keeps the new
/// value, so the in-memory copy never runs ahead of what is on disk.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    data: Preferences,
}

impl PreferencesStore {
    /// Reads `path`; a missing file yields the defaults without creating it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
        let path = path.as_ref().to_path_buf();
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| PreferencesError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents).map_err(|source| PreferencesError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            Preferences::default()
        };
        data.sanitize();
        Ok(Self { path, data })
    }

    pub fn preferences(&self) -> &Preferences {
        &self.data
    }

    /// Toggles a new search session starts from.
    pub fn search_defaults(&self) -> &SearchPreferences {
        &self.data.search
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.data.keys
    }

    /// Replaces the search defaults and persists them.
    pub fn set_search_defaults(&mut self, search: SearchPreferences) -> Result<(), PreferencesError> {
        let mut next = self.data.clone();
        next.search = search;
        self.commit(next)
    }

    /// Binds `chord` to `action` and persists the bindings.
    ///
    /// Fails when the chord has no key or is already bound to another action.
    pub fn bind(&mut self, action: SearchAction, chord: &str) -> Result<(), PreferencesError> {
        let normalized = normalize_chord(chord).ok_or_else(|| PreferencesError::InvalidChord {
            chord: chord.to_string(),
        })?;
        if let Some(existing) = self.data.keys.action_for(&normalized) {
            if existing != action {
                return Err(PreferencesError::ChordInUse {
                    chord: chord.to_string(),
                    action: existing,
                });
            }
        }
        let mut next = self.data.clone();
        *next.keys.chord_mut(action) = chord.trim().to_string();
        self.commit(next)
    }

    fn commit(&mut self, mut next: Preferences) -> Result<(), PreferencesError> {
        next.sanitize();
        write_preferences(&self.path, &next)?;
        self.data = next;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_preferences(path: &Path, data: &Preferences) -> Result<(), PreferencesError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PreferencesError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let payload = serde_json::to_string_pretty(data).map_err(|source| PreferencesError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload.as_bytes()).map_err(|source| PreferencesError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| PreferencesError::Write {
        path: path.to_path_buf(),
        source,
    })
}
