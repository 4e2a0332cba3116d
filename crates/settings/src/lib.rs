pub mod keybindings;
pub mod preferences;

pub use keybindings::{normalize_chord, KeyBindings, SearchAction};
pub use preferences::{Preferences, PreferencesError, PreferencesStore, SearchPreferences};
