use letterpad_settings::{PreferencesError, PreferencesStore, SearchAction, SearchPreferences};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let store = PreferencesStore::load(&path).expect("load defaults");
    assert!(!store.search_defaults().case_sensitive);
    assert!(!store.search_defaults().whole_word);
    assert!(store.search_defaults().scroll_into_view);
    assert_eq!(store.bindings().next, "Enter");
    assert_eq!(store.bindings().replace_all, "Ctrl+Shift+H");
    assert!(!path.exists(), "loading must not create the file");
}

#[test]
fn search_defaults_persist_across_reloads() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("preferences.json");

    let mut store = PreferencesStore::load(&path).expect("load");
    store
        .set_search_defaults(SearchPreferences {
            case_sensitive: true,
            whole_word: true,
            scroll_into_view: false,
        })
        .expect("save");

    let reloaded = PreferencesStore::load(&path).expect("reload");
    assert!(reloaded.search_defaults().case_sensitive);
    assert!(reloaded.search_defaults().whole_word);
    assert!(!reloaded.search_defaults().scroll_into_view);
    assert_eq!(reloaded.path(), path.as_path());
}

#[test]
fn rebinding_an_action_persists_the_chord() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let mut store = PreferencesStore::load(&path).expect("load");
    store.bind(SearchAction::Next, " F3 ").expect("bind");
    assert_eq!(store.bindings().next, "F3");

    let reloaded = PreferencesStore::load(&path).expect("reload");
    assert_eq!(reloaded.bindings().action_for("f3"), Some(SearchAction::Next));
    assert_eq!(reloaded.bindings().action_for("Enter"), None);
}

#[test]
fn conflicting_or_unusable_chords_are_rejected() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");

    let mut store = PreferencesStore::load(&path).expect("load");
    let err = store.bind(SearchAction::Next, "Ctrl+H").unwrap_err();
    assert!(matches!(
        err,
        PreferencesError::ChordInUse {
            action: SearchAction::Replace,
            ..
        }
    ));

    let err = store.bind(SearchAction::Close, "Ctrl+").unwrap_err();
    assert!(matches!(err, PreferencesError::InvalidChord { .. }));
    assert!(err.to_string().contains("Ctrl+"));

    assert_eq!(store.bindings().next, "Enter");
    assert_eq!(store.bindings().close, "Escape");
    assert!(!path.exists(), "rejected changes must not be written");

    store.bind(SearchAction::Next, "enter").expect("same action may keep its chord");
}

#[test]
fn legacy_version_is_upgraded_on_load() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");
    fs::write(
        &path,
        r#"{
            "version": 0,
            "search": { "whole_word": true },
            "keys": { "previous": "+" }
        }"#,
    )
    .expect("write legacy prefs");

    let store = PreferencesStore::load(&path).expect("load legacy file");
    let prefs = store.preferences();
    assert_eq!(
        prefs.version, 1,
        "legacy preferences should be upgraded to schema version 1"
    );
    assert!(prefs.search.whole_word);
    assert!(
        prefs.search.scroll_into_view,
        "missing fields should fall back to defaults"
    );
    assert_eq!(
        prefs.keys.previous, "Shift+Enter",
        "unusable chord should fall back to default"
    );
}

#[test]
fn malformed_file_reports_path() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("preferences.json");
    fs::write(&path, "{ not json").expect("write");

    let err = PreferencesStore::load(&path).unwrap_err();
    assert!(err.to_string().contains("preferences.json"));
}
