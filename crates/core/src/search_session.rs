use letterpad_document::{Document, DocumentInstance, NodeId};
use letterpad_search::{Matcher, SearchError, SearchOptions};
use letterpad_settings::{KeyBindings, SearchAction, SearchPreferences};
use tracing::{debug, warn};

use crate::highlight::{self, SkipReason};
use crate::observer::SearchObserver;
use crate::DocumentSpan;

/// Commands issued by the keyboard layer of the find & replace surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCommand {
    Next,
    Previous,
    ReplaceCurrent,
    ReplaceAll,
    Close,
}

impl From<SearchAction> for SearchCommand {
    fn from(action: SearchAction) -> Self {
        match action {
            SearchAction::Next => SearchCommand::Next,
            SearchAction::Previous => SearchCommand::Previous,
            SearchAction::Replace => SearchCommand::ReplaceCurrent,
            SearchAction::ReplaceAll => SearchCommand::ReplaceAll,
            SearchAction::Close => SearchCommand::Close,
        }
    }
}

/// Whether the find & replace surface is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Searching,
}

/// Query, toggles and the results of the last search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    pub replacement: String,
    pub case_sensitive: bool,
    pub whole_word: bool,
    spans: Vec<DocumentSpan>,
    current: Option<usize>,
}

impl SearchState {
    pub fn options(&self) -> SearchOptions {
        SearchOptions::new(self.query.clone())
            .case_sensitive(self.case_sensitive)
            .whole_word(self.whole_word)
    }

    /// Spans of the last search, in document order.
    pub fn spans(&self) -> &[DocumentSpan] {
        &self.spans
    }

    /// Index of the current match; `None` when there are no matches.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    fn clear_results(&mut self) {
        self.spans.clear();
        self.current = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    instance: DocumentInstance,
    revision: u64,
}

impl Snapshot {
    fn of(doc: &Document) -> Self {
        Self {
            instance: doc.instance(),
            revision: doc.revision(),
        }
    }
}

/// Drives search, highlighting, navigation and replacement over a borrowed document.
///
/// Spans and markers refer to the document revision recorded after the last
/// pass. Any operation that finds the document changed since then (edited
/// elsewhere or replaced wholesale) runs a fresh search instead of touching
/// the recorded node ids; the requested action is not applied in that case.
#[derive(Debug, Clone)]
pub struct SearchSession {
    state: SearchState,
    markers: Vec<NodeId>,
    snapshot: Option<Snapshot>,
    needs_refresh: bool,
    defaults: SearchPreferences,
    phase: SessionPhase,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    pub fn new() -> Self {
        Self::from_preferences(&SearchPreferences::default())
    }

    /// Creates a session whose toggles start from the stored preferences.
    ///
    /// Closing the session returns the toggles to these values.
    pub fn from_preferences(preferences: &SearchPreferences) -> Self {
        Self {
            state: SearchState {
                case_sensitive: preferences.case_sensitive,
                whole_word: preferences.whole_word,
                ..SearchState::default()
            },
            markers: Vec::new(),
            snapshot: None,
            needs_refresh: false,
            defaults: preferences.clone(),
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn query(&self) -> &str {
        &self.state.query
    }

    pub fn replacement(&self) -> &str {
        &self.state.replacement
    }

    pub fn spans(&self) -> &[DocumentSpan] {
        self.state.spans()
    }

    pub fn match_count(&self) -> usize {
        self.state.spans.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.current
    }

    pub fn current_span(&self) -> Option<&DocumentSpan> {
        self.state.current.and_then(|idx| self.state.spans.get(idx))
    }

    /// Marker wrapping the current match.
    pub fn current_marker(&self) -> Option<NodeId> {
        self.state
            .current
            .and_then(|idx| self.markers.get(idx).copied())
    }

    /// Markers in document order, aligned with [`spans`](Self::spans).
    pub fn markers(&self) -> &[NodeId] {
        &self.markers
    }

    /// `(1-based position, total)`; `(0, 0)` without matches.
    pub fn counter(&self) -> (usize, usize) {
        match self.state.current {
            Some(idx) => (idx + 1, self.state.spans.len()),
            None => (0, 0),
        }
    }

    /// Counter rendered as `"3/7"`.
    pub fn status_label(&self) -> String {
        let (position, total) = self.counter();
        format!("{position}/{total}")
    }

    /// Opens the surface without running a search.
    pub fn open(&mut self) {
        self.phase = SessionPhase::Searching;
    }

    /// Updates the query and searches again.
    pub fn set_query(
        &mut self,
        query: impl Into<String>,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<usize, SearchError> {
        self.state.query = query.into();
        self.search(document, observer)
    }

    pub fn set_case_sensitive(
        &mut self,
        value: bool,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<usize, SearchError> {
        self.state.case_sensitive = value;
        self.search(document, observer)
    }

    pub fn set_whole_word(
        &mut self,
        value: bool,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<usize, SearchError> {
        self.state.whole_word = value;
        self.search(document, observer)
    }

    /// Sets the text used by the replace operations. Does not search.
    pub fn set_replacement(&mut self, replacement: impl Into<String>) {
        self.state.replacement = replacement.into();
    }

    /// Strips old markers, matches the current tree and highlights the result.
    ///
    /// Returns the number of highlighted matches.
    pub fn refresh(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<usize, SearchError> {
        self.search(document, observer)
    }

    /// Moves to the next match, wrapping to the first one.
    pub fn next(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<Option<usize>, SearchError> {
        self.step(document, observer, true)
    }

    /// Moves to the previous match, wrapping to the last one.
    pub fn previous(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<Option<usize>, SearchError> {
        self.step(document, observer, false)
    }

    /// Replaces the current match with the replacement literal, then searches again.
    ///
    /// Returns whether a match was replaced. Without a current match or with
    /// an empty replacement this is a no-op.
    pub fn replace_current(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<bool, SearchError> {
        if self.state.replacement.is_empty() || !self.ensure_fresh(document, observer)? {
            return Ok(false);
        }
        let Some(marker) = self.current_marker() else {
            return Ok(false);
        };

        let replaced = match document.replace_with_text(marker, self.state.replacement.clone()) {
            Ok(_) => 1,
            Err(err) => {
                warn!(%marker, %err, "current match could not be replaced");
                0
            }
        };
        self.finish_mutation(document, observer, replaced)?;
        Ok(replaced == 1)
    }

    /// Replaces every highlighted match once, then searches again.
    ///
    /// Returns the number of replacements.
    pub fn replace_all(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<usize, SearchError> {
        if self.state.replacement.is_empty() || !self.ensure_fresh(document, observer)? {
            return Ok(0);
        }

        let mut replaced = 0usize;
        for marker in std::mem::take(&mut self.markers) {
            match document.replace_with_text(marker, self.state.replacement.clone()) {
                Ok(_) => replaced += 1,
                Err(err) => warn!(%marker, %err, "match could not be replaced"),
            }
        }
        self.finish_mutation(document, observer, replaced)?;
        Ok(replaced)
    }

    /// Strips all markers, clears the state and restores the preferred toggles.
    pub fn close(&mut self, document: &mut Document) {
        highlight::strip(document);
        *self = Self::from_preferences(&self.defaults);
    }

    /// Runs a keyboard command.
    pub fn dispatch(
        &mut self,
        command: SearchCommand,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<(), SearchError> {
        match command {
            SearchCommand::Next => {
                self.next(document, observer)?;
            }
            SearchCommand::Previous => {
                self.previous(document, observer)?;
            }
            SearchCommand::ReplaceCurrent => {
                self.replace_current(document, observer)?;
            }
            SearchCommand::ReplaceAll => {
                self.replace_all(document, observer)?;
            }
            SearchCommand::Close => self.close(document),
        }
        Ok(())
    }

    /// Resolves `chord` through the bindings and runs the bound command.
    ///
    /// Returns whether the chord was bound.
    pub fn handle_key(
        &mut self,
        chord: &str,
        bindings: &KeyBindings,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<bool, SearchError> {
        let Some(action) = bindings.action_for(chord) else {
            return Ok(false);
        };
        self.dispatch(action.into(), document, observer)?;
        Ok(true)
    }

    fn search(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<usize, SearchError> {
        self.phase = SessionPhase::Searching;
        let matcher = Matcher::new(&self.state.options());

        highlight::strip(document);
        self.state.clear_results();
        self.markers.clear();
        self.needs_refresh = false;
        self.snapshot = Some(Snapshot::of(document));
        let matcher = matcher?;

        let spans = matcher.find_spans(
            document
                .text_leaves()
                .into_iter()
                .map(|leaf| (leaf.id, leaf.text)),
        );
        let annotation = highlight::annotate(document, &spans);
        if !annotation.skipped.is_empty() {
            warn!(
                skipped = annotation.skipped.len(),
                "some matches could not be highlighted"
            );
        }
        if annotation.has_invalid_ranges() {
            self.needs_refresh = true;
        }

        let (spans, markers): (Vec<DocumentSpan>, Vec<NodeId>) =
            annotation.applied.into_iter().unzip();
        self.state.spans = spans;
        self.markers = markers;
        self.state.current = if self.markers.is_empty() { None } else { Some(0) };
        self.retag(document);
        self.snapshot = Some(Snapshot::of(document));

        debug!(
            query = %self.state.query,
            case_sensitive = self.state.case_sensitive,
            whole_word = self.state.whole_word,
            matches = self.markers.len(),
            "search refreshed"
        );
        self.reveal(observer);
        Ok(self.markers.len())
    }

    fn step(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
        forward: bool,
    ) -> Result<Option<usize>, SearchError> {
        if !self.ensure_fresh(document, observer)? {
            return Ok(self.state.current);
        }
        let len = self.markers.len();
        let Some(current) = self.state.current else {
            return Ok(None);
        };
        if len == 0 {
            return Ok(None);
        }

        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.state.current = Some(next);
        self.retag(document);
        self.snapshot = Some(Snapshot::of(document));
        self.reveal(observer);
        Ok(Some(next))
    }

    /// Re-searches when the recorded snapshot no longer matches `document`.
    ///
    /// Returns `true` when the recorded spans can be used as they are.
    fn ensure_fresh(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
    ) -> Result<bool, SearchError> {
        let Some(snapshot) = self.snapshot else {
            return Ok(true);
        };
        if !self.needs_refresh && snapshot == Snapshot::of(document) {
            return Ok(true);
        }
        debug!(
            same_instance = snapshot.instance == document.instance(),
            recorded_revision = snapshot.revision,
            revision = document.revision(),
            "recorded matches are stale, searching again"
        );
        self.search(document, observer)?;
        Ok(false)
    }

    fn finish_mutation(
        &mut self,
        document: &mut Document,
        observer: &mut dyn SearchObserver,
        replaced: usize,
    ) -> Result<(), SearchError> {
        if replaced > 0 {
            highlight::strip(document);
            observer.document_changed(&document.to_html());
        }
        self.search(document, observer)?;
        Ok(())
    }

    fn retag(&mut self, document: &mut Document) {
        let failed = highlight::mark_current(document, &self.markers, self.state.current);
        if !failed.is_empty() {
            debug!(
                failed = failed.len(),
                reason = ?SkipReason::StaleReference,
                "markers could not be re-tagged"
            );
            self.needs_refresh = true;
        }
    }

    fn reveal(&self, observer: &mut dyn SearchObserver) {
        if !self.defaults.scroll_into_view {
            return;
        }
        if let Some(marker) = self.current_marker() {
            observer.scroll_into_view(marker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NullObserver, RecordingObserver};
    use letterpad_document::{HighlightKind, NodeKind};

    fn current_markers(doc: &Document) -> Vec<NodeId> {
        doc.highlights()
            .into_iter()
            .filter(|id| doc.kind(*id) == Some(&NodeKind::Highlight(HighlightKind::Current)))
            .collect()
    }

    #[test]
    fn search_highlights_and_selects_first_match() {
        let mut doc = Document::from_plain_text("alpha beta gamma beta");
        let mut session = SearchSession::new();
        let mut observer = RecordingObserver::default();

        let count = session.set_query("beta", &mut doc, &mut observer).unwrap();
        assert_eq!(count, 2);
        assert_eq!(session.phase(), SessionPhase::Searching);
        assert_eq!(session.current_index(), Some(0));
        assert_eq!(session.status_label(), "1/2");
        assert_eq!(doc.highlights().len(), 2);
        assert_eq!(current_markers(&doc), vec![session.markers()[0]]);
        assert_eq!(observer.scrolled, vec![session.markers()[0]]);
    }

    #[test]
    fn navigation_wraps_in_both_directions() {
        let mut doc = Document::from_plain_text("beta beta beta");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;
        session.set_query("beta", &mut doc, &mut observer).unwrap();

        assert_eq!(session.previous(&mut doc, &mut observer).unwrap(), Some(2));
        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), Some(0));
        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), Some(1));
        assert_eq!(current_markers(&doc), vec![session.markers()[1]]);
        assert_eq!(session.counter(), (2, 3));
    }

    #[test]
    fn empty_query_is_a_quiet_no_match() {
        let mut doc = Document::from_plain_text("anything");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;

        assert_eq!(session.set_query("", &mut doc, &mut observer).unwrap(), 0);
        assert_eq!(session.current_index(), None);
        assert_eq!(session.status_label(), "0/0");
        assert!(doc.highlights().is_empty());
        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), None);
        session.set_replacement("x");
        assert!(!session.replace_current(&mut doc, &mut observer).unwrap());
    }

    #[test]
    fn changing_flags_searches_again() {
        let mut doc = Document::from_plain_text("Cat cat category");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;

        assert_eq!(session.set_query("cat", &mut doc, &mut observer).unwrap(), 3);
        assert_eq!(session.set_whole_word(true, &mut doc, &mut observer).unwrap(), 2);
        assert_eq!(session.set_case_sensitive(true, &mut doc, &mut observer).unwrap(), 1);
        assert_eq!(doc.highlights().len(), 1);
    }

    #[test]
    fn replace_current_rewrites_one_match_and_notifies() {
        let mut doc = Document::from_plain_text("foo bar foo");
        let mut session = SearchSession::new();
        let mut observer = RecordingObserver::default();
        session.set_query("foo", &mut doc, &mut observer).unwrap();
        session.set_replacement("baz");

        assert!(session.replace_current(&mut doc, &mut observer).unwrap());
        assert_eq!(doc.plain_text(), "baz bar foo");
        assert_eq!(observer.last_change(), Some("<p>baz bar foo</p>"));
        assert_eq!(session.match_count(), 1);
        assert_eq!(session.current_index(), Some(0));
    }

    #[test]
    fn empty_replacement_is_ignored() {
        let mut doc = Document::from_plain_text("foo");
        let mut session = SearchSession::new();
        let mut observer = RecordingObserver::default();
        session.set_query("foo", &mut doc, &mut observer).unwrap();

        assert!(!session.replace_current(&mut doc, &mut observer).unwrap());
        assert_eq!(session.replace_all(&mut doc, &mut observer).unwrap(), 0);
        assert!(observer.changes.is_empty());
        assert_eq!(doc.plain_text(), "foo");
    }

    #[test]
    fn replacement_containing_the_query_terminates() {
        let mut doc = Document::from_plain_text("a cat");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        session.set_replacement("catcat");

        assert_eq!(session.replace_all(&mut doc, &mut observer).unwrap(), 1);
        assert_eq!(doc.plain_text(), "a catcat");
        assert_eq!(session.match_count(), 2);
    }

    #[test]
    fn external_edit_forces_a_fresh_search() {
        let mut doc = Document::from_plain_text("cat cat");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        session.next(&mut doc, &mut observer).unwrap();
        assert_eq!(session.current_index(), Some(1));

        let paragraph = doc.children(doc.root())[0];
        doc.append_text(paragraph, " cat").unwrap();

        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), Some(0));
        assert_eq!(session.match_count(), 3);
    }

    #[test]
    fn wholesale_replacement_is_detected() {
        let mut doc = Document::from_plain_text("cat cat");
        let mut session = SearchSession::new();
        let mut observer = RecordingObserver::default();
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        session.set_replacement("dog");

        doc = Document::from_plain_text("a cat");
        assert!(!session.replace_current(&mut doc, &mut observer).unwrap());
        assert!(observer.changes.is_empty());
        assert_eq!(session.match_count(), 1);
        assert_eq!(doc.plain_text(), "a cat");
    }

    #[test]
    fn close_strips_markers_and_clears_state() {
        let mut doc = Document::from_plain_text("cat cat");
        let before = doc.to_html();
        let mut session = SearchSession::new();
        let mut observer = NullObserver;
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        session.set_replacement("dog");

        session.close(&mut doc);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.query(), "");
        assert_eq!(session.replacement(), "");
        assert!(session.spans().is_empty());
        assert!(doc.highlights().is_empty());
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn preferences_seed_toggles() {
        let prefs = SearchPreferences {
            case_sensitive: true,
            whole_word: true,
            scroll_into_view: false,
        };
        let mut doc = Document::from_plain_text("Cat cat cats");
        let mut session = SearchSession::from_preferences(&prefs);
        let mut observer = RecordingObserver::default();

        assert_eq!(session.set_query("cat", &mut doc, &mut observer).unwrap(), 1);
        assert!(observer.scrolled.is_empty());
    }

    #[test]
    fn close_restores_preferred_toggles() {
        let prefs = SearchPreferences {
            case_sensitive: true,
            whole_word: true,
            scroll_into_view: true,
        };
        let mut doc = Document::from_plain_text("Cat cat");
        let mut session = SearchSession::from_preferences(&prefs);
        let mut observer = NullObserver;
        session.set_whole_word(false, &mut doc, &mut observer).unwrap();
        session.set_case_sensitive(false, &mut doc, &mut observer).unwrap();
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        assert_eq!(session.match_count(), 2);

        session.close(&mut doc);
        assert!(session.state().case_sensitive);
        assert!(session.state().whole_word);
        assert_eq!(session.query(), "");
        assert_eq!(session.set_query("cat", &mut doc, &mut observer).unwrap(), 1);
    }

    #[test]
    fn invalid_range_forces_a_fresh_search_before_navigation() {
        let mut doc = Document::from_plain_text("cat cat cat");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), Some(1));

        session.needs_refresh = true;
        let revision = doc.revision();
        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), Some(0));
        assert!(!session.needs_refresh);
        assert_ne!(doc.revision(), revision);
        assert_eq!(current_markers(&doc), vec![session.markers()[0]]);

        assert_eq!(session.next(&mut doc, &mut observer).unwrap(), Some(1));
    }

    #[test]
    fn invalid_range_forces_a_fresh_search_before_replacing() {
        let mut doc = Document::from_plain_text("cat cat");
        let mut session = SearchSession::new();
        let mut observer = RecordingObserver::default();
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        session.set_replacement("dog");

        session.needs_refresh = true;
        assert!(!session.replace_current(&mut doc, &mut observer).unwrap());
        assert_eq!(doc.plain_text(), "cat cat");
        assert!(observer.changes.is_empty());
        assert_eq!(session.match_count(), 2);

        assert!(session.replace_current(&mut doc, &mut observer).unwrap());
        assert_eq!(doc.plain_text(), "dog cat");
    }

    #[test]
    fn swapping_in_an_edited_clone_forces_a_fresh_search() {
        let mut doc = Document::from_plain_text("cat cat cat");
        let mut session = SearchSession::new();
        let mut observer = RecordingObserver::default();
        session.set_query("cat", &mut doc, &mut observer).unwrap();
        session.set_replacement("dog");

        let mut copy = doc.clone();
        session.next(&mut doc, &mut observer).unwrap();
        let marker = session.current_marker().unwrap();
        let inner = copy.children(marker)[0];
        while copy.revision() < doc.revision() {
            copy.set_text(inner, "XYZ").unwrap();
        }
        assert_eq!(copy.revision(), doc.revision());
        assert_ne!(copy.instance(), doc.instance());

        doc = copy;
        assert!(!session.replace_current(&mut doc, &mut observer).unwrap());
        assert_eq!(doc.plain_text(), "cat XYZ cat");
        assert!(observer.changes.is_empty());
        assert_eq!(session.match_count(), 2);
    }

    #[test]
    fn key_chords_dispatch_bound_commands() {
        let mut doc = Document::from_plain_text("one two one");
        let mut session = SearchSession::new();
        let mut observer = NullObserver;
        let bindings = KeyBindings::default();
        session.set_query("one", &mut doc, &mut observer).unwrap();
        session.set_replacement("1");

        assert!(session.handle_key("Enter", &bindings, &mut doc, &mut observer).unwrap());
        assert_eq!(session.current_index(), Some(1));
        assert!(session.handle_key("Ctrl+Shift+H", &bindings, &mut doc, &mut observer).unwrap());
        assert_eq!(doc.plain_text(), "1 two 1");
        assert!(!session.handle_key("Ctrl+F", &bindings, &mut doc, &mut observer).unwrap());
        assert!(session.handle_key("Escape", &bindings, &mut doc, &mut observer).unwrap());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }
}
