use letterpad_document::NodeId;

/// Collaborators notified by a [`SearchSession`](crate::SearchSession).
pub trait SearchObserver {
    /// Receives the full serialized document after a replacement.
    fn document_changed(&mut self, serialized: &str);

    /// Asks the view to bring the current match marker on screen.
    fn scroll_into_view(&mut self, _marker: NodeId) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SearchObserver for NullObserver {
    fn document_changed(&mut self, _serialized: &str) {}
}

/// Adapts a content-store callback into an observer.
pub struct ContentStore<F>(pub F);

impl<F> SearchObserver for ContentStore<F>
where
    F: FnMut(&str),
{
    fn document_changed(&mut self, serialized: &str) {
        (self.0)(serialized)
    }
}

/// Keeps every notification, for hosts that apply them later and for tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingObserver {
    pub changes: Vec<String>,
    pub scrolled: Vec<NodeId>,
}

impl RecordingObserver {
    pub fn last_change(&self) -> Option<&str> {
        self.changes.last().map(String::as_str)
    }
}

impl SearchObserver for RecordingObserver {
    fn document_changed(&mut self, serialized: &str) {
        self.changes.push(serialized.to_string());
    }

    fn scroll_into_view(&mut self, marker: NodeId) {
        self.scrolled.push(marker);
    }
}
