//! Highlight markers over the live document.
//!
//! Spans are wrapped from last to first: wrapping splits the leaf and the
//! original id keeps the text before the span, so offsets of earlier spans in
//! the same leaf stay valid.

use letterpad_document::{Document, HighlightKind, NodeId};
use tracing::debug;

use crate::DocumentSpan;

/// Why a span did not receive a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The leaf no longer exists or is no longer a text leaf of this document.
    StaleReference,
    /// The offsets do not fit the leaf's current text.
    InvalidRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedSpan {
    pub span: DocumentSpan,
    pub reason: SkipReason,
}

/// Result of a highlight pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Highlighted spans with their marker, re-ranked in document order.
    pub applied: Vec<(DocumentSpan, NodeId)>,
    pub skipped: Vec<SkippedSpan>,
}

impl Annotation {
    pub fn has_invalid_ranges(&self) -> bool {
        self.skipped
            .iter()
            .any(|skipped| skipped.reason == SkipReason::InvalidRange)
    }
}

/// Wraps every span in an `Other` marker. Spans that cannot be applied are skipped.
pub fn annotate(doc: &mut Document, spans: &[DocumentSpan]) -> Annotation {
    let mut applied = Vec::with_capacity(spans.len());
    let mut skipped = Vec::new();

    for span in spans.iter().rev() {
        match doc.wrap_range(span.leaf, span.start, span.end, HighlightKind::Other) {
            Ok(marker) => applied.push((*span, marker)),
            Err(err) => {
                let reason = if err.is_stale_reference() {
                    SkipReason::StaleReference
                } else {
                    SkipReason::InvalidRange
                };
                debug!(rank = span.rank, leaf = %span.leaf, ?reason, %err, "skipping highlight");
                skipped.push(SkippedSpan {
                    span: *span,
                    reason,
                });
            }
        }
    }

    applied.reverse();
    skipped.reverse();
    for (rank, (span, _)) in applied.iter_mut().enumerate() {
        span.rank = rank;
    }
    Annotation { applied, skipped }
}

/// Tags `markers[current]` as `Current` and every other marker as `Other`.
///
/// Returns the markers that could not be re-tagged.
pub fn mark_current(doc: &mut Document, markers: &[NodeId], current: Option<usize>) -> Vec<NodeId> {
    let mut failed = Vec::new();
    for (index, marker) in markers.iter().enumerate() {
        let kind = if Some(index) == current {
            HighlightKind::Current
        } else {
            HighlightKind::Other
        };
        if doc.set_highlight_kind(*marker, kind).is_err() {
            failed.push(*marker);
        }
    }
    failed
}

/// Removes every marker and merges the text back together.
pub fn strip(doc: &mut Document) -> usize {
    doc.strip_highlights()
}
