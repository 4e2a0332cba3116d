//! Find & replace over a live LetterPad document.
//!
//! The session owns the query state; the document is borrowed per call so
//! the host stays free to edit or replace it between operations.

pub mod highlight;
pub mod observer;
pub mod search_session;

use letterpad_document::NodeId;
use letterpad_search::MatchSpan;

/// A match located in a text leaf of the document.
pub type DocumentSpan = MatchSpan<NodeId>;

pub use highlight::{Annotation, SkipReason, SkippedSpan};
pub use observer::{ContentStore, NullObserver, RecordingObserver, SearchObserver};
pub use search_session::{SearchCommand, SearchSession, SearchState, SessionPhase};
