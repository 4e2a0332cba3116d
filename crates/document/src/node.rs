use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a node inside a single [`Document`](crate::Document).
/// 文件內節點的識別碼；釋放後的位置會以新世代重新使用。
///
/// A freed arena slot is handed out again with a bumped generation, so an id
/// kept across a removal never resolves to the node that took its place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "#{}", self.index)
        } else {
            write!(f, "#{}v{}", self.index, self.generation)
        }
    }
}

/// Identity of a constructed, loaded or cloned document, used to detect wholesale replacement.
/// 文件實例識別碼，用於偵測整份文件被替換。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DocumentInstance(u64);

impl DocumentInstance {
    pub(crate) fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Visual role of a search highlight marker.
/// 搜尋醒目標記的角色：目前項目或其他項目。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HighlightKind {
    Current,
    Other,
}

impl HighlightKind {
    /// CSS class list emitted for the marker when serialising to HTML.
    pub fn class_name(self) -> &'static str {
        match self {
            HighlightKind::Current => "search-highlight current",
            HighlightKind::Other => "search-highlight",
        }
    }
}

/// The kind of a document node.
/// 文件節點的類型。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Structural or formatting container (`p`, `strong`, `em`, ...).
    Element { tag: String },
    /// Text leaf holding a run of characters.
    Text(String),
    /// Transient search marker wrapping a matched run.
    Highlight(HighlightKind),
}

impl NodeKind {
    pub fn is_text(&self) -> bool {
        matches!(self, NodeKind::Text(_))
    }

    pub fn is_highlight(&self) -> bool {
        matches!(self, NodeKind::Highlight(_))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Slot {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// Arena cell; `generation` counts how often the cell has been freed.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) generation: u32,
    pub(crate) slot: Option<Slot>,
}

impl Slot {
    pub(crate) fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
        }
    }
}
