use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

use crate::html;
use crate::node::{DocumentInstance, Entry, HighlightKind, NodeId, NodeKind, Slot};
use crate::snapshot::{DocumentFile, NodeSnapshot};
use crate::text_index::{self, TextLeaf};

const ROOT_TAG: &str = "body";

/// 文件樹操作或載入/儲存時可能發生的錯誤。 / Errors raised by tree operations or while loading and saving a document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid document data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document format version {0}")]
    UnsupportedVersion(u32),
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("node {0} is not attached to the document root")]
    Detached(NodeId),
    #[error("node {0} is not a text leaf")]
    NotText(NodeId),
    #[error("node {0} cannot hold children")]
    NotContainer(NodeId),
    #[error("node {0} is not a highlight marker")]
    NotHighlight(NodeId),
    #[error("the document root cannot be removed")]
    RootRemoval,
    #[error("offset {offset} is not a character boundary inside node {node} (length {len})")]
    InvalidOffset {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    #[error("range {start}..{end} is invalid for node {node} (length {len})")]
    InvalidRange {
        node: NodeId,
        start: usize,
        end: usize,
        len: usize,
    },
}

impl DocumentError {
    /// 指出錯誤是否源自節點已不存在或已脫離文件。 / Whether the error means a recorded node reference went stale.
    pub fn is_stale_reference(&self) -> bool {
        matches!(
            self,
            DocumentError::UnknownNode(_) | DocumentError::Detached(_) | DocumentError::NotText(_)
        )
    }
}

/// 可變的富文本文件樹；節點以識別碼存放於 arena 之中。 / Mutable rich-text tree whose nodes live in an id-addressed arena.
///
/// Freed slots are reused under a new generation, so a lookup through a stale
/// id fails instead of silently resolving to an unrelated node, and repeated
/// highlight passes do not grow the arena.
#[derive(Debug)]
pub struct Document {
    instance: DocumentInstance,
    revision: u64,
    root: NodeId,
    slots: Vec<Entry>,
    free: Vec<usize>,
}

/// 複製品會取得新的實例識別碼。 / A clone is a separate document instance.
impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            instance: DocumentInstance::next(),
            revision: self.revision,
            root: self.root,
            slots: self.slots.clone(),
            free: self.free.clone(),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// 建立僅含根節點的空文件。 / Creates an empty document holding only the root container.
    pub fn new() -> Self {
        let root = NodeId::new(0, 0);
        Self {
            instance: DocumentInstance::next(),
            revision: 0,
            root,
            slots: vec![Entry {
                generation: 0,
                slot: Some(Slot::new(
                    NodeKind::Element {
                        tag: ROOT_TAG.to_string(),
                    },
                    None,
                )),
            }],
            free: Vec::new(),
        }
    }

    /// 以每行一個段落的方式建立文件。 / Builds a document with one `<p>` per line of `text`.
    pub fn from_plain_text(text: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root;
        for line in text.split('\n') {
            let paragraph = doc.push_child(root, NodeKind::Element { tag: "p".to_string() });
            if !line.is_empty() {
                doc.push_child(paragraph, NodeKind::Text(line.to_string()));
            }
        }
        doc
    }

    /// 從快照節點建立文件。 / Builds a document whose root children are the given snapshots.
    pub fn from_snapshots(content: Vec<NodeSnapshot>) -> Self {
        let mut doc = Self::new();
        let root = doc.root;
        for snapshot in content {
            doc.attach_snapshot(root, snapshot);
        }
        doc.normalize();
        doc.revision = 0;
        doc
    }

    /// 從 JSON 檔案載入文件。 / Loads a document from its JSON file form.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// 解析 JSON 文字為文件。 / Parses the JSON file form into a document.
    pub fn from_json(contents: &str) -> Result<Self, DocumentError> {
        let file: DocumentFile = serde_json::from_str(contents)?;
        if file.version > crate::DOCUMENT_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion(file.version));
        }
        Ok(Self::from_snapshots(file.content))
    }

    /// 將文件序列化為 JSON；搜尋標記不會被寫出。 / Serialises the document to JSON, leaving out search markers.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        let file = DocumentFile::new(self.snapshots());
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// 將文件寫入指定路徑。 / Writes the document to `path`.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path_ref = path.as_ref();
        let payload = self.to_json()?;

        // 先寫入暫存檔再重新命名。 / Temporary file plus rename guards against partial writes.
        let tmp_path = path_ref.with_extension("tmp_letterpad");
        {
            let mut tmp_file = File::create(&tmp_path)?;
            tmp_file.write_all(payload.as_bytes())?;
            tmp_file.sync_all()?;
        }
        fs::rename(&tmp_path, path_ref)?;
        Ok(())
    }

    /// 取得文件實例識別碼。 / Identity of this document instance.
    pub fn instance(&self) -> DocumentInstance {
        self.instance
    }

    /// 每次變動都會遞增的修訂號。 / Revision counter bumped by every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 節點是否仍存在於 arena 中。 / Whether `id` still refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    /// arena 的儲存格數量（含已釋放者）。 / Number of arena cells, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.slot(id).ok().map(|slot| &slot.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).ok().and_then(|slot| slot.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.slot(id)
            .map(|slot| slot.children.as_slice())
            .unwrap_or(&[])
    }

    /// 取得文字節點內容。 / Text of a leaf, `None` for other nodes.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// 節點是否能沿父節點一路走回根節點。 / Whether the node is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        for _ in 0..self.slots.len() {
            if current == self.root {
                return self.contains(current);
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    /// 依文件順序列出所有文字節點。 / Text leaves in document order.
    pub fn text_leaves(&self) -> Vec<TextLeaf<'_>> {
        text_index::text_leaves(self)
    }

    /// 串接所有文字節點的純文字內容。 / Concatenated text of every leaf.
    pub fn plain_text(&self) -> String {
        text_index::plain_text(self)
    }

    /// 依文件順序列出所有搜尋標記。 / Highlight markers reachable from the root, in document order.
    pub fn highlights(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.kind(*id).map_or(false, NodeKind::is_highlight))
            .collect()
    }

    /// 在父節點末端新增元素。 / Appends a formatting or structural element under `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: impl Into<String>,
    ) -> Result<NodeId, DocumentError> {
        self.append(parent, NodeKind::Element { tag: tag.into() })
    }

    /// 在父節點末端新增文字節點。 / Appends a text leaf under `parent`.
    pub fn append_text(
        &mut self,
        parent: NodeId,
        text: impl Into<String>,
    ) -> Result<NodeId, DocumentError> {
        self.append(parent, NodeKind::Text(text.into()))
    }

    /// 以新文字覆寫文字節點。 / Overwrites the contents of a text leaf.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), DocumentError> {
        match &mut self.slot_mut(id)?.kind {
            NodeKind::Text(existing) => *existing = text.into(),
            _ => return Err(DocumentError::NotText(id)),
        }
        self.touch();
        Ok(())
    }

    /// 移除節點及其整個子樹。 / Removes a node together with its subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DocumentError> {
        if id == self.root {
            return Err(DocumentError::RootRemoval);
        }
        let (parent, index) = self.position(id)?;
        self.slot_mut(parent)?.children.remove(index);
        self.release(id);
        self.touch();
        Ok(())
    }

    /// 清空根節點下的所有內容。 / Drops every node below the root.
    pub fn clear(&mut self) {
        let children = self.children(self.root).to_vec();
        for child in children {
            self.release(child);
        }
        if let Ok(root) = self.slot_mut(self.root) {
            root.children.clear();
        }
        self.touch();
    }

    /// 於位元組位移處切分文字節點，回傳右半部的新節點。 / Splits a leaf at a byte offset and returns the new right-hand sibling.
    ///
    /// The original id keeps the left part, so offsets before the split stay
    /// valid for it.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, DocumentError> {
        let text = self.text(id).ok_or_else(|| self.not_text(id))?;
        let len = text.len();
        if offset > len || !text.is_char_boundary(offset) {
            return Err(DocumentError::InvalidOffset {
                node: id,
                offset,
                len,
            });
        }
        let tail = text[offset..].to_string();
        let (parent, index) = self.position(id)?;

        if let NodeKind::Text(existing) = &mut self.slot_mut(id)?.kind {
            existing.truncate(offset);
        }
        let right = self.alloc(NodeKind::Text(tail), Some(parent));
        self.slot_mut(parent)?.children.insert(index + 1, right);
        self.touch();
        Ok(right)
    }

    /// 以搜尋標記包住文字節點中的 `[start, end)` 範圍。 / Wraps `[start, end)` of a leaf in a highlight marker.
    ///
    /// The leaf is split at the range edges when needed; the part before
    /// `start` keeps the original id. Wrapping several ranges of the same leaf
    /// therefore has to run from the rightmost range to the leftmost.
    pub fn wrap_range(
        &mut self,
        leaf: NodeId,
        start: usize,
        end: usize,
        kind: HighlightKind,
    ) -> Result<NodeId, DocumentError> {
        let text = self.text(leaf).ok_or_else(|| self.not_text(leaf))?;
        let len = text.len();
        if start >= end || end > len || !text.is_char_boundary(start) || !text.is_char_boundary(end)
        {
            return Err(DocumentError::InvalidRange {
                node: leaf,
                start,
                end,
                len,
            });
        }
        if !self.is_attached(leaf) {
            return Err(DocumentError::Detached(leaf));
        }

        if end < len {
            self.split_text(leaf, end)?;
        }
        let target = if start > 0 {
            self.split_text(leaf, start)?
        } else {
            leaf
        };

        let (parent, index) = self.position(target)?;
        let marker = self.alloc(NodeKind::Highlight(kind), Some(parent));
        self.slot_mut(parent)?.children[index] = marker;
        self.slot_mut(marker)?.children.push(target);
        self.slot_mut(target)?.parent = Some(marker);
        self.touch();
        Ok(marker)
    }

    /// 更新搜尋標記的角色。 / Re-tags a highlight marker.
    pub fn set_highlight_kind(
        &mut self,
        marker: NodeId,
        kind: HighlightKind,
    ) -> Result<(), DocumentError> {
        let changed = match &mut self.slot_mut(marker)?.kind {
            NodeKind::Highlight(existing) => {
                let changed = *existing != kind;
                *existing = kind;
                changed
            }
            _ => return Err(DocumentError::NotHighlight(marker)),
        };
        if changed {
            self.touch();
        }
        Ok(())
    }

    /// 以子節點取代節點本身。 / Replaces a node by its own children.
    pub fn unwrap_node(&mut self, id: NodeId) -> Result<(), DocumentError> {
        if id == self.root {
            return Err(DocumentError::RootRemoval);
        }
        let (parent, index) = self.position(id)?;
        let children = std::mem::take(&mut self.slot_mut(id)?.children);
        for child in &children {
            self.slot_mut(*child)?.parent = Some(parent);
        }
        let siblings = &mut self.slot_mut(parent)?.children;
        siblings.remove(index);
        for (offset, child) in children.iter().enumerate() {
            siblings.insert(index + offset, *child);
        }
        self.vacate(id);
        self.touch();
        Ok(())
    }

    /// 以單一文字節點取代節點（含子樹）。 / Swaps a node and its subtree for one new text leaf.
    pub fn replace_with_text(
        &mut self,
        id: NodeId,
        text: impl Into<String>,
    ) -> Result<NodeId, DocumentError> {
        if id == self.root {
            return Err(DocumentError::RootRemoval);
        }
        let (parent, index) = self.position(id)?;
        let replacement = self.alloc(NodeKind::Text(text.into()), Some(parent));
        self.slot_mut(parent)?.children[index] = replacement;
        self.release(id);
        self.touch();
        Ok(replacement)
    }

    /// 移除所有搜尋標記並合併相鄰文字節點，回傳移除數量。 / Strips every highlight marker, then normalises; returns how many were removed.
    pub fn strip_highlights(&mut self) -> usize {
        let markers = self.highlights();
        let removed = markers
            .into_iter()
            .filter(|marker| self.unwrap_node(*marker).is_ok())
            .count();
        self.normalize();
        removed
    }

    /// 合併相鄰文字節點、移除空文字節點與空標記。 / Merges adjacent text siblings and drops empty leaves and empty markers.
    ///
    /// Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        for id in self.descendants(self.root).into_iter().rev() {
            if !self.contains(id) || self.kind(id).map_or(true, NodeKind::is_text) {
                continue;
            }
            changed |= self.normalize_children(id);
        }
        if changed {
            self.touch();
        }
        changed
    }

    /// 序列化為 HTML 字串（供外部內容儲存使用）。 / Serialises the root's content as HTML for the external content store.
    pub fn to_html(&self) -> String {
        html::render(self)
    }

    /// 產生不含搜尋標記的快照。 / Snapshot of the root's content with search markers flattened away.
    pub fn snapshots(&self) -> Vec<NodeSnapshot> {
        let mut out = Vec::new();
        for child in self.children(self.root) {
            self.collect_snapshots(*child, &mut out);
        }
        out
    }

    /// Pre-order list of `from` and everything below it.
    pub(crate) fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(from) {
            return out;
        }
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    fn normalize_children(&mut self, parent: NodeId) -> bool {
        let children = self.children(parent).to_vec();
        let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
        let mut changed = false;

        for child in children {
            let drop_child = match self.kind(child) {
                Some(NodeKind::Text(text)) => text.is_empty(),
                Some(NodeKind::Highlight(_)) => self.children(child).is_empty(),
                Some(NodeKind::Element { .. }) => false,
                None => true,
            };
            if drop_child {
                self.release(child);
                changed = true;
                continue;
            }

            let previous = kept.last().copied();
            let tail = match (previous.and_then(|last| self.kind(last)), self.kind(child)) {
                (Some(NodeKind::Text(_)), Some(NodeKind::Text(text))) => Some(text.clone()),
                _ => None,
            };
            if let (Some(tail), Some(last)) = (tail, previous) {
                if let Ok(slot) = self.slot_mut(last) {
                    if let NodeKind::Text(existing) = &mut slot.kind {
                        existing.push_str(&tail);
                    }
                }
                self.release(child);
                changed = true;
                continue;
            }
            kept.push(child);
        }

        if changed {
            if let Ok(slot) = self.slot_mut(parent) {
                slot.children = kept;
            }
        }
        changed
    }

    fn collect_snapshots(&self, id: NodeId, out: &mut Vec<NodeSnapshot>) {
        match self.kind(id) {
            Some(NodeKind::Text(text)) => out.push(NodeSnapshot::text(text.clone())),
            Some(NodeKind::Element { tag }) => {
                let mut children = Vec::new();
                for child in self.children(id) {
                    self.collect_snapshots(*child, &mut children);
                }
                out.push(NodeSnapshot::element(tag.clone(), children));
            }
            Some(NodeKind::Highlight(_)) => {
                for child in self.children(id) {
                    self.collect_snapshots(*child, out);
                }
            }
            None => {}
        }
    }

    fn attach_snapshot(&mut self, parent: NodeId, snapshot: NodeSnapshot) {
        match snapshot {
            NodeSnapshot::Text { text } => {
                self.push_child(parent, NodeKind::Text(text));
            }
            NodeSnapshot::Element { tag, children } => {
                let element = self.push_child(parent, NodeKind::Element { tag });
                for child in children {
                    self.attach_snapshot(element, child);
                }
            }
        }
    }

    /// Appends below an element the constructors just created; does not bump the revision.
    fn push_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind, Some(parent));
        if let Ok(slot) = self.slot_mut(parent) {
            slot.children.push(id);
            return id;
        }
        self.vacate(id);
        id
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, DocumentError> {
        if self.slot(parent)?.kind.is_text() {
            return Err(DocumentError::NotContainer(parent));
        }
        let id = self.alloc(kind, Some(parent));
        self.slot_mut(parent)?.children.push(id);
        self.touch();
        Ok(id)
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let slot = Some(Slot::new(kind, parent));
        if let Some(index) = self.free.pop() {
            if let Some(entry) = self.slots.get_mut(index) {
                entry.slot = slot;
                return NodeId::new(index, entry.generation);
            }
        }
        self.slots.push(Entry {
            generation: 0,
            slot,
        });
        NodeId::new(self.slots.len() - 1, 0)
    }

    /// Frees one slot and retires its id.
    fn vacate(&mut self, id: NodeId) {
        let Some(entry) = self.slots.get_mut(id.index()) else {
            return;
        };
        if entry.generation != id.generation() || entry.slot.is_none() {
            return;
        }
        entry.slot = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index());
    }

    /// Frees a detached subtree; the parent's child list is left to the caller.
    fn release(&mut self, id: NodeId) {
        for node in self.descendants(id) {
            self.vacate(node);
        }
    }

    fn position(&self, id: NodeId) -> Result<(NodeId, usize), DocumentError> {
        let parent = self.slot(id)?.parent.ok_or(DocumentError::Detached(id))?;
        let index = self
            .slot(parent)?
            .children
            .iter()
            .position(|child| *child == id)
            .ok_or(DocumentError::Detached(id))?;
        Ok((parent, index))
    }

    fn not_text(&self, id: NodeId) -> DocumentError {
        if self.contains(id) {
            DocumentError::NotText(id)
        } else {
            DocumentError::UnknownNode(id)
        }
    }

    fn slot(&self, id: NodeId) -> Result<&Slot, DocumentError> {
        self.slots
            .get(id.index())
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.slot.as_ref())
            .ok_or(DocumentError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, DocumentError> {
        self.slots
            .get_mut(id.index())
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.slot.as_mut())
            .ok_or(DocumentError::UnknownNode(id))
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
