//! Flat, ordered view over the text leaves of a document.
//!
//! The index is rebuilt on every call and borrows the document, so it always
//! reflects the current tree and can never outlive a mutation.

use crate::node::{NodeId, NodeKind};
use crate::Document;

/// A text-bearing leaf together with its current contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextLeaf<'a> {
    pub id: NodeId,
    pub text: &'a str,
}

/// Collects every text leaf reachable from the root, depth-first and left to right.
///
/// Structural and marker nodes are traversed but not reported. A document
/// whose root is gone yields an empty index.
pub fn text_leaves(doc: &Document) -> Vec<TextLeaf<'_>> {
    let mut leaves = Vec::new();
    let root = doc.root();
    if !doc.contains(root) {
        return leaves;
    }

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        match doc.kind(id) {
            Some(NodeKind::Text(text)) => leaves.push(TextLeaf {
                id,
                text: text.as_str(),
            }),
            Some(_) => {
                for child in doc.children(id).iter().rev() {
                    stack.push(*child);
                }
            }
            None => {}
        }
    }
    leaves
}

/// Concatenation of all leaf texts in document order.
pub fn plain_text(doc: &Document) -> String {
    text_leaves(doc).iter().map(|leaf| leaf.text).collect()
}
