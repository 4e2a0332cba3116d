//! Rich-text document tree shared by the LetterPad letter editor surfaces.
//! LetterPad 信件編輯器共用的富文本文件樹。

mod html;
pub mod document;
pub mod node;
pub mod snapshot;
pub mod text_index;

pub use document::{Document, DocumentError};
pub use node::{DocumentInstance, HighlightKind, NodeId, NodeKind};
pub use snapshot::{DocumentFile, NodeSnapshot, DOCUMENT_FORMAT_VERSION};
pub use text_index::{plain_text, text_leaves, TextLeaf};
