use serde::{Deserialize, Serialize};

/// Current version of the on-disk document format.
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Serializable form of a node; search markers never appear here.
/// 可序列化的節點形式；搜尋標記不會出現在快照中。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSnapshot {
    Element {
        tag: String,
        #[serde(default)]
        children: Vec<NodeSnapshot>,
    },
    Text {
        text: String,
    },
}

impl NodeSnapshot {
    pub fn element(tag: impl Into<String>, children: Vec<NodeSnapshot>) -> Self {
        NodeSnapshot::Element {
            tag: tag.into(),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        NodeSnapshot::Text { text: text.into() }
    }
}

/// Top-level JSON document file.
/// 文件 JSON 檔案的頂層結構。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub content: Vec<NodeSnapshot>,
}

fn default_version() -> u32 {
    DOCUMENT_FORMAT_VERSION
}

impl DocumentFile {
    pub fn new(content: Vec<NodeSnapshot>) -> Self {
        Self {
            version: DOCUMENT_FORMAT_VERSION,
            content,
        }
    }
}
