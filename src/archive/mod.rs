//! Container layer: header, index table, node hierarchy, and the reader and writer that
//! connect them to the record catalog.
//!
//! ```text
//! DrsHeader (20) | RootNodeInformation (32) | NodeInformation (32) * n
//!                | RootNode | Node * n | payloads in archetype write order
//! ```

use serde::{Deserialize, Serialize};

pub mod archetype;
pub mod header;
pub mod hierarchy;
pub mod index;
pub mod reader;
pub mod writer;

pub use archetype::Archetype;
pub use header::{DrsHeader, DRS_MAGIC};
pub use hierarchy::{Hierarchy, Node, RootNode};
pub use index::{Extent, IndexTable, NodeInformation, RootNodeInformation};
pub use reader::read_archive;
pub use writer::{plan_layout, write_archive, Layout, LayoutEntry};

use crate::records::{RecordKind, RecordTree};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Abort on the first record-level fault instead of skipping the record.
    pub strict: bool,
    pub warn_on_trailing_bytes: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            strict: false,
            warn_on_trailing_bytes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub model_count: i32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions { model_count: 1 }
    }
}

/// A hierarchy node whose payload did not make it into the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub node: String,
    pub info_index: i32,
    pub kind: Option<RecordKind>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedArchive {
    pub header: DrsHeader,
    pub index: IndexTable,
    pub hierarchy: Hierarchy,
    pub tree: RecordTree,
    pub skipped: Vec<SkippedRecord>,
}
