//! Error types for DRS archive reading and writing.

use std::io::Seek;

use thiserror::Error;

use crate::records::RecordKind;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, DrsError>;

#[derive(Debug, Error)]
pub enum DrsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("binary codec error: {0}")]
    Binrw(#[from] binrw::Error),

    /// Top-level magic mismatch or an empty node table. The stream is not an archive.
    #[error("not a DRS archive: magic 0x{magic:08X}, node count {node_count}")]
    Format { magic: i32, node_count: u32 },

    /// Index entry whose magic has no record type.
    #[error("index entry {index} has unknown chunk magic {magic} (0x{magic:08X})")]
    UnknownChunk { index: usize, magic: i32 },

    /// Unrecognised discriminant, revision or version inside a record.
    #[error("unknown {record} variant {value}")]
    Variant { record: &'static str, value: i64 },

    /// Every decode candidate for a mismatched node failed.
    #[error("node '{node}' is declared as '{declared}' but its index entry holds {actual}")]
    NodeTypeMismatch {
        node: String,
        declared: String,
        actual: RecordKind,
    },

    #[error("index slot {slot} is empty and its link {linked_node} cannot supply a payload")]
    Alias { slot: usize, linked_node: i32 },

    #[error("node '{node}' points at index slot {info_index}, outside the table")]
    DanglingNode { node: String, info_index: i32 },

    #[error("{kind} payload at offset {offset} with size {size} runs past the {len}-byte stream")]
    OutOfBounds {
        kind: RecordKind,
        offset: i32,
        size: i32,
        len: usize,
    },

    #[error("malformed {kind} payload: {source}")]
    Record {
        kind: RecordKind,
        #[source]
        source: binrw::Error,
    },

    #[error("{kind} reported {reported} bytes but wrote {written}")]
    SizeMismatch {
        kind: RecordKind,
        reported: usize,
        written: usize,
    },

    #[error("archetype {archetype} has no slot for {kind}")]
    NotInArchetype {
        kind: RecordKind,
        archetype: &'static str,
    },
}

impl DrsError {
    /// Wraps a payload decode failure, lifting a variant fault raised deep inside binrw
    /// back into its own variant.
    pub fn from_record(kind: RecordKind, err: binrw::Error) -> Self {
        match variant_of(&err) {
            Some((record, value)) => DrsError::Variant { record, value },
            None => DrsError::Record { kind, source: err },
        }
    }

    /// Faults that abort a load regardless of options.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DrsError::Io(_) | DrsError::Format { .. } | DrsError::UnknownChunk { .. }
        )
    }
}

fn variant_of(err: &binrw::Error) -> Option<(&'static str, i64)> {
    if let binrw::Error::Backtrace(backtrace) = err {
        return variant_of(&backtrace.error);
    }
    match err.custom_err::<DrsError>() {
        Some(DrsError::Variant { record, value }) => Some((*record, *value)),
        _ => None,
    }
}

/// Builds the binrw error a record returns for an unknown discriminant.
pub(crate) fn variant_fault<S: Seek>(stream: &mut S, record: &'static str, value: i64) -> binrw::Error {
    binrw::Error::Custom {
        pos: stream.stream_position().unwrap_or(0),
        err: Box::new(DrsError::Variant { record, value }),
    }
}
