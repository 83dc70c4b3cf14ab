//! Two-pass writer.
//!
//! The first pass sizes every populated record and assigns offsets in archetype write order.
//! The second pass serialises header, index, hierarchy and payloads, and checks that every
//! record wrote exactly the bytes it reported.

use std::io::{Cursor, Seek, Write};

use log::{debug, info};
use serde::Serialize;

use crate::archive::{
    Archetype, DrsHeader, Hierarchy, IndexTable, Node, NodeInformation, RootNode, RootNodeInformation,
    WriteOptions,
};
use crate::error::{DrsError, Result};
use crate::primitive::{write, Record};
use crate::records::{RecordKind, RecordTree};

/// Placement of one archetype slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutEntry {
    pub kind: RecordKind,
    pub slot: usize,
    pub offset: usize,
    pub size: usize,
    /// False for slots the tree leaves empty. They keep the previous record's offset.
    pub emitted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub archetype: Archetype,
    pub header: DrsHeader,
    pub index: IndexTable,
    pub hierarchy: Hierarchy,
    /// First payload byte.
    pub base: usize,
    /// Entries in write order.
    pub entries: Vec<LayoutEntry>,
    pub total_len: usize,
}

/// The primitive container holds no bytes and every archetype that lists it expects it.
fn is_emitted(tree: &RecordTree, kind: RecordKind) -> bool {
    tree.contains(kind) || kind == RecordKind::CGeoPrimitiveContainer
}

/// First pass: sizes, slots and offsets for `tree` laid out as `archetype`.
pub fn plan_layout(tree: &RecordTree, archetype: Archetype) -> Result<Layout> {
    if let Some(kind) = tree.kinds().find(|kind| !archetype.contains(*kind)) {
        return Err(DrsError::NotInArchetype {
            kind,
            archetype: archetype.name(),
        });
    }

    let slots = archetype.slots();
    let mut index = IndexTable {
        root: RootNodeInformation::new(slots.len()),
        entries: vec![NodeInformation::new(RecordKind::CGeoPrimitiveContainer, 0); slots.len()],
    };
    let mut hierarchy = Hierarchy {
        root: RootNode::default(),
        nodes: Vec::with_capacity(slots.len()),
    };
    for (position, (kind, info_index)) in slots.iter().enumerate() {
        if let Some(entry) = index.slot_mut(*info_index) {
            *entry = NodeInformation::new(*kind, position as i32 + 1);
        }
        hierarchy.nodes.push(Node::new(*kind, *info_index));
    }

    for kind in archetype.write_order() {
        if let Some(size) = tree.record_size(*kind) {
            index.register(*kind, size, archetype.name())?;
        }
    }

    let index_table_offset = DrsHeader::SIZE;
    let hierarchy_offset = index_table_offset + index.size();
    let base = hierarchy_offset + hierarchy.size();

    let mut cursor = base;
    let mut previous = base;
    let mut entries = Vec::with_capacity(slots.len());
    for kind in archetype.write_order() {
        let slot = index.find(*kind).ok_or(DrsError::NotInArchetype {
            kind: *kind,
            archetype: archetype.name(),
        })?;
        let emitted = is_emitted(tree, *kind);
        let size = if emitted { tree.record_size(*kind).unwrap_or(0) } else { 0 };
        let offset = if emitted { cursor } else { previous };
        if let Some(entry) = index.slot_mut(slot) {
            entry.offset = offset as i32;
            entry.size = size as i32;
        }
        debug!("{} in slot {} at offset {} ({} bytes)", kind, slot, offset, size);
        entries.push(LayoutEntry {
            kind: *kind,
            slot,
            offset,
            size,
            emitted,
        });
        if emitted {
            previous = cursor;
            cursor += size;
        }
    }

    let header = DrsHeader {
        index_table_offset: index_table_offset as i32,
        hierarchy_offset: hierarchy_offset as i32,
        node_count: slots.len() as u32 + 1,
        ..DrsHeader::default()
    };

    Ok(Layout {
        archetype,
        header,
        index,
        hierarchy,
        base,
        entries,
        total_len: cursor,
    })
}

/// Second pass: serialises `tree` as `archetype`.
pub fn write_archive(tree: &RecordTree, archetype: Archetype, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut layout = plan_layout(tree, archetype)?;
    layout.header.model_count = options.model_count;

    let mut out = Cursor::new(Vec::with_capacity(layout.total_len));
    write(&mut out, &layout.header)?;
    write(&mut out, &layout.index)?;
    write(&mut out, &layout.hierarchy)?;
    expect_position(&mut out, layout.base, RecordKind::CGeoPrimitiveContainer)?;

    for entry in layout.entries.iter().filter(|e| e.emitted) {
        expect_position(&mut out, entry.offset, entry.kind)?;
        let bytes = match tree.encode_record(entry.kind) {
            Some(encoded) => encoded.map_err(|err| DrsError::from_record(entry.kind, err))?,
            None => Vec::new(),
        };
        if bytes.len() != entry.size {
            return Err(DrsError::SizeMismatch {
                kind: entry.kind,
                reported: entry.size,
                written: bytes.len(),
            });
        }
        out.write_all(&bytes)?;
    }

    let bytes = out.into_inner();
    info!(
        "wrote {} archive: {} records, {} bytes",
        archetype,
        layout.entries.iter().filter(|e| e.emitted).count(),
        bytes.len()
    );
    Ok(bytes)
}

fn expect_position<W: Seek>(out: &mut W, expected: usize, kind: RecordKind) -> Result<()> {
    let position = out.stream_position()? as usize;
    if position != expected {
        return Err(DrsError::SizeMismatch {
            kind,
            reported: expected,
            written: position,
        });
    }
    Ok(())
}
