//! Index table: a fixed 32-byte root sentinel followed by one `NodeInformation` per record.
//!
//! Slot numbers count the root as slot 0, so `Node::info_index` and
//! `NodeInformation::linked_node` index the table directly.

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{binrw, BinResult, BinWrite, Endian};
use log::warn;
use serde::Serialize;

use crate::error::{DrsError, Result};
use crate::primitive::{read, read_list, write, write_list, Record};
use crate::records::RecordKind;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct RootNodeInformation {
    pub zeroes: [u8; 16],
    pub neg_one: i32,
    pub one: i32,
    pub node_information_count: i32,
    pub zero: i32,
}

impl RootNodeInformation {
    pub fn new(node_information_count: usize) -> Self {
        RootNodeInformation {
            zeroes: [0; 16],
            neg_one: -1,
            one: 1,
            node_information_count: node_information_count as i32,
            zero: 0,
        }
    }
}

impl Default for RootNodeInformation {
    fn default() -> Self {
        RootNodeInformation::new(0)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct NodeInformation {
    pub magic: i32,
    /// Position of the owning node in the hierarchy.
    pub identifier: i32,
    pub offset: i32,
    pub size: i32,
    pub uk1: i32,
    pub linked_node: i32,
    pub uk2: i32,
    pub uk3: i32,
}

impl NodeInformation {
    pub const SIZE: usize = 32;

    pub fn new(kind: RecordKind, identifier: i32) -> Self {
        NodeInformation {
            magic: kind.magic(),
            identifier,
            offset: -1,
            size: 0,
            uk1: 0,
            linked_node: -1,
            uk2: 0,
            uk3: 0,
        }
    }

    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::from_magic(self.magic)
    }

    pub fn is_alias(&self) -> bool {
        self.size == 0 && self.linked_node > 0
    }
}

/// Byte range of a payload inside the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub offset: i32,
    pub size: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct IndexTable {
    pub root: RootNodeInformation,
    pub entries: Vec<NodeInformation>,
}

impl IndexTable {
    /// Reads the sentinel and `node_count - 1` entries at `offset`. Any magic outside the
    /// record catalog aborts the parse, since an unknown chunk leaves nothing to resync on.
    pub fn parse<R: Read + Seek>(reader: &mut R, offset: u64, node_count: u32) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;
        let root: RootNodeInformation = read(reader)?;
        let entries: Vec<NodeInformation> = read_list(reader, node_count.saturating_sub(1) as usize)?;
        if let Some((position, entry)) = entries.iter().enumerate().find(|(_, e)| e.kind().is_none()) {
            return Err(DrsError::UnknownChunk {
                index: position + 1,
                magic: entry.magic,
            });
        }
        Ok(IndexTable { root, entries })
    }

    /// Entry at `slot`. Slot 0 is the root sentinel and has no entry.
    pub fn slot(&self, slot: usize) -> Option<&NodeInformation> {
        slot.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut NodeInformation> {
        slot.checked_sub(1).and_then(|i| self.entries.get_mut(i))
    }

    /// Slot holding the entry for `kind`.
    pub fn find(&self, kind: RecordKind) -> Option<usize> {
        self.entries.iter().position(|e| e.magic == kind.magic()).map(|i| i + 1)
    }

    /// Where the payload of `slot` lives. An alias borrows the extent of its linked entry.
    ///
    /// Only the primitive container may be empty, which yields `None`. Any other zero-size
    /// entry must link to a slot with a payload, or it is an alias fault.
    pub fn resolve_alias(&self, slot: usize) -> Result<Option<Extent>> {
        let entry = self.slot(slot).ok_or(DrsError::Alias {
            slot,
            linked_node: -1,
        })?;
        if entry.size != 0 {
            return Ok(Some(Extent {
                offset: entry.offset,
                size: entry.size,
            }));
        }
        if entry.kind() == Some(RecordKind::CGeoPrimitiveContainer) {
            return Ok(None);
        }
        let fault = DrsError::Alias {
            slot,
            linked_node: entry.linked_node,
        };
        let target_slot = usize::try_from(entry.linked_node).unwrap_or(0);
        match self.slot(target_slot) {
            Some(target) if target_slot != slot && target.size > 0 => {
                warn!(
                    "index slot {} is empty, using linked slot {} ({} bytes at offset {})",
                    slot, target_slot, target.size, target.offset
                );
                Ok(Some(Extent {
                    offset: target.offset,
                    size: target.size,
                }))
            }
            _ => Err(fault),
        }
    }

    /// Stores the encoded size of `kind` in its pre-allocated slot.
    pub fn register(&mut self, kind: RecordKind, size: usize, archetype: &'static str) -> Result<usize> {
        let slot = self.find(kind).ok_or(DrsError::NotInArchetype { kind, archetype })?;
        if let Some(entry) = self.slot_mut(slot) {
            entry.size = size as i32;
        }
        Ok(slot)
    }
}

impl BinWrite for IndexTable {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &self.root)?;
        write_list(writer, &self.entries)
    }
}

impl Record for IndexTable {
    fn size(&self) -> usize {
        NodeInformation::SIZE * (1 + self.entries.len())
    }
}
