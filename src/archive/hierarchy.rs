use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{binrw, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::error::Result;
use crate::primitive::{list_size, read, read_list, write, write_list, PString, Record};
use crate::records::RecordKind;

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct RootNode {
    pub identifier: i32,
    pub unknown: i32,
    pub name: PString,
}

impl Default for RootNode {
    fn default() -> Self {
        RootNode {
            identifier: 0,
            unknown: 0,
            name: PString::new("root node"),
        }
    }
}

impl Record for RootNode {
    fn size(&self) -> usize {
        8 + self.name.size()
    }
}

/// Named hierarchy entry. `info_index` is a slot in the index table, not an owning link:
/// two nodes may point at slots that alias the same bytes.
#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct Node {
    pub info_index: i32,
    pub name: PString,
    pub zero: i32,
}

impl Node {
    pub fn new(kind: RecordKind, info_index: usize) -> Self {
        Node {
            info_index: info_index as i32,
            name: PString::new(kind.name()),
            zero: 0,
        }
    }

    /// Record type the node's name claims.
    pub fn declared_kind(&self) -> Option<RecordKind> {
        RecordKind::from_name(&self.name.as_str())
    }
}

impl Record for Node {
    fn size(&self) -> usize {
        8 + self.name.size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Hierarchy {
    pub root: RootNode,
    pub nodes: Vec<Node>,
}

impl Hierarchy {
    /// Reads the root sentinel and `node_count - 1` nodes in file order.
    pub fn parse<R: Read + Seek>(reader: &mut R, offset: u64, node_count: u32) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;
        let root = read(reader)?;
        let nodes = read_list(reader, node_count.saturating_sub(1) as usize)?;
        Ok(Hierarchy { root, nodes })
    }
}

impl BinWrite for Hierarchy {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &self.root)?;
        write_list(writer, &self.nodes)
    }
}

impl Record for Hierarchy {
    fn size(&self) -> usize {
        self.root.size() + list_size(&self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::to_bytes;
    use std::io::Cursor;

    #[test]
    fn write_and_reparse_hierarchy() {
        let hierarchy = Hierarchy {
            root: RootNode::default(),
            nodes: vec![
                Node::new(RecordKind::CGeoMesh, 1),
                Node::new(RecordKind::CollisionShape, 2),
            ],
        };
        let mut bytes = vec![0xAA; 6];
        bytes.extend(to_bytes(&hierarchy).unwrap());
        assert_eq!(bytes.len() - 6, hierarchy.size());
        assert_eq!(hierarchy.root.size(), 21);

        let reparsed = Hierarchy::parse(&mut Cursor::new(&bytes), 6, 3).unwrap();
        assert_eq!(reparsed, hierarchy);
        assert_eq!(reparsed.nodes[1].name.as_str(), "collisionShape");
        assert_eq!(reparsed.nodes[1].declared_kind(), Some(RecordKind::CollisionShape));
    }

    #[test]
    fn unknown_node_name_has_no_declared_kind() {
        let node = Node {
            info_index: 1,
            name: PString::new("CGeoSomething"),
            zero: 0,
        };
        assert_eq!(node.declared_kind(), None);
    }
}
