use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::error::variant_fault;
use crate::math::{CoordinateSystem, Vector4};
use crate::primitive::{list_size, read, read_count, read_list, write, write_count, write_list, Record};

pub const OBB_TREE_MAGIC: i32 = 1845540702;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct Face {
    pub indices: [u16; 3],
}

impl Record for Face {
    fn size(&self) -> usize {
        6
    }
}

/// Collision and picking geometry: a triangle list over homogeneous points.
#[binrw]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[brw(little)]
pub struct CGeoMesh {
    pub magic: i32,

    #[br(temp, assert(index_count >= 0, "negative index count {}", index_count))]
    #[bw(calc = (faces.len() * 3) as i32)]
    index_count: i32,

    #[br(count = index_count as usize / 3)]
    pub faces: Vec<Face>,

    #[br(temp, assert(vertex_count >= 0, "negative vertex count {}", vertex_count))]
    #[bw(try_calc = i32::try_from(vertices.len()))]
    vertex_count: i32,

    #[br(count = vertex_count as usize)]
    pub vertices: Vec<Vector4>,
}

impl Default for CGeoMesh {
    fn default() -> Self {
        CGeoMesh {
            magic: 1,
            faces: Vec::new(),
            vertices: Vec::new(),
        }
    }
}

impl Record for CGeoMesh {
    fn size(&self) -> usize {
        12 + list_size(&self.faces) + list_size(&self.vertices)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct OBBNode {
    pub oriented_bounding_box: CoordinateSystem,
    pub first_child_index: u16,
    pub second_child_index: u16,
    pub skip_pointer: u16,
    pub node_depth: u16,
    pub triangle_offset: u32,
    pub total_triangles: u32,
}

impl Record for OBBNode {
    fn size(&self) -> usize {
        CoordinateSystem::SIZE + 16
    }
}

/// Oriented bounding box tree over the collision faces.
///
/// Version 3 carries the node and face lists. Version 1 trees stop after the version word.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CGeoOBBTree {
    pub magic: i32,
    pub version: i32,
    pub obb_nodes: Vec<OBBNode>,
    pub faces: Vec<Face>,
}

impl Default for CGeoOBBTree {
    fn default() -> Self {
        CGeoOBBTree {
            magic: OBB_TREE_MAGIC,
            version: 3,
            obb_nodes: Vec::new(),
            faces: Vec::new(),
        }
    }
}

impl BinRead for CGeoOBBTree {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let magic = read(reader)?;
        let version: i32 = read(reader)?;
        match version {
            1 => Ok(CGeoOBBTree {
                magic,
                version,
                obb_nodes: Vec::new(),
                faces: Vec::new(),
            }),
            3 => {
                let node_count = read_count::<i32, _>(reader, "OBB node count")?;
                let obb_nodes = read_list(reader, node_count)?;
                let face_count = read_count::<i32, _>(reader, "triangle count")?;
                Ok(CGeoOBBTree {
                    magic,
                    version,
                    obb_nodes,
                    faces: read_list(reader, face_count)?,
                })
            }
            other => Err(variant_fault(reader, "CGeoOBBTree", other.into())),
        }
    }
}

impl BinWrite for CGeoOBBTree {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        match self.version {
            1 => {
                write(writer, &self.magic)?;
                write(writer, &self.version)
            }
            3 => {
                write(writer, &self.magic)?;
                write(writer, &self.version)?;
                write_count::<i32, _>(writer, self.obb_nodes.len(), "OBB node")?;
                write_list(writer, &self.obb_nodes)?;
                write_count::<i32, _>(writer, self.faces.len(), "face")?;
                write_list(writer, &self.faces)
            }
            other => Err(variant_fault(writer, "CGeoOBBTree", other.into())),
        }
    }
}

impl Record for CGeoOBBTree {
    fn size(&self) -> usize {
        match self.version {
            1 => 8,
            _ => 16 + list_size(&self.obb_nodes) + list_size(&self.faces),
        }
    }
}

/// Placeholder slot that every archetype carries. It has no payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CGeoPrimitiveContainer;

impl BinRead for CGeoPrimitiveContainer {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(_: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        Ok(CGeoPrimitiveContainer)
    }
}

impl BinWrite for CGeoPrimitiveContainer {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, _: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        Ok(())
    }
}

impl Record for CGeoPrimitiveContainer {
    fn size(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use crate::primitive::{from_bytes, to_bytes};

    fn make_test_geo_mesh() -> CGeoMesh {
        CGeoMesh {
            faces: vec![Face { indices: [0, 1, 2] }, Face { indices: [2, 1, 3] }],
            vertices: (0..4)
                .map(|i| Vector4::new(i as f32, 0.0, (i * 2) as f32, 1.0))
                .collect(),
            ..CGeoMesh::default()
        }
    }

    #[test]
    fn geo_mesh_stores_index_count_not_face_count() {
        let mesh = make_test_geo_mesh();
        let bytes = to_bytes(&mesh).unwrap();
        assert_eq!(&bytes[4..8], &6i32.to_le_bytes());
        assert_eq!(mesh.size(), bytes.len());

        let reparsed: CGeoMesh = from_bytes(&bytes).unwrap();
        assert_eq!(reparsed, mesh);
    }

    #[test]
    fn write_and_reparse_obb_tree() {
        let tree = CGeoOBBTree {
            obb_nodes: vec![
                OBBNode {
                    oriented_bounding_box: CoordinateSystem {
                        position: Vector3::new(0.5, 0.5, 0.5),
                        ..CoordinateSystem::default()
                    },
                    first_child_index: 1,
                    second_child_index: 2,
                    total_triangles: 2,
                    ..OBBNode::default()
                },
                OBBNode {
                    node_depth: 1,
                    total_triangles: 1,
                    ..OBBNode::default()
                },
            ],
            faces: vec![Face { indices: [0, 1, 2] }, Face { indices: [2, 1, 3] }],
            ..CGeoOBBTree::default()
        };
        let bytes = to_bytes(&tree).unwrap();
        assert_eq!(tree.size(), bytes.len());
        let reparsed: CGeoOBBTree = from_bytes(&bytes).unwrap();
        assert_eq!(reparsed, tree);
    }

    #[test]
    fn version_one_obb_tree_is_header_only() {
        let mut raw = OBB_TREE_MAGIC.to_le_bytes().to_vec();
        raw.extend_from_slice(&1i32.to_le_bytes());
        let tree: CGeoOBBTree = from_bytes(&raw).unwrap();
        assert_eq!(tree.version, 1);
        assert!(tree.obb_nodes.is_empty());
        assert_eq!(tree.size(), 8);
        assert_eq!(to_bytes(&tree).unwrap(), raw);
    }

    #[test]
    fn unknown_obb_tree_version_is_rejected() {
        let mut raw = OBB_TREE_MAGIC.to_le_bytes().to_vec();
        raw.extend_from_slice(&2i32.to_le_bytes());
        assert!(from_bytes::<CGeoOBBTree>(&raw).is_err());
    }

    #[test]
    fn primitive_container_is_empty() {
        let container: CGeoPrimitiveContainer = from_bytes(&[]).unwrap();
        assert_eq!(container.size(), 0);
        assert!(to_bytes(&container).unwrap().is_empty());
    }
}
