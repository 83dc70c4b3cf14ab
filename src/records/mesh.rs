//! Render meshes: `CDspMeshFile` and its per-mesh vertex streams.
//!
//! ```text
//! CDspMeshFile     i32 magic | i32 zero | i32 mesh_count | Vector3 bbox[2]
//!                  | BattleforgeMesh[mesh_count] | Vector4 some_points[3]
//! BattleforgeMesh  i32 vertex_count | i32 face_count | Face[face_count]
//!                  | u8 mesh_count | MeshData[mesh_count] | Vector3 bbox[2]
//!                  | i16 material_id | MaterialBlock
//! MeshData         i32 revision | i32 stride | Vertex[vertex_count]
//! ```
//!
//! Each `MeshData` block is a parallel stream over the same vertices. Its revision picks the
//! attributes every vertex carries (see [`vertex_layout`]).

use std::io::{Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::error::variant_fault;
use crate::math::{Vector3, Vector4};
use crate::primitive::{list_size, read, read_count, read_list, write, write_count, write_list, Record};
use crate::records::geometry::Face;
use crate::records::material::MaterialBlock;

pub const MESH_FILE_MAGIC: i32 = 1314189598;
/// Older single-mesh layout without the counts or the trailing points.
pub const MESH_FILE_LEGACY_MAGIC: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexAttribute {
    Position,
    Normal,
    Texture,
    Tangent,
    Bitangent,
    RawWeights,
    BoneIndices,
    /// Four bytes after position and uv on decal meshes.
    Trailer,
}

impl VertexAttribute {
    pub fn size(self) -> usize {
        match self {
            VertexAttribute::Position
            | VertexAttribute::Normal
            | VertexAttribute::Tangent
            | VertexAttribute::Bitangent => 12,
            VertexAttribute::Texture => 8,
            VertexAttribute::RawWeights | VertexAttribute::BoneIndices | VertexAttribute::Trailer => 4,
        }
    }
}

/// Attributes in canonical stream order for a vertex revision.
pub fn vertex_layout(revision: i32) -> Option<&'static [VertexAttribute]> {
    use VertexAttribute::*;
    match revision {
        133121 | 134365185 | 536905729 | 134381569 => Some(&[Position, Normal, Texture]),
        12288 => Some(&[Tangent, Bitangent]),
        2049 => Some(&[Position, Normal]),
        12 => Some(&[RawWeights, BoneIndices]),
        163841 => Some(&[Position, Texture, Trailer]),
        _ => None,
    }
}

pub fn layout_stride(layout: &[VertexAttribute]) -> usize {
    layout.iter().map(|attribute| attribute.size()).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vertex {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Vector3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal: Option<Vector3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tangent: Option<Vector3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitangent: Option<Vector3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_weights: Option<[u8; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bone_indices: Option<[u8; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailer: Option<[u8; 4]>,
}

impl Vertex {
    fn has(&self, attribute: VertexAttribute) -> bool {
        match attribute {
            VertexAttribute::Position => self.position.is_some(),
            VertexAttribute::Normal => self.normal.is_some(),
            VertexAttribute::Texture => self.texture.is_some(),
            VertexAttribute::Tangent => self.tangent.is_some(),
            VertexAttribute::Bitangent => self.bitangent.is_some(),
            VertexAttribute::RawWeights => self.raw_weights.is_some(),
            VertexAttribute::BoneIndices => self.bone_indices.is_some(),
            VertexAttribute::Trailer => self.trailer.is_some(),
        }
    }

    /// Byte stride implied by the populated attributes.
    pub fn stride(&self) -> usize {
        const ALL: [VertexAttribute; 8] = [
            VertexAttribute::Position,
            VertexAttribute::Normal,
            VertexAttribute::Texture,
            VertexAttribute::Tangent,
            VertexAttribute::Bitangent,
            VertexAttribute::RawWeights,
            VertexAttribute::BoneIndices,
            VertexAttribute::Trailer,
        ];
        ALL.iter()
            .filter(|attribute| self.has(**attribute))
            .map(|attribute| attribute.size())
            .sum()
    }
}

impl BinRead for Vertex {
    /// Vertex revision.
    type Args<'a> = (i32,);

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, args: Self::Args<'_>) -> BinResult<Self> {
        let layout = vertex_layout(args.0).ok_or_else(|| variant_fault(reader, "MeshData", args.0.into()))?;
        let mut vertex = Vertex::default();
        for attribute in layout {
            match attribute {
                VertexAttribute::Position => vertex.position = Some(read(reader)?),
                VertexAttribute::Normal => vertex.normal = Some(read(reader)?),
                VertexAttribute::Texture => vertex.texture = Some(read(reader)?),
                VertexAttribute::Tangent => vertex.tangent = Some(read(reader)?),
                VertexAttribute::Bitangent => vertex.bitangent = Some(read(reader)?),
                VertexAttribute::RawWeights => vertex.raw_weights = Some(read(reader)?),
                VertexAttribute::BoneIndices => vertex.bone_indices = Some(read(reader)?),
                VertexAttribute::Trailer => vertex.trailer = Some(read(reader)?),
            }
        }
        Ok(vertex)
    }
}

impl BinWrite for Vertex {
    type Args<'a> = (i32,);

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, args: Self::Args<'_>) -> BinResult<()> {
        let layout = vertex_layout(args.0).ok_or_else(|| variant_fault(writer, "MeshData", args.0.into()))?;
        let pos = writer.stream_position()?;
        let missing = |name: &str| binrw::Error::AssertFail {
            pos,
            message: format!("revision {} vertex has no {}", args.0, name),
        };
        for attribute in layout {
            match attribute {
                VertexAttribute::Position => write(writer, &self.position.ok_or_else(|| missing("position"))?)?,
                VertexAttribute::Normal => write(writer, &self.normal.ok_or_else(|| missing("normal"))?)?,
                VertexAttribute::Texture => write(writer, &self.texture.ok_or_else(|| missing("uv"))?)?,
                VertexAttribute::Tangent => write(writer, &self.tangent.ok_or_else(|| missing("tangent"))?)?,
                VertexAttribute::Bitangent => write(writer, &self.bitangent.ok_or_else(|| missing("bitangent"))?)?,
                VertexAttribute::RawWeights => {
                    write(writer, &self.raw_weights.ok_or_else(|| missing("weights"))?)?
                }
                VertexAttribute::BoneIndices => {
                    write(writer, &self.bone_indices.ok_or_else(|| missing("bone indices"))?)?
                }
                VertexAttribute::Trailer => write(writer, &self.trailer.ok_or_else(|| missing("trailer"))?)?,
            }
        }
        Ok(())
    }
}

/// One vertex stream block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshData {
    pub revision: i32,
    pub vertices: Vec<Vertex>,
}

impl MeshData {
    /// Stride written to the stream, derived from what the vertices carry.
    pub fn stride(&self) -> usize {
        match self.vertices.first() {
            Some(vertex) => vertex.stride(),
            None => vertex_layout(self.revision).map_or(0, layout_stride),
        }
    }
}

impl BinRead for MeshData {
    /// Vertex count shared by every block of the mesh.
    type Args<'a> = (usize,);

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, args: Self::Args<'_>) -> BinResult<Self> {
        let revision: i32 = read(reader)?;
        let stride_pos = reader.stream_position()?;
        let stride: i32 = read(reader)?;
        let layout = vertex_layout(revision).ok_or_else(|| variant_fault(reader, "MeshData", revision.into()))?;
        if stride as usize != layout_stride(layout) {
            return Err(binrw::Error::AssertFail {
                pos: stride_pos,
                message: format!(
                    "revision {} declares stride {} but its layout is {} bytes",
                    revision,
                    stride,
                    layout_stride(layout)
                ),
            });
        }
        let mut vertices = Vec::with_capacity(args.0.min(65536));
        for _ in 0..args.0 {
            vertices.push(Vertex::read_options(reader, endian, (revision,))?);
        }
        Ok(MeshData { revision, vertices })
    }
}

impl BinWrite for MeshData {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: Endian, _: Self::Args<'_>) -> BinResult<()> {
        let layout = vertex_layout(self.revision)
            .ok_or_else(|| variant_fault(writer, "MeshData", self.revision.into()))?;
        let stride = self.stride();
        if stride != layout_stride(layout) || self.vertices.iter().any(|v| v.stride() != stride) {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: format!("vertices do not match the layout of revision {}", self.revision),
            });
        }
        write(writer, &self.revision)?;
        write(writer, &(stride as i32))?;
        for vertex in &self.vertices {
            vertex.write_options(writer, endian, (self.revision,))?;
        }
        Ok(())
    }
}

impl Record for MeshData {
    fn size(&self) -> usize {
        8 + self.vertices.iter().map(Vertex::stride).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleforgeMesh {
    pub vertex_count: i32,
    pub faces: Vec<Face>,
    pub mesh_data: Vec<MeshData>,
    pub bounding_box_lower_left_corner: Vector3,
    pub bounding_box_upper_right_corner: Vector3,
    pub material_id: i16,
    pub material: MaterialBlock,
}

impl BinRead for BattleforgeMesh {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let vertex_count: i32 = read(reader)?;
        let face_count = read_count::<i32, _>(reader, "face count")?;
        let faces = read_list(reader, face_count)?;
        let block_count = read_count::<u8, _>(reader, "mesh data count")?;
        let vertices = usize::try_from(vertex_count).map_err(|_| binrw::Error::AssertFail {
            pos: 0,
            message: format!("negative vertex count {}", vertex_count),
        })?;
        let mut mesh_data = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            mesh_data.push(MeshData::read_options(reader, endian, (vertices,))?);
        }
        Ok(BattleforgeMesh {
            vertex_count,
            faces,
            mesh_data,
            bounding_box_lower_left_corner: read(reader)?,
            bounding_box_upper_right_corner: read(reader)?,
            material_id: read(reader)?,
            material: read(reader)?,
        })
    }
}

impl BinWrite for BattleforgeMesh {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if let Some(block) = self
            .mesh_data
            .iter()
            .find(|block| block.vertices.len() != self.vertex_count as usize)
        {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: format!(
                    "revision {} block holds {} vertices, mesh declares {}",
                    block.revision,
                    block.vertices.len(),
                    self.vertex_count
                ),
            });
        }
        write(writer, &self.vertex_count)?;
        write_count::<i32, _>(writer, self.faces.len(), "face")?;
        write_list(writer, &self.faces)?;
        write_count::<u8, _>(writer, self.mesh_data.len(), "vertex block")?;
        write_list(writer, &self.mesh_data)?;
        write(writer, &self.bounding_box_lower_left_corner)?;
        write(writer, &self.bounding_box_upper_right_corner)?;
        write(writer, &self.material_id)?;
        write(writer, &self.material)
    }
}

impl Record for BattleforgeMesh {
    fn size(&self) -> usize {
        8 + list_size(&self.faces)
            + 1
            + list_size(&self.mesh_data)
            + 2 * Vector3::SIZE
            + 2
            + self.material.size()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CDspMeshFile {
    pub magic: i32,
    pub zero: i32,
    pub bounding_box_lower_left_corner: Vector3,
    pub bounding_box_upper_right_corner: Vector3,
    pub meshes: Vec<BattleforgeMesh>,
    pub some_points: [Vector4; 3],
}

impl Default for CDspMeshFile {
    fn default() -> Self {
        CDspMeshFile {
            magic: MESH_FILE_MAGIC,
            zero: 0,
            bounding_box_lower_left_corner: Vector3::default(),
            bounding_box_upper_right_corner: Vector3::default(),
            meshes: Vec::new(),
            some_points: [
                Vector4::new(0.0, 0.0, 0.0, 1.0),
                Vector4::new(1.0, 1.0, 0.0, 1.0),
                Vector4::new(0.0, 0.0, 1.0, 1.0),
            ],
        }
    }
}

impl BinRead for CDspMeshFile {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let magic: i32 = read(reader)?;
        match magic {
            MESH_FILE_MAGIC => {
                let zero = read(reader)?;
                let mesh_count = read_count::<i32, _>(reader, "mesh count")?;
                let bounding_box_lower_left_corner = read(reader)?;
                let bounding_box_upper_right_corner = read(reader)?;
                let meshes = read_list(reader, mesh_count)?;
                Ok(CDspMeshFile {
                    magic,
                    zero,
                    bounding_box_lower_left_corner,
                    bounding_box_upper_right_corner,
                    meshes,
                    some_points: read(reader)?,
                })
            }
            MESH_FILE_LEGACY_MAGIC => Ok(CDspMeshFile {
                magic,
                bounding_box_lower_left_corner: read(reader)?,
                bounding_box_upper_right_corner: read(reader)?,
                meshes: vec![read(reader)?],
                ..CDspMeshFile::default()
            }),
            other => Err(variant_fault(reader, "CDspMeshFile", other.into())),
        }
    }
}

impl BinWrite for CDspMeshFile {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        match self.magic {
            MESH_FILE_MAGIC => {
                write(writer, &self.magic)?;
                write(writer, &self.zero)?;
                write_count::<i32, _>(writer, self.meshes.len(), "mesh")?;
                write(writer, &self.bounding_box_lower_left_corner)?;
                write(writer, &self.bounding_box_upper_right_corner)?;
                write_list(writer, &self.meshes)?;
                write(writer, &self.some_points)
            }
            MESH_FILE_LEGACY_MAGIC if self.meshes.len() == 1 => {
                write(writer, &self.magic)?;
                write(writer, &self.bounding_box_lower_left_corner)?;
                write(writer, &self.bounding_box_upper_right_corner)?;
                write_list(writer, &self.meshes)
            }
            other => Err(variant_fault(writer, "CDspMeshFile", other.into())),
        }
    }
}

impl Record for CDspMeshFile {
    fn size(&self) -> usize {
        match self.magic {
            MESH_FILE_LEGACY_MAGIC => 4 + 2 * Vector3::SIZE + list_size(&self.meshes),
            _ => 12 + 2 * Vector3::SIZE + list_size(&self.meshes) + 3 * Vector4::SIZE,
        }
    }
}
