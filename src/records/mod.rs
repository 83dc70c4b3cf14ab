//! Record catalog.
//!
//! Each top-level payload type lives in its own module. This module ties them to the magic
//! numbers of the index table and the type names of the hierarchy, and provides the
//! [`Payload`] sum type and the [`RecordTree`] the archive layer reads into and writes from.

use std::fmt;
use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::primitive::{read, to_bytes, Record};

pub mod animation_set;
pub mod animation_timings;
pub mod collision;
pub mod effect_set;
pub mod fx_master;
pub mod geometry;
pub mod joint_map;
pub mod locator;
pub mod material;
pub mod mesh;
pub mod mesh_grid;
pub mod resource_meta;
pub mod skeleton;

use animation_set::AnimationSet;
use animation_timings::AnimationTimings;
use collision::CollisionShape;
use effect_set::EffectSet;
use fx_master::FxMaster;
use geometry::{CGeoMesh, CGeoOBBTree, CGeoPrimitiveContainer};
use joint_map::CDspJointMap;
use locator::{CDrwLocatorList, CGdLocatorList};
use mesh::CDspMeshFile;
use mesh_grid::{MeshSetGrid, StateBasedMeshSet};
use resource_meta::DrwResourceMeta;
use skeleton::{CSkSkeleton, CSkSkinInfo};

/// Payload bytes kept verbatim for record types the codec does not interpret.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OpaqueChunk {
    pub bytes: Vec<u8>,
}

impl BinRead for OpaqueChunk {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(OpaqueChunk { bytes })
    }
}

impl BinWrite for OpaqueChunk {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        writer.write_all(&self.bytes)?;
        Ok(())
    }
}

impl Record for OpaqueChunk {
    fn size(&self) -> usize {
        self.bytes.len()
    }
}

macro_rules! record_catalog {
    ($($kind:ident($ty:ty) => $field:ident, $magic:literal, $name:literal;)*) => {
        /// Every record type the index table can name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum RecordKind {
            $($kind,)*
        }

        impl RecordKind {
            pub const ALL: &'static [RecordKind] = &[$(RecordKind::$kind,)*];

            pub fn magic(self) -> i32 {
                match self {
                    $(RecordKind::$kind => $magic,)*
                }
            }

            pub fn from_magic(magic: i32) -> Option<Self> {
                match magic {
                    $($magic => Some(RecordKind::$kind),)*
                    _ => None,
                }
            }

            /// Type name used by hierarchy nodes.
            pub fn name(self) -> &'static str {
                match self {
                    $(RecordKind::$kind => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(RecordKind::$kind),)*
                    _ => None,
                }
            }
        }

        /// One decoded top-level record.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub enum Payload {
            $($kind($ty),)*
        }

        impl Payload {
            pub fn kind(&self) -> RecordKind {
                match self {
                    $(Payload::$kind(_) => RecordKind::$kind,)*
                }
            }

            /// Decodes `bytes` as `kind`, returning the payload and the number of bytes consumed.
            pub fn decode(kind: RecordKind, bytes: &[u8]) -> BinResult<(Self, usize)> {
                let mut cursor = Cursor::new(bytes);
                let payload = match kind {
                    $(RecordKind::$kind => Payload::$kind(read(&mut cursor)?),)*
                };
                Ok((payload, cursor.position() as usize))
            }

            pub fn encode(&self) -> BinResult<Vec<u8>> {
                match self {
                    $(Payload::$kind(record) => to_bytes(record),)*
                }
            }
        }

        impl Record for Payload {
            fn size(&self) -> usize {
                match self {
                    $(Payload::$kind(record) => record.size(),)*
                }
            }
        }

        /// Decoded archive contents, one optional slot per record type.
        #[derive(Debug, Clone, PartialEq, Default, Serialize)]
        pub struct RecordTree {
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl RecordTree {
            /// Stores `payload` in its slot, returning whatever the slot held before.
            pub fn insert(&mut self, payload: Payload) -> Option<Payload> {
                match payload {
                    $(Payload::$kind(record) => self.$field.replace(record).map(Payload::$kind),)*
                }
            }

            pub fn contains(&self, kind: RecordKind) -> bool {
                match kind {
                    $(RecordKind::$kind => self.$field.is_some(),)*
                }
            }

            pub fn take(&mut self, kind: RecordKind) -> Option<Payload> {
                match kind {
                    $(RecordKind::$kind => self.$field.take().map(Payload::$kind),)*
                }
            }

            /// Encoded size of the record in `kind`'s slot.
            pub fn record_size(&self, kind: RecordKind) -> Option<usize> {
                match kind {
                    $(RecordKind::$kind => self.$field.as_ref().map(Record::size),)*
                }
            }

            pub fn encode_record(&self, kind: RecordKind) -> Option<BinResult<Vec<u8>>> {
                match kind {
                    $(RecordKind::$kind => self.$field.as_ref().map(to_bytes),)*
                }
            }
        }
    };
}

record_catalog! {
    CDspJointMap(CDspJointMap) => joint_map, -1340635850, "CDspJointMap";
    CGeoMesh(CGeoMesh) => geo_mesh, 100449016, "CGeoMesh";
    CGeoOBBTree(CGeoOBBTree) => obb_tree, -933519637, "CGeoOBBTree";
    CSkSkinInfo(CSkSkinInfo) => skin_info, -761174227, "CSkSkinInfo";
    CDspMeshFile(CDspMeshFile) => mesh_file, -1900395636, "CDspMeshFile";
    DrwResourceMeta(DrwResourceMeta) => resource_meta, -183033339, "DrwResourceMeta";
    CollisionShape(CollisionShape) => collision_shape, 268607026, "collisionShape";
    CGeoPrimitiveContainer(CGeoPrimitiveContainer) => primitive_container, 1396683476, "CGeoPrimitiveContainer";
    CSkSkeleton(CSkSkeleton) => skeleton, -2110567991, "CSkSkeleton";
    CDrwLocatorList(CDrwLocatorList) => locator_list, 735146985, "CDrwLocatorList";
    AnimationSet(AnimationSet) => animation_set, -475734043, "AnimationSet";
    AnimationTimings(AnimationTimings) => animation_timings, -1403092629, "AnimationTimings";
    EffectSet(EffectSet) => effect_set, 688490554, "EffectSet";
    CGdLocatorList(CGdLocatorList) => gd_locator_list, -196433635, "CGdLocatorList";
    FxMaster(FxMaster) => fx_master, -1424862619, "FxMaster";
    PlacementShape(OpaqueChunk) => placement_shape, -1746446328, "placementShape";
    MeshSetGrid(MeshSetGrid) => mesh_set_grid, 154295579, "MeshSetGrid";
    StateBasedMeshSet(StateBasedMeshSet) => state_based_mesh_set, 120902304, "StateBasedMeshSet";
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl RecordTree {
    pub fn kinds(&self) -> impl Iterator<Item = RecordKind> + '_ {
        RecordKind::ALL.iter().copied().filter(|kind| self.contains(*kind))
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().next().is_none()
    }
}
