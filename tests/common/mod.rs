#![allow(dead_code)]

use drs_codec::archive::{DrsHeader, Hierarchy, IndexTable, Node, NodeInformation, RootNode, RootNodeInformation};
use drs_codec::math::{Vector3, Vector4};
use drs_codec::primitive::{to_bytes, PString, Record};
use drs_codec::records::fx_master::{Element, ElementBody, FxMaster, NodeLink, StaticTrack, StaticValue};
use drs_codec::records::geometry::{CGeoMesh, CGeoPrimitiveContainer, Face};
use drs_codec::records::joint_map::{CDspJointMap, JointGroup};
use drs_codec::records::material::{Material, MaterialBlock, MaterialProperty, MATERIAL_MINIMAL};
use drs_codec::records::mesh::{BattleforgeMesh, CDspMeshFile, MeshData, Vertex};
use drs_codec::records::resource_meta::DrwResourceMeta;
use drs_codec::records::{OpaqueChunk, Payload, RecordTree};
use drs_codec::{Archetype, RecordKind};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn make_test_geo_mesh() -> CGeoMesh {
    CGeoMesh {
        magic: 1,
        faces: vec![Face { indices: [0, 1, 2] }],
        vertices: vec![
            Vector4::new(0.0, 0.0, 0.0, 1.0),
            Vector4::new(1.0, 0.0, 0.0, 1.0),
            Vector4::new(0.0, 1.0, 0.0, 1.0),
        ],
    }
}

pub fn make_test_vertex(i: u16) -> Vertex {
    let f = f32::from(i);
    Vertex {
        position: Some(Vector3::new(f, 2.0 * f, 0.5)),
        normal: Some(Vector3::new(0.0, 0.0, 1.0)),
        texture: Some([f / 3.0, 1.0 - f / 3.0]),
        ..Vertex::default()
    }
}

/// One three-vertex mesh with a revision 133121 stream and a minimal material.
pub fn make_test_mesh_file() -> CDspMeshFile {
    let mesh = BattleforgeMesh {
        vertex_count: 3,
        faces: vec![Face { indices: [0, 1, 2] }],
        mesh_data: vec![MeshData {
            revision: 133121,
            vertices: (0..3).map(make_test_vertex).collect(),
        }],
        bounding_box_lower_left_corner: Vector3::new(0.0, 0.0, 0.5),
        bounding_box_upper_right_corner: Vector3::new(2.0, 4.0, 0.5),
        material_id: 25702,
        material: MaterialBlock {
            discriminant: MATERIAL_MINIMAL,
            materials: vec![Material {
                property: MaterialProperty::Smoothness,
                value: 0.25,
            }],
            ..MaterialBlock::default()
        },
    };
    CDspMeshFile {
        bounding_box_lower_left_corner: mesh.bounding_box_lower_left_corner,
        bounding_box_upper_right_corner: mesh.bounding_box_upper_right_corner,
        meshes: vec![mesh],
        ..CDspMeshFile::default()
    }
}

pub fn make_test_joint_map() -> CDspJointMap {
    CDspJointMap {
        joint_groups: vec![JointGroup { joints: vec![0, 1] }],
        ..CDspJointMap::default()
    }
}

pub fn make_test_resource_meta() -> DrwResourceMeta {
    DrwResourceMeta {
        hash: PString::new("0f1e2d3c4b5a69788796a5b4c3d2e1f0"),
        ..DrwResourceMeta::default()
    }
}

/// A single light element with its scope and the two outer ones closed.
pub fn make_test_fx_master() -> FxMaster {
    FxMaster {
        setup_file_name: PString::new("fx_torch.xml"),
        length: 1.5,
        play_length: 1.5,
        static_tracks: vec![StaticTrack {
            track_type: 2,
            value: StaticValue::Float(0.5),
        }],
        elements: vec![Element {
            node_link: NodeLink {
                version: 2,
                slot: PString::new("torch_tip"),
                ..NodeLink::default()
            },
            name: PString::new("flame_light"),
            body: ElementBody::Light {
                range: 6,
                radiance: 1.25,
            },
            track_markers: 2,
            static_tracks: Vec::new(),
            tracks: Vec::new(),
            closing_markers: 3,
        }],
        ..FxMaster::default()
    }
}

/// Records of a static prop without collision shape.
pub fn make_test_static_tree() -> RecordTree {
    RecordTree {
        geo_mesh: Some(make_test_geo_mesh()),
        mesh_file: Some(make_test_mesh_file()),
        joint_map: Some(make_test_joint_map()),
        resource_meta: Some(make_test_resource_meta()),
        primitive_container: Some(CGeoPrimitiveContainer),
        ..RecordTree::default()
    }
}

/// A small but non-empty record of every kind.
pub fn make_test_payload(kind: RecordKind) -> Payload {
    match kind {
        RecordKind::CDspJointMap => Payload::CDspJointMap(make_test_joint_map()),
        RecordKind::CGeoMesh => Payload::CGeoMesh(make_test_geo_mesh()),
        RecordKind::CGeoOBBTree => Payload::CGeoOBBTree(Default::default()),
        RecordKind::CSkSkinInfo => Payload::CSkSkinInfo(Default::default()),
        RecordKind::CDspMeshFile => Payload::CDspMeshFile(make_test_mesh_file()),
        RecordKind::DrwResourceMeta => Payload::DrwResourceMeta(make_test_resource_meta()),
        RecordKind::CollisionShape => Payload::CollisionShape(Default::default()),
        RecordKind::CGeoPrimitiveContainer => Payload::CGeoPrimitiveContainer(CGeoPrimitiveContainer),
        RecordKind::CSkSkeleton => Payload::CSkSkeleton(Default::default()),
        RecordKind::CDrwLocatorList => Payload::CDrwLocatorList(Default::default()),
        RecordKind::AnimationSet => Payload::AnimationSet(Default::default()),
        RecordKind::AnimationTimings => Payload::AnimationTimings(Default::default()),
        RecordKind::EffectSet => Payload::EffectSet(Default::default()),
        RecordKind::CGdLocatorList => Payload::CGdLocatorList(Default::default()),
        RecordKind::FxMaster => Payload::FxMaster(make_test_fx_master()),
        RecordKind::PlacementShape => Payload::PlacementShape(OpaqueChunk { bytes: vec![5, 6, 7, 8] }),
        RecordKind::MeshSetGrid => Payload::MeshSetGrid(Default::default()),
        RecordKind::StateBasedMeshSet => Payload::StateBasedMeshSet(Default::default()),
    }
}

/// Every slot of `archetype` populated.
pub fn make_test_full_tree(archetype: Archetype) -> RecordTree {
    let mut tree = RecordTree::default();
    for (kind, _) in archetype.slots() {
        tree.insert(make_test_payload(*kind));
    }
    tree
}

/// One hand-placed node for [`build_raw_archive`].
pub struct RawNode {
    pub name: String,
    pub magic: i32,
    pub payload: Vec<u8>,
    /// Slot to borrow the payload from when `payload` is empty. `-1` for none.
    pub linked_node: i32,
}

impl RawNode {
    pub fn new(kind: RecordKind, payload: Vec<u8>) -> Self {
        RawNode {
            name: kind.name().to_string(),
            magic: kind.magic(),
            payload,
            linked_node: -1,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_magic(mut self, magic: i32) -> Self {
        self.magic = magic;
        self
    }

    pub fn linked_to(mut self, slot: i32) -> Self {
        self.linked_node = slot;
        self
    }
}

/// Assembles an archive node by node, bypassing the archetype tables, so tests can inject
/// mismatched names, aliases and unknown magics. Node n sits in index slot n + 1.
pub fn build_raw_archive(nodes: &[RawNode]) -> Vec<u8> {
    let hierarchy = Hierarchy {
        root: RootNode::default(),
        nodes: nodes
            .iter()
            .enumerate()
            .map(|(i, node)| Node {
                info_index: i as i32 + 1,
                name: PString::new(&node.name),
                zero: 0,
            })
            .collect(),
    };
    let mut index = IndexTable {
        root: RootNodeInformation::new(nodes.len()),
        entries: Vec::with_capacity(nodes.len()),
    };

    let index_table_offset = DrsHeader::SIZE;
    let hierarchy_offset = index_table_offset + NodeInformation::SIZE * (nodes.len() + 1);
    let mut offset = hierarchy_offset + hierarchy.size();
    for (i, node) in nodes.iter().enumerate() {
        index.entries.push(NodeInformation {
            magic: node.magic,
            identifier: i as i32 + 1,
            offset: offset as i32,
            size: node.payload.len() as i32,
            uk1: 0,
            linked_node: node.linked_node,
            uk2: 0,
            uk3: 0,
        });
        offset += node.payload.len();
    }

    let header = DrsHeader {
        index_table_offset: index_table_offset as i32,
        hierarchy_offset: hierarchy_offset as i32,
        node_count: nodes.len() as u32 + 1,
        ..DrsHeader::default()
    };

    let mut bytes = to_bytes(&header).unwrap();
    bytes.extend(to_bytes(&index).unwrap());
    bytes.extend(to_bytes(&hierarchy).unwrap());
    for node in nodes {
        bytes.extend_from_slice(&node.payload);
    }
    assert_eq!(bytes.len(), offset);
    bytes
}

/// Offset of the first differing byte, or `None` when equal.
pub fn diff_bytes(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}
