//! Bind-pose skeleton (`CSkSkeleton`) and per-vertex skin weights (`CSkSkinInfo`).

use binrw::binrw;
use serde::Serialize;

use crate::math::{Matrix4x4, Vector3};
use crate::primitive::{list_size, PString, Record};

pub const SKELETON_MAGIC: i32 = 1558308612;

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct Bone {
    pub version: u32,
    pub identifier: i32,
    pub name: PString,

    #[br(temp, assert(child_count >= 0, "negative child count {}", child_count))]
    #[bw(try_calc = i32::try_from(children.len()))]
    child_count: i32,

    #[br(count = child_count as usize)]
    pub children: Vec<i32>,
}

impl Record for Bone {
    fn size(&self) -> usize {
        8 + self.name.size() + 4 + 4 * self.children.len()
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct BoneVertex {
    pub position: Vector3,
    pub parent: i32,
}

/// Four rows of the bind matrix, each row paired with a parent marker.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct BoneMatrix {
    pub bone_vertices: [BoneVertex; 4],
}

impl Record for BoneMatrix {
    fn size(&self) -> usize {
        4 * (Vector3::SIZE + 4)
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[brw(little)]
pub struct CSkSkeleton {
    pub magic: i32,
    pub version: i32,

    #[br(temp, assert(bone_matrix_count >= 0, "negative bone matrix count {}", bone_matrix_count))]
    #[bw(try_calc = i32::try_from(bone_matrices.len()))]
    bone_matrix_count: i32,

    #[br(count = bone_matrix_count as usize)]
    pub bone_matrices: Vec<BoneMatrix>,

    #[br(temp, assert(bone_count >= 0, "negative bone count {}", bone_count))]
    #[bw(try_calc = i32::try_from(bones.len()))]
    bone_count: i32,

    #[br(count = bone_count as usize)]
    pub bones: Vec<Bone>,

    pub super_parent: Matrix4x4,
}

impl Default for CSkSkeleton {
    fn default() -> Self {
        CSkSkeleton {
            magic: SKELETON_MAGIC,
            version: 3,
            bone_matrices: Vec::new(),
            bones: Vec::new(),
            super_parent: Matrix4x4::default(),
        }
    }
}

impl Record for CSkSkeleton {
    fn size(&self) -> usize {
        16 + list_size(&self.bone_matrices) + list_size(&self.bones) + Matrix4x4::SIZE
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct VertexWeights {
    pub weights: [f32; 4],
    pub bone_indices: [i32; 4],
}

impl Record for VertexWeights {
    fn size(&self) -> usize {
        32
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[brw(little)]
pub struct CSkSkinInfo {
    pub version: i32,

    #[br(temp, assert(vertex_count >= 0, "negative vertex count {}", vertex_count))]
    #[bw(try_calc = i32::try_from(vertex_data.len()))]
    vertex_count: i32,

    #[br(count = vertex_count as usize)]
    pub vertex_data: Vec<VertexWeights>,
}

impl Default for CSkSkinInfo {
    fn default() -> Self {
        CSkSkinInfo {
            version: 1,
            vertex_data: Vec::new(),
        }
    }
}

impl Record for CSkSkinInfo {
    fn size(&self) -> usize {
        8 + list_size(&self.vertex_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{from_bytes, to_bytes};

    fn make_test_skeleton() -> CSkSkeleton {
        let matrix = |offset: f32| BoneMatrix {
            bone_vertices: [
                BoneVertex { position: Vector3::new(1.0, 0.0, 0.0), parent: 0 },
                BoneVertex { position: Vector3::new(0.0, 1.0, 0.0), parent: 0 },
                BoneVertex { position: Vector3::new(0.0, 0.0, 1.0), parent: 0 },
                BoneVertex { position: Vector3::new(0.0, offset, 0.0), parent: -1 },
            ],
        };
        CSkSkeleton {
            bone_matrices: vec![matrix(0.0), matrix(1.5)],
            bones: vec![
                Bone {
                    identifier: 0,
                    name: PString::new("Bip01"),
                    children: vec![1],
                    ..Bone::default()
                },
                Bone {
                    identifier: 1,
                    name: PString::new("Bip01 Spine"),
                    ..Bone::default()
                },
            ],
            ..CSkSkeleton::default()
        }
    }

    #[test]
    fn skeleton_size_matches_written() {
        let skeleton = make_test_skeleton();
        let bytes = to_bytes(&skeleton).unwrap();
        assert_eq!(skeleton.size(), bytes.len());
        assert_eq!(&bytes[8..12], &2i32.to_le_bytes());
    }

    #[test]
    fn write_and_reparse_skeleton() {
        let skeleton = make_test_skeleton();
        let reparsed: CSkSkeleton = from_bytes(&to_bytes(&skeleton).unwrap()).unwrap();
        assert_eq!(reparsed, skeleton);
        assert_eq!(reparsed.bones[1].name.as_str(), "Bip01 Spine");
    }

    #[test]
    fn long_bone_names_are_kept_verbatim() {
        let name = "building_bandits_air_defense_launcher_".repeat(3);
        let bone = Bone {
            name: PString::new(&name),
            ..Bone::default()
        };
        let reparsed: Bone = from_bytes(&to_bytes(&bone).unwrap()).unwrap();
        assert_eq!(reparsed.name.as_str(), name);
    }

    #[test]
    fn write_and_reparse_skin_info() {
        let skin = CSkSkinInfo {
            vertex_data: vec![
                VertexWeights { weights: [1.0, 0.0, 0.0, 0.0], bone_indices: [0, 0, 0, 0] },
                VertexWeights { weights: [0.5, 0.5, 0.0, 0.0], bone_indices: [0, 1, 0, 0] },
            ],
            ..CSkSkinInfo::default()
        };
        let bytes = to_bytes(&skin).unwrap();
        assert_eq!(skin.size(), bytes.len());
        assert_eq!(from_bytes::<CSkSkinInfo>(&bytes).unwrap(), skin);
    }
}
