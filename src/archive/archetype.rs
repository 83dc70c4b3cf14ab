//! Model archetypes: which record slots an archive declares and the order payloads are
//! written in.
//!
//! Each slot table lists `(kind, info_index)` in hierarchy order, so the n-th entry becomes
//! the n-th hierarchy node and carries identifier n. The write order is independent of it.

use serde::{Deserialize, Serialize};

use crate::records::{RecordKind, RecordKind::*, RecordTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    AnimatedUnit,
    StaticObjectCollision,
    StaticObjectNoCollision,
    AnimatedObjectNoCollision,
    AnimatedObjectCollision,
    /// `.bmg` building grid.
    BuildingGrid,
    /// `.bms` state-based mesh set.
    StateMeshSet,
}

const ANIMATED_UNIT_SLOTS: &[(RecordKind, usize)] = &[
    (CGeoMesh, 1),
    (CGeoOBBTree, 8),
    (CDspJointMap, 7),
    (CSkSkinInfo, 9),
    (CSkSkeleton, 4),
    (CDspMeshFile, 5),
    (CDrwLocatorList, 3),
    (DrwResourceMeta, 11),
    (AnimationSet, 10),
    (AnimationTimings, 6),
    (EffectSet, 2),
];

const ANIMATED_UNIT_WRITE_ORDER: &[RecordKind] = &[
    CDspJointMap,
    CSkSkinInfo,
    CSkSkeleton,
    CDspMeshFile,
    CDrwLocatorList,
    DrwResourceMeta,
    CGeoOBBTree,
    CGeoMesh,
    AnimationSet,
    AnimationTimings,
    EffectSet,
];

const STATIC_COLLISION_SLOTS: &[(RecordKind, usize)] = &[
    (CGeoMesh, 1),
    (CGeoOBBTree, 5),
    (CDspJointMap, 4),
    (CDspMeshFile, 3),
    (DrwResourceMeta, 6),
    (CGeoPrimitiveContainer, 2),
    (CollisionShape, 7),
];

const STATIC_COLLISION_WRITE_ORDER: &[RecordKind] = &[
    CDspJointMap,
    CDspMeshFile,
    DrwResourceMeta,
    CGeoPrimitiveContainer,
    CGeoOBBTree,
    CGeoMesh,
    CollisionShape,
];

const STATIC_SLOTS: &[(RecordKind, usize)] = &[
    (CGeoMesh, 1),
    (CGeoOBBTree, 4),
    (CDspJointMap, 3),
    (CDspMeshFile, 2),
    (DrwResourceMeta, 5),
];

const STATIC_WRITE_ORDER: &[RecordKind] = &[CDspJointMap, CDspMeshFile, DrwResourceMeta, CGeoOBBTree, CGeoMesh];

const ANIMATED_SLOTS: &[(RecordKind, usize)] = &[
    (CGeoMesh, 1),
    (CGeoOBBTree, 6),
    (CDspJointMap, 5),
    (CSkSkinInfo, 7),
    (CSkSkeleton, 2),
    (CDspMeshFile, 3),
    (DrwResourceMeta, 9),
    (AnimationSet, 8),
    (AnimationTimings, 4),
];

const ANIMATED_WRITE_ORDER: &[RecordKind] = &[
    CDspJointMap,
    CSkSkinInfo,
    CSkSkeleton,
    CDspMeshFile,
    DrwResourceMeta,
    CGeoOBBTree,
    CGeoMesh,
    AnimationSet,
    AnimationTimings,
];

const ANIMATED_COLLISION_SLOTS: &[(RecordKind, usize)] = &[
    (CGeoMesh, 1),
    (CGeoOBBTree, 7),
    (CDspJointMap, 6),
    (CSkSkinInfo, 8),
    (CSkSkeleton, 3),
    (CDspMeshFile, 4),
    (DrwResourceMeta, 10),
    (AnimationSet, 9),
    (AnimationTimings, 5),
    (CGeoPrimitiveContainer, 2),
    (CollisionShape, 11),
];

const ANIMATED_COLLISION_WRITE_ORDER: &[RecordKind] = &[
    CDspJointMap,
    CSkSkinInfo,
    CSkSkeleton,
    CDspMeshFile,
    DrwResourceMeta,
    CGeoPrimitiveContainer,
    CGeoOBBTree,
    CGeoMesh,
    AnimationSet,
    AnimationTimings,
    CollisionShape,
];

const BUILDING_GRID_SLOTS: &[(RecordKind, usize)] = &[
    (MeshSetGrid, 1),
    (AnimationSet, 2),
    (AnimationTimings, 3),
    (CGeoPrimitiveContainer, 4),
    (CollisionShape, 5),
    (EffectSet, 6),
];

const BUILDING_GRID_WRITE_ORDER: &[RecordKind] = &[
    MeshSetGrid,
    AnimationSet,
    AnimationTimings,
    CGeoPrimitiveContainer,
    CollisionShape,
    EffectSet,
];

const STATE_MESH_SET_SLOTS: &[(RecordKind, usize)] = &[(StateBasedMeshSet, 1)];

const STATE_MESH_SET_WRITE_ORDER: &[RecordKind] = &[StateBasedMeshSet];

impl Archetype {
    pub const ALL: &'static [Archetype] = &[
        Archetype::AnimatedUnit,
        Archetype::StaticObjectCollision,
        Archetype::StaticObjectNoCollision,
        Archetype::AnimatedObjectNoCollision,
        Archetype::AnimatedObjectCollision,
        Archetype::BuildingGrid,
        Archetype::StateMeshSet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Archetype::AnimatedUnit => "AnimatedUnit",
            Archetype::StaticObjectCollision => "StaticObjectCollision",
            Archetype::StaticObjectNoCollision => "StaticObjectNoCollision",
            Archetype::AnimatedObjectNoCollision => "AnimatedObjectNoCollision",
            Archetype::AnimatedObjectCollision => "AnimatedObjectCollision",
            Archetype::BuildingGrid => "BuildingGrid",
            Archetype::StateMeshSet => "StateMeshSet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// `(kind, info_index)` pairs in hierarchy order.
    pub fn slots(self) -> &'static [(RecordKind, usize)] {
        match self {
            Archetype::AnimatedUnit => ANIMATED_UNIT_SLOTS,
            Archetype::StaticObjectCollision => STATIC_COLLISION_SLOTS,
            Archetype::StaticObjectNoCollision => STATIC_SLOTS,
            Archetype::AnimatedObjectNoCollision => ANIMATED_SLOTS,
            Archetype::AnimatedObjectCollision => ANIMATED_COLLISION_SLOTS,
            Archetype::BuildingGrid => BUILDING_GRID_SLOTS,
            Archetype::StateMeshSet => STATE_MESH_SET_SLOTS,
        }
    }

    pub fn write_order(self) -> &'static [RecordKind] {
        match self {
            Archetype::AnimatedUnit => ANIMATED_UNIT_WRITE_ORDER,
            Archetype::StaticObjectCollision => STATIC_COLLISION_WRITE_ORDER,
            Archetype::StaticObjectNoCollision => STATIC_WRITE_ORDER,
            Archetype::AnimatedObjectNoCollision => ANIMATED_WRITE_ORDER,
            Archetype::AnimatedObjectCollision => ANIMATED_COLLISION_WRITE_ORDER,
            Archetype::BuildingGrid => BUILDING_GRID_WRITE_ORDER,
            Archetype::StateMeshSet => STATE_MESH_SET_WRITE_ORDER,
        }
    }

    pub fn contains(self, kind: RecordKind) -> bool {
        self.slots().iter().any(|(k, _)| *k == kind)
    }

    /// Smallest archetype whose slots cover every populated record of `tree`.
    pub fn infer(tree: &RecordTree) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|archetype| tree.kinds().all(|kind| archetype.contains(kind)))
            .min_by_key(|archetype| archetype.slots().len())
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::geometry::{CGeoMesh as GeoMesh, CGeoPrimitiveContainer as PrimitiveContainer};
    use crate::records::collision::CollisionShape as Shape;
    use crate::records::effect_set::EffectSet as Effects;

    #[test]
    fn slot_tables_are_permutations() {
        for archetype in Archetype::ALL {
            let mut indices: Vec<usize> = archetype.slots().iter().map(|(_, i)| *i).collect();
            indices.sort_unstable();
            let expected: Vec<usize> = (1..=archetype.slots().len()).collect();
            assert_eq!(indices, expected, "{archetype}");

            let mut written: Vec<RecordKind> = archetype.write_order().to_vec();
            let mut declared: Vec<RecordKind> = archetype.slots().iter().map(|(k, _)| *k).collect();
            written.sort();
            declared.sort();
            assert_eq!(written, declared, "{archetype}");
        }
    }

    #[test]
    fn infer_picks_the_smallest_cover() {
        let mut tree = RecordTree {
            geo_mesh: Some(GeoMesh::default()),
            ..RecordTree::default()
        };
        assert_eq!(Archetype::infer(&tree), Some(Archetype::StaticObjectNoCollision));

        tree.collision_shape = Some(Shape::default());
        tree.primitive_container = Some(PrimitiveContainer);
        assert_eq!(Archetype::infer(&tree), Some(Archetype::StaticObjectCollision));

        tree.effect_set = Some(Effects::default());
        assert_eq!(Archetype::infer(&tree), None);
    }

    #[test]
    fn names_parse_back() {
        for archetype in Archetype::ALL {
            assert_eq!(Archetype::from_name(archetype.name()), Some(*archetype));
        }
        assert_eq!(Archetype::from_name("animatedunit"), Some(Archetype::AnimatedUnit));
        assert_eq!(Archetype::from_name("Tree"), None);
    }
}
