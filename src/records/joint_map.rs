use binrw::binrw;
use serde::Serialize;

use crate::primitive::{list_size, Record};

/// Skeleton bone ids referenced by one mesh of the `CDspMeshFile`.
#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct JointGroup {
    #[br(temp, assert(joint_count >= 0, "negative joint count {}", joint_count))]
    #[bw(try_calc = i32::try_from(joints.len()))]
    joint_count: i32,

    #[br(count = joint_count as usize)]
    pub joints: Vec<i16>,
}

impl Record for JointGroup {
    fn size(&self) -> usize {
        4 + 2 * self.joints.len()
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct CDspJointMap {
    pub version: i32,

    #[br(temp, assert(group_count >= 0, "negative joint group count {}", group_count))]
    #[bw(try_calc = i32::try_from(joint_groups.len()))]
    group_count: i32,

    #[br(count = group_count as usize)]
    pub joint_groups: Vec<JointGroup>,
}

impl Default for CDspJointMap {
    fn default() -> Self {
        CDspJointMap {
            version: 1,
            joint_groups: Vec::new(),
        }
    }
}

impl Record for CDspJointMap {
    fn size(&self) -> usize {
        8 + list_size(&self.joint_groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{from_bytes, to_bytes};

    #[test]
    fn write_and_reparse_joint_map() {
        let map = CDspJointMap {
            joint_groups: vec![
                JointGroup { joints: vec![0, 1, 2, 5] },
                JointGroup { joints: vec![] },
            ],
            ..CDspJointMap::default()
        };
        let bytes = to_bytes(&map).unwrap();
        assert_eq!(map.size(), bytes.len());
        assert_eq!(bytes.len(), 8 + 12 + 4);
        assert_eq!(from_bytes::<CDspJointMap>(&bytes).unwrap(), map);
    }

    #[test]
    fn empty_joint_map_is_eight_bytes() {
        let map = CDspJointMap::default();
        assert_eq!(to_bytes(&map).unwrap(), [1, 0, 0, 0, 0, 0, 0, 0]);
    }
}
