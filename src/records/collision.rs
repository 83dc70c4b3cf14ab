use binrw::binrw;
use serde::Serialize;

use crate::math::{CoordinateSystem, Vector3};
use crate::primitive::{list_size, Record};

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct BoxShape {
    pub coordinate_system: CoordinateSystem,
    pub lower_left_corner: Vector3,
    pub upper_right_corner: Vector3,
}

impl Record for BoxShape {
    fn size(&self) -> usize {
        CoordinateSystem::SIZE + 2 * Vector3::SIZE
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct SphereShape {
    pub coordinate_system: CoordinateSystem,
    pub radius: f32,
    pub center: Vector3,
}

impl Record for SphereShape {
    fn size(&self) -> usize {
        CoordinateSystem::SIZE + 4 + Vector3::SIZE
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct CylinderShape {
    pub coordinate_system: CoordinateSystem,
    pub center: Vector3,
    pub height: f32,
    pub radius: f32,
}

impl Record for CylinderShape {
    fn size(&self) -> usize {
        CoordinateSystem::SIZE + Vector3::SIZE + 8
    }
}

/// Boxes, then spheres, then cylinders, each list behind its own `u32` count.
#[binrw]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[brw(little)]
pub struct CollisionShape {
    pub version: u8,

    #[br(temp)]
    #[bw(try_calc = u32::try_from(boxes.len()))]
    box_count: u32,

    #[br(count = box_count)]
    pub boxes: Vec<BoxShape>,

    #[br(temp)]
    #[bw(try_calc = u32::try_from(spheres.len()))]
    sphere_count: u32,

    #[br(count = sphere_count)]
    pub spheres: Vec<SphereShape>,

    #[br(temp)]
    #[bw(try_calc = u32::try_from(cylinders.len()))]
    cylinder_count: u32,

    #[br(count = cylinder_count)]
    pub cylinders: Vec<CylinderShape>,
}

impl Default for CollisionShape {
    fn default() -> Self {
        CollisionShape {
            version: 1,
            boxes: Vec::new(),
            spheres: Vec::new(),
            cylinders: Vec::new(),
        }
    }
}

impl Record for CollisionShape {
    fn size(&self) -> usize {
        1 + 12 + list_size(&self.boxes) + list_size(&self.spheres) + list_size(&self.cylinders)
    }
}
