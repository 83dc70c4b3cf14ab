use binrw::binrw;
use serde::Serialize;

use crate::primitive::Record;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct Vector3(
    #[br(map = |raw: [f32; 3]| cgmath::Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &cgmath::Vector3<f32>| [v.x, v.y, v.z])]
    pub cgmath::Vector3<f32>,
);

impl Vector3 {
    pub const SIZE: usize = 12;

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3(cgmath::Vector3::new(x, y, z))
    }

    pub fn to_slice(&self) -> [f32; 3] {
        [self.0.x, self.0.y, self.0.z]
    }
}

impl Default for Vector3 {
    fn default() -> Self {
        Vector3::new(0.0, 0.0, 0.0)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct Vector4(
    #[br(map = |raw: [f32; 4]| cgmath::Vector4::new(raw[0], raw[1], raw[2], raw[3]))]
    #[bw(map = |v: &cgmath::Vector4<f32>| [v.x, v.y, v.z, v.w])]
    pub cgmath::Vector4<f32>,
);

impl Vector4 {
    pub const SIZE: usize = 16;

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Vector4(cgmath::Vector4::new(x, y, z, w))
    }
}

impl Default for Vector4 {
    fn default() -> Self {
        Vector4::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Nine floats in stream order. The stream order is kept as cgmath's column order so
/// the bytes round-trip untouched.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct Matrix3x3(
    #[br(map = |r: [f32; 9]| cgmath::Matrix3::new(r[0], r[1], r[2], r[3], r[4], r[5], r[6], r[7], r[8]))]
    #[bw(map = |m: &cgmath::Matrix3<f32>| { let raw: &[f32; 9] = m.as_ref(); *raw })]
    pub cgmath::Matrix3<f32>,
);

impl Matrix3x3 {
    pub const SIZE: usize = 36;
}

impl Default for Matrix3x3 {
    fn default() -> Self {
        Matrix3x3(cgmath::Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ))
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct Matrix4x4(
    #[br(map = |r: [f32; 16]| cgmath::Matrix4::new(
        r[0], r[1], r[2], r[3], r[4], r[5], r[6], r[7],
        r[8], r[9], r[10], r[11], r[12], r[13], r[14], r[15],
    ))]
    #[bw(map = |m: &cgmath::Matrix4<f32>| { let raw: &[f32; 16] = m.as_ref(); *raw })]
    pub cgmath::Matrix4<f32>,
);

impl Matrix4x4 {
    pub const SIZE: usize = 64;
}

impl Default for Matrix4x4 {
    fn default() -> Self {
        Matrix4x4(cgmath::Matrix4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ))
    }
}

/// Local frame used by locators, collision shapes and OBB nodes.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct CoordinateSystem {
    pub matrix: Matrix3x3,
    pub position: Vector3,
}

impl CoordinateSystem {
    pub const SIZE: usize = Matrix3x3::SIZE + Vector3::SIZE;
}

impl Record for Vector3 {
    fn size(&self) -> usize {
        Self::SIZE
    }
}

impl Record for Vector4 {
    fn size(&self) -> usize {
        Self::SIZE
    }
}

impl Record for Matrix3x3 {
    fn size(&self) -> usize {
        Self::SIZE
    }
}

impl Record for Matrix4x4 {
    fn size(&self) -> usize {
        Self::SIZE
    }
}

impl Record for CoordinateSystem {
    fn size(&self) -> usize {
        Self::SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{from_bytes, to_bytes};

    #[test]
    fn matrix3x3_keeps_stream_order() {
        let raw: Vec<u8> = (1..=9u32).flat_map(|i| (i as f32).to_le_bytes()).collect();
        let matrix: Matrix3x3 = from_bytes(&raw).unwrap();
        assert_eq!(matrix.0.x.x, 1.0);
        assert_eq!(matrix.0.x.y, 2.0);
        assert_eq!(matrix.0.z.z, 9.0);
        assert_eq!(to_bytes(&matrix).unwrap(), raw);
    }

    #[test]
    fn coordinate_system_is_48_bytes() {
        let frame = CoordinateSystem {
            matrix: Matrix3x3::default(),
            position: Vector3::new(1.0, -2.0, 3.5),
        };
        let bytes = to_bytes(&frame).unwrap();
        assert_eq!(bytes.len(), 48);
        assert_eq!(frame.size(), 48);
        assert_eq!(&bytes[36..40], &1.0f32.to_le_bytes());
    }
}
