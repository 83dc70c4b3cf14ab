use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::math::Vector3;
use crate::primitive::{list_size, read, read_count, write, write_count, write_list, Record};

pub const ANIMATION_TIMINGS_MAGIC: i32 = 1650881127;

/// Cast and resolve points of one clip.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct Timing {
    pub cast_ms: i32,
    pub resolve_ms: i32,
    pub direction: Vector3,
    pub animation_marker_id: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            cast_ms: 0,
            resolve_ms: 0,
            direction: Vector3::new(0.0, 0.0, 1.0),
            animation_marker_id: 0,
        }
    }
}

impl Record for Timing {
    fn size(&self) -> usize {
        24
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
#[br(import(version: i16))]
pub struct TimingVariant {
    pub weight: u8,

    /// Present in version 4 tables only.
    #[br(if(version == 4))]
    pub variant_index: Option<u8>,

    #[br(temp)]
    #[bw(try_calc = u16::try_from(timings.len()))]
    timing_count: u16,

    #[br(count = timing_count)]
    pub timings: Vec<Timing>,
}

impl Record for TimingVariant {
    fn size(&self) -> usize {
        1 + self.variant_index.map_or(0, |_| 1) + 2 + list_size(&self.timings)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct TimingTag {
    pub animation_tag_id: i32,
    pub is_enter_mode_animation: i16,
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
#[br(import(version: i16))]
pub struct AnimationTiming {
    pub animation_type: i32,

    /// Present in versions 2 to 4.
    #[br(if((2..=4).contains(&version)))]
    pub tag: Option<TimingTag>,

    #[br(temp)]
    #[bw(try_calc = u16::try_from(variants.len()))]
    variant_count: u16,

    #[br(count = variant_count, args { inner: (version,) })]
    pub variants: Vec<TimingVariant>,
}

impl Record for AnimationTiming {
    fn size(&self) -> usize {
        4 + self.tag.map_or(0, |_| 6) + 2 + list_size(&self.variants)
    }
}

/// Trailing block of every timings record. Always one length word and two ints.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct StructV3 {
    pub length: i32,
    pub unknown: [i32; 2],
}

impl Default for StructV3 {
    fn default() -> Self {
        StructV3 {
            length: 1,
            unknown: [0, 0],
        }
    }
}

impl Record for StructV3 {
    fn size(&self) -> usize {
        12
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationTimings {
    pub magic: i32,
    pub version: i16,
    pub animation_timings: Vec<AnimationTiming>,
    pub struct_v3: StructV3,
}

impl Default for AnimationTimings {
    fn default() -> Self {
        AnimationTimings {
            magic: ANIMATION_TIMINGS_MAGIC,
            version: 4,
            animation_timings: Vec::new(),
            struct_v3: StructV3::default(),
        }
    }
}

impl AnimationTimings {
    fn check_version_fields(&self) -> Result<(), String> {
        let wants_tag = (2..=4).contains(&self.version);
        let wants_index = self.version == 4;
        for timing in &self.animation_timings {
            if timing.tag.is_some() != wants_tag {
                return Err(format!(
                    "timing for animation type {} does not match version {}",
                    timing.animation_type, self.version
                ));
            }
            if timing.variants.iter().any(|v| v.variant_index.is_some() != wants_index) {
                return Err(format!(
                    "variant of animation type {} does not match version {}",
                    timing.animation_type, self.version
                ));
            }
        }
        Ok(())
    }
}

impl BinRead for AnimationTimings {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let magic = read(reader)?;
        let version: i16 = read(reader)?;
        let count = read_count::<i16, _>(reader, "animation timing count")?;
        let mut animation_timings = Vec::with_capacity(count);
        for _ in 0..count {
            animation_timings.push(AnimationTiming::read_options(reader, endian, (version,))?);
        }
        Ok(AnimationTimings {
            magic,
            version,
            animation_timings,
            struct_v3: read(reader)?,
        })
    }
}

impl BinWrite for AnimationTimings {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if let Err(message) = self.check_version_fields() {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message,
            });
        }
        write(writer, &self.magic)?;
        write(writer, &self.version)?;
        write_count::<i16, _>(writer, self.animation_timings.len(), "animation timing")?;
        write_list(writer, &self.animation_timings)?;
        write(writer, &self.struct_v3)
    }
}

impl Record for AnimationTimings {
    fn size(&self) -> usize {
        8 + list_size(&self.animation_timings) + self.struct_v3.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{from_bytes, to_bytes};

    fn make_test_timings(version: i16) -> AnimationTimings {
        let tag = (2..=4).contains(&version).then_some(TimingTag {
            animation_tag_id: 7,
            is_enter_mode_animation: 1,
        });
        let variant_index = (version == 4).then_some(0);
        AnimationTimings {
            version,
            animation_timings: vec![AnimationTiming {
                animation_type: 2,
                tag,
                variants: vec![TimingVariant {
                    weight: 100,
                    variant_index,
                    timings: vec![Timing {
                        cast_ms: 300,
                        resolve_ms: 650,
                        ..Timing::default()
                    }],
                }],
            }],
            ..AnimationTimings::default()
        }
    }

    #[test]
    fn timings_size_matches_written() {
        for version in [1, 3, 4] {
            let timings = make_test_timings(version);
            let bytes = to_bytes(&timings).unwrap();
            assert_eq!(timings.size(), bytes.len(), "version {version}");
        }
    }

    #[test]
    fn write_and_reparse_version_four_timings() {
        let timings = make_test_timings(4);
        let bytes = to_bytes(&timings).unwrap();
        assert_eq!(bytes.len(), 8 + (4 + 6 + 2 + (1 + 1 + 2 + 24)) + 12);
        assert_eq!(from_bytes::<AnimationTimings>(&bytes).unwrap(), timings);
    }

    #[test]
    fn version_three_drops_the_variant_index() {
        let timings = make_test_timings(3);
        let reparsed: AnimationTimings = from_bytes(&to_bytes(&timings).unwrap()).unwrap();
        assert_eq!(reparsed.animation_timings[0].variants[0].variant_index, None);
        assert!(reparsed.animation_timings[0].tag.is_some());
    }

    #[test]
    fn oversized_counts_fail_instead_of_wrapping() {
        let mut timings = make_test_timings(1);
        let timing = timings.animation_timings[0].clone();
        timings.animation_timings = vec![timing; i16::MAX as usize + 1];
        let err = to_bytes(&timings).unwrap_err();
        assert!(err.to_string().contains("32768"), "{err}");

        let variant = TimingVariant {
            timings: vec![Timing::default(); u16::MAX as usize + 1],
            ..TimingVariant::default()
        };
        assert!(to_bytes(&variant).is_err());
    }

    #[test]
    fn mismatched_version_fields_fail_to_write() {
        let mut timings = make_test_timings(4);
        timings.version = 1;
        assert!(to_bytes(&timings).is_err());
    }
}
