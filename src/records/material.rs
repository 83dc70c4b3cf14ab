//! Material parameter block trailing every mesh.
//!
//! The signed discriminant in front of the block selects which sub-blocks follow. The
//! selection lives in [`material_plan`] so decode, encode and size walk the same list.

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::error::variant_fault;
use crate::math::Vector4;
use crate::primitive::{list_size, read, read_count, read_list, write, write_count, write_list, PString, Record};

pub const MATERIAL_FULL: i32 = -86061050;
pub const MATERIAL_NO_FLOW: i32 = -86061051;
pub const MATERIAL_NO_FLOW_ALT: i32 = -86061052;
pub const MATERIAL_NO_STUFF: i32 = -86061053;
pub const MATERIAL_NO_STRING: i32 = -86061054;
pub const MATERIAL_MINIMAL: i32 = -86061055;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialField {
    MaterialStuff,
    BoolParameter,
    Textures,
    Refraction,
    Materials,
    LevelOfDetail,
    EmptyString,
    Flow,
}

/// Ordered sub-blocks present for a discriminant, or `None` when it is unknown.
pub fn material_plan(discriminant: i32) -> Option<&'static [MaterialField]> {
    use MaterialField::*;
    match discriminant {
        MATERIAL_FULL => Some(&[
            MaterialStuff,
            BoolParameter,
            Textures,
            Refraction,
            Materials,
            LevelOfDetail,
            EmptyString,
            Flow,
        ]),
        MATERIAL_NO_FLOW | MATERIAL_NO_FLOW_ALT => Some(&[
            MaterialStuff,
            BoolParameter,
            Textures,
            Refraction,
            Materials,
            LevelOfDetail,
            EmptyString,
        ]),
        MATERIAL_NO_STUFF => Some(&[
            BoolParameter,
            Textures,
            Refraction,
            Materials,
            LevelOfDetail,
            EmptyString,
        ]),
        MATERIAL_NO_STRING => Some(&[BoolParameter, Textures, Refraction, Materials, LevelOfDetail]),
        MATERIAL_MINIMAL => Some(&[BoolParameter, Textures, Refraction, Materials]),
        _ => None,
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct Texture {
    pub identifier: i32,
    pub name: PString,
    pub spacer: i32,
}

impl Record for Texture {
    fn size(&self) -> usize {
        4 + self.name.size() + 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MaterialProperty {
    Smoothness,
    Metalness,
    Reflectivity,
    Emissivity,
    RefractionScale,
    DistortionMeshScale,
    Scratch,
    SpecularScale,
    WindResponse,
    WindHeight,
    DepthWriteThreshold,
    Saturation,
    Special,
}

impl MaterialProperty {
    pub fn from_identifier(identifier: i32) -> Option<Self> {
        use MaterialProperty::*;
        Some(match identifier {
            1668510769 => Smoothness,
            1668510770 => Metalness,
            1668510771 => Reflectivity,
            1668510772 => Emissivity,
            1668510773 => RefractionScale,
            1668510774 => DistortionMeshScale,
            1935897704 => Scratch,
            1668510775 => SpecularScale,
            1668510776 => WindResponse,
            1668510777 => WindHeight,
            1935893623 => DepthWriteThreshold,
            1668510785 => Saturation,
            1936745324 => Special,
            _ => return None,
        })
    }

    pub fn identifier(self) -> i32 {
        use MaterialProperty::*;
        match self {
            Smoothness => 1668510769,
            Metalness => 1668510770,
            Reflectivity => 1668510771,
            Emissivity => 1668510772,
            RefractionScale => 1668510773,
            DistortionMeshScale => 1668510774,
            Scratch => 1935897704,
            SpecularScale => 1668510775,
            WindResponse => 1668510776,
            WindHeight => 1668510777,
            DepthWriteThreshold => 1935893623,
            Saturation => 1668510785,
            Special => 1936745324,
        }
    }
}

/// One tagged material scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Material {
    pub property: MaterialProperty,
    pub value: f32,
}

impl BinRead for Material {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let identifier = i32::read_options(reader, endian, ())?;
        let property = MaterialProperty::from_identifier(identifier)
            .ok_or_else(|| variant_fault(reader, "Material", identifier.into()))?;
        let value = f32::read_options(reader, endian, ())?;
        Ok(Material { property, value })
    }
}

impl BinWrite for Material {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, endian: Endian, _: Self::Args<'_>) -> BinResult<()> {
        self.property.identifier().write_options(writer, endian, ())?;
        self.value.write_options(writer, endian, ())
    }
}

impl Record for Material {
    fn size(&self) -> usize {
        8
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct RefractionEntry {
    pub identifier: i32,
    pub rgb: [f32; 3],
}

impl Record for RefractionEntry {
    fn size(&self) -> usize {
        16
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Refraction {
    pub entries: Vec<RefractionEntry>,
}

impl BinRead for Refraction {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let count = read_count::<i32, _>(reader, "refraction count")?;
        Ok(Refraction {
            entries: read_list(reader, count)?,
        })
    }
}

impl BinWrite for Refraction {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write_count::<i32, _>(writer, self.entries.len(), "refraction entry")?;
        write_list(writer, &self.entries)
    }
}

impl Record for Refraction {
    fn size(&self) -> usize {
        4 + list_size(&self.entries)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct LevelOfDetail {
    pub length: i32,
    #[br(if(length == 1))]
    #[bw(if(*length == 1))]
    pub lod_level: i32,
}

impl Default for LevelOfDetail {
    fn default() -> Self {
        LevelOfDetail { length: 1, lod_level: 2 }
    }
}

impl Record for LevelOfDetail {
    fn size(&self) -> usize {
        if self.length == 1 {
            8
        } else {
            4
        }
    }
}

/// Length-prefixed run of 16-bit units. Always empty in shipped assets.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EmptyString {
    pub units: Vec<u16>,
}

impl BinRead for EmptyString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let count = read_count::<i32, _>(reader, "string length")?;
        Ok(EmptyString {
            units: read_list(reader, count)?,
        })
    }
}

impl BinWrite for EmptyString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write_count::<i32, _>(writer, self.units.len(), "empty string unit")?;
        write_list(writer, &self.units)
    }
}

impl Record for EmptyString {
    fn size(&self) -> usize {
        4 + 2 * self.units.len()
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct FlowEntry {
    pub identifier: i32,
    pub value: Vector4,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowSpeeds {
    pub max_flow_speed: FlowEntry,
    pub min_flow_speed: FlowEntry,
    pub flow_speed_change: FlowEntry,
    pub flow_scale: FlowEntry,
}

impl Default for FlowSpeeds {
    fn default() -> Self {
        let entry = |identifier| FlowEntry {
            identifier,
            value: Vector4::default(),
        };
        FlowSpeeds {
            max_flow_speed: entry(1668707377),
            min_flow_speed: entry(1668707378),
            flow_speed_change: entry(1668707379),
            flow_scale: entry(1668707380),
        }
    }
}

/// Flow descriptor. Only a length word of 4 is followed by the four speed entries. Any other
/// length ends the block and is kept for the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Flow {
    pub length: i32,
    pub speeds: Option<FlowSpeeds>,
}

const FLOW_WITH_SPEEDS: i32 = 4;

impl BinRead for Flow {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let length: i32 = read(reader)?;
        let speeds = if length == FLOW_WITH_SPEEDS {
            Some(FlowSpeeds {
                max_flow_speed: read(reader)?,
                min_flow_speed: read(reader)?,
                flow_speed_change: read(reader)?,
                flow_scale: read(reader)?,
            })
        } else {
            None
        };
        Ok(Flow { length, speeds })
    }
}

impl BinWrite for Flow {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if (self.length == FLOW_WITH_SPEEDS) != self.speeds.is_some() {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: format!("flow length {} disagrees with its speed entries", self.length),
            });
        }
        write(writer, &self.length)?;
        if let Some(speeds) = &self.speeds {
            write(writer, &speeds.max_flow_speed)?;
            write(writer, &speeds.min_flow_speed)?;
            write(writer, &speeds.flow_speed_change)?;
            write(writer, &speeds.flow_scale)?;
        }
        Ok(())
    }
}

impl Record for Flow {
    fn size(&self) -> usize {
        match self.speeds {
            Some(_) => 4 + 4 * (4 + Vector4::SIZE),
            None => 4,
        }
    }
}

/// Discriminated material parameters. Fields outside the discriminant's plan keep their
/// defaults and are never written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialBlock {
    pub discriminant: i32,
    pub material_stuff: i32,
    pub bool_parameter: i32,
    pub textures: Vec<Texture>,
    pub refraction: Refraction,
    pub materials: Vec<Material>,
    pub level_of_detail: LevelOfDetail,
    pub empty_string: EmptyString,
    pub flow: Flow,
}

impl Default for MaterialBlock {
    fn default() -> Self {
        MaterialBlock {
            discriminant: MATERIAL_FULL,
            material_stuff: 0,
            bool_parameter: 0,
            textures: Vec::new(),
            refraction: Refraction::default(),
            materials: Vec::new(),
            level_of_detail: LevelOfDetail::default(),
            empty_string: EmptyString::default(),
            flow: Flow::default(),
        }
    }
}

impl MaterialBlock {
    fn plan<S: Seek>(&self, stream: &mut S) -> BinResult<&'static [MaterialField]> {
        material_plan(self.discriminant)
            .ok_or_else(|| variant_fault(stream, "MaterialParameters", self.discriminant.into()))
    }
}

impl BinRead for MaterialBlock {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let mut block = MaterialBlock {
            discriminant: read(reader)?,
            ..MaterialBlock::default()
        };
        for field in block.plan(reader)? {
            match field {
                MaterialField::MaterialStuff => block.material_stuff = read(reader)?,
                MaterialField::BoolParameter => block.bool_parameter = read(reader)?,
                MaterialField::Textures => {
                    let count = read_count::<i32, _>(reader, "texture count")?;
                    block.textures = read_list(reader, count)?;
                }
                MaterialField::Refraction => block.refraction = read(reader)?,
                MaterialField::Materials => {
                    let count = read_count::<i32, _>(reader, "material count")?;
                    block.materials = read_list(reader, count)?;
                }
                MaterialField::LevelOfDetail => block.level_of_detail = read(reader)?,
                MaterialField::EmptyString => block.empty_string = read(reader)?,
                MaterialField::Flow => block.flow = read(reader)?,
            }
        }
        Ok(block)
    }
}

impl BinWrite for MaterialBlock {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        let plan = self.plan(writer)?;
        write(writer, &self.discriminant)?;
        for field in plan {
            match field {
                MaterialField::MaterialStuff => write(writer, &self.material_stuff)?,
                MaterialField::BoolParameter => write(writer, &self.bool_parameter)?,
                MaterialField::Textures => {
                    write_count::<i32, _>(writer, self.textures.len(), "texture")?;
                    write_list(writer, &self.textures)?;
                }
                MaterialField::Refraction => write(writer, &self.refraction)?,
                MaterialField::Materials => {
                    write_count::<i32, _>(writer, self.materials.len(), "material")?;
                    write_list(writer, &self.materials)?;
                }
                MaterialField::LevelOfDetail => write(writer, &self.level_of_detail)?,
                MaterialField::EmptyString => write(writer, &self.empty_string)?,
                MaterialField::Flow => write(writer, &self.flow)?,
            }
        }
        Ok(())
    }
}

impl Record for MaterialBlock {
    fn size(&self) -> usize {
        // Unknown discriminants fail on write before the size is ever trusted.
        let plan = material_plan(self.discriminant).unwrap_or(&[]);
        4 + plan
            .iter()
            .map(|field| match field {
                MaterialField::MaterialStuff | MaterialField::BoolParameter => 4,
                MaterialField::Textures => 4 + list_size(&self.textures),
                MaterialField::Refraction => self.refraction.size(),
                MaterialField::Materials => 4 + list_size(&self.materials),
                MaterialField::LevelOfDetail => self.level_of_detail.size(),
                MaterialField::EmptyString => self.empty_string.size(),
                MaterialField::Flow => self.flow.size(),
            })
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DrsError;
    use crate::primitive::{from_bytes, to_bytes};
    use crate::records::RecordKind;

    fn make_test_block(discriminant: i32) -> MaterialBlock {
        MaterialBlock {
            discriminant,
            material_stuff: 7,
            bool_parameter: 1,
            textures: vec![Texture {
                identifier: 1684432499,
                name: PString::new("unit_knight_col"),
                spacer: 0,
            }],
            refraction: Refraction {
                entries: vec![RefractionEntry {
                    identifier: 1668510769,
                    rgb: [0.1, 0.2, 0.3],
                }],
            },
            materials: vec![Material {
                property: MaterialProperty::SpecularScale,
                value: 1.5,
            }],
            level_of_detail: LevelOfDetail::default(),
            empty_string: EmptyString::default(),
            flow: Flow {
                length: 4,
                speeds: Some(FlowSpeeds::default()),
            },
        }
    }

    #[test]
    fn every_known_discriminant_size_matches_written() {
        for discriminant in [
            MATERIAL_FULL,
            MATERIAL_NO_FLOW,
            MATERIAL_NO_FLOW_ALT,
            MATERIAL_NO_STUFF,
            MATERIAL_NO_STRING,
            MATERIAL_MINIMAL,
        ] {
            let block = make_test_block(discriminant);
            let bytes = to_bytes(&block).unwrap();
            assert_eq!(block.size(), bytes.len(), "discriminant {}", discriminant);
        }
    }

    #[test]
    fn minimal_block_drops_trailing_sub_blocks() {
        let block = make_test_block(MATERIAL_MINIMAL);
        let bytes = to_bytes(&block).unwrap();
        let reparsed: MaterialBlock = from_bytes(&bytes).unwrap();

        assert_eq!(reparsed.material_stuff, 0);
        assert_eq!(reparsed.bool_parameter, 1);
        assert_eq!(reparsed.textures, block.textures);
        assert_eq!(reparsed.flow, Flow::default());
    }

    #[test]
    fn write_and_reparse_full_block() {
        let block = make_test_block(MATERIAL_FULL);
        let bytes = to_bytes(&block).unwrap();
        let reparsed: MaterialBlock = from_bytes(&bytes).unwrap();
        assert_eq!(reparsed, block);
    }

    #[test]
    fn unknown_discriminant_is_a_variant_fault() {
        let bytes = (-86061099i32).to_le_bytes();
        let err = from_bytes::<MaterialBlock>(&bytes).unwrap_err();
        match DrsError::from_record(RecordKind::CDspMeshFile, err) {
            DrsError::Variant { record, value } => {
                assert_eq!(record, "MaterialParameters");
                assert_eq!(value, -86061099);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn other_flow_lengths_end_the_block() {
        let bytes = 2i32.to_le_bytes();
        let flow: Flow = from_bytes(&bytes).unwrap();
        assert_eq!(flow, Flow { length: 2, speeds: None });
        assert_eq!(flow.size(), 4);
        assert_eq!(to_bytes(&flow).unwrap(), bytes);

        let mismatched = Flow {
            length: 2,
            speeds: Some(FlowSpeeds::default()),
        };
        assert!(to_bytes(&mismatched).is_err());
    }

    #[test]
    fn unknown_material_identifier_is_rejected() {
        let mut bytes = 12345i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(from_bytes::<Material>(&bytes).is_err());
    }

    #[test]
    fn refraction_keeps_multiple_entries() {
        let refraction = Refraction {
            entries: vec![RefractionEntry::default(); 3],
        };
        let bytes = to_bytes(&refraction).unwrap();
        assert_eq!(bytes.len(), 4 + 3 * 16);
        assert_eq!(from_bytes::<Refraction>(&bytes).unwrap(), refraction);
    }
}
