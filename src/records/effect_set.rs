use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::primitive::{list_size, read, read_count, read_list, write, write_count, write_list, PString, Record};

/// Trailing fields of an effect set, in stream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSetField {
    Unknown,
    SkelEffects,
    ImpactSounds,
    AdditionalSounds,
}

/// Fields that follow the type and checksum. Types outside 10..=12 stop after the checksum.
pub fn effect_set_plan(effect_type: i16) -> &'static [EffectSetField] {
    use EffectSetField::*;
    match effect_type {
        10 => &[Unknown, SkelEffects, ImpactSounds, AdditionalSounds],
        11 | 12 => &[SkelEffects, ImpactSounds, AdditionalSounds],
        _ => &[],
    }
}

/// Keyframes of types 10 and 11 carry no condition byte.
pub fn keyframe_has_condition(effect_type: i16) -> bool {
    effect_type != 10 && effect_type != 11
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct Variant {
    pub weight: u8,
    pub name: PString,
}

impl Record for Variant {
    fn size(&self) -> usize {
        1 + self.name.size()
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
#[br(import(effect_type: i16))]
pub struct Keyframe {
    /// Normalised position in the clip, 0 to 1.
    pub time: f32,
    pub keyframe_type: i32,
    pub min_falloff: f32,
    pub max_falloff: f32,
    pub volume: f32,
    pub pitch_shift_min: f32,
    pub pitch_shift_max: f32,
    pub offset: [f32; 3],
    pub interruptable: u8,

    #[br(if(keyframe_has_condition(effect_type)))]
    pub condition: Option<i8>,

    #[br(temp, assert(variant_count >= 0, "negative keyframe variant count {}", variant_count))]
    #[bw(try_calc = i32::try_from(variants.len()))]
    variant_count: i32,

    #[br(count = variant_count as usize)]
    pub variants: Vec<Variant>,
}

impl Record for Keyframe {
    fn size(&self) -> usize {
        28 + 12 + 1 + self.condition.map_or(0, |_| 1) + 4 + list_size(&self.variants)
    }
}

/// Keyframes bound to one skeletal animation.
#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
#[br(import(effect_type: i16))]
pub struct SkelEff {
    pub name: PString,

    #[br(temp, assert(keyframe_count >= 0, "negative keyframe count {}", keyframe_count))]
    #[bw(try_calc = i32::try_from(keyframes.len()))]
    keyframe_count: i32,

    #[br(count = keyframe_count as usize, args { inner: (effect_type,) })]
    pub keyframes: Vec<Keyframe>,
}

impl Record for SkelEff {
    fn size(&self) -> usize {
        self.name.size() + 4 + list_size(&self.keyframes)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct SoundHeader {
    pub is_one: i16,
    pub min_falloff: f32,
    pub max_falloff: f32,
    pub volume: f32,
    pub pitch_shift_min: f32,
    pub pitch_shift_max: f32,
}

impl Default for SoundHeader {
    fn default() -> Self {
        SoundHeader {
            is_one: 1,
            min_falloff: 1.0,
            max_falloff: 1.0,
            volume: 1.0,
            pitch_shift_min: 1.0,
            pitch_shift_max: 1.0,
        }
    }
}

impl Record for SoundHeader {
    fn size(&self) -> usize {
        22
    }
}

/// Same fields as [`SoundHeader`] with volume and pitch stored first.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[brw(little)]
pub struct SoundHeader2 {
    pub is_one: i16,
    pub volume: f32,
    pub pitch_shift_min: f32,
    pub pitch_shift_max: f32,
    pub min_falloff: f32,
    pub max_falloff: f32,
}

impl Default for SoundHeader2 {
    fn default() -> Self {
        SoundHeader2 {
            is_one: 1,
            volume: 1.0,
            pitch_shift_min: 1.0,
            pitch_shift_max: 1.0,
            min_falloff: 1.0,
            max_falloff: 1.0,
        }
    }
}

impl Record for SoundHeader2 {
    fn size(&self) -> usize {
        22
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct SoundFile {
    pub weight: u8,
    pub sound_header: SoundHeader2,
    pub sound_file_name: PString,
}

impl Record for SoundFile {
    fn size(&self) -> usize {
        1 + self.sound_header.size() + self.sound_file_name.size()
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct SoundContainer {
    pub sound_header: SoundHeader,
    pub uk_index: i16,

    #[br(temp, assert(sound_count >= 0, "negative sound file count {}", sound_count))]
    #[bw(try_calc = i16::try_from(sound_files.len()))]
    sound_count: i16,

    #[br(count = sound_count as usize)]
    pub sound_files: Vec<SoundFile>,
}

impl Record for SoundContainer {
    fn size(&self) -> usize {
        self.sound_header.size() + 4 + list_size(&self.sound_files)
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct AdditionalSoundContainer {
    pub sound_header: SoundHeader,
    pub sound_type: i16,

    #[br(temp, assert(container_count >= 0, "negative sound container count {}", container_count))]
    #[bw(try_calc = i16::try_from(sounds.len()))]
    container_count: i16,

    #[br(count = container_count as usize)]
    pub sounds: Vec<SoundContainer>,
}

impl Record for AdditionalSoundContainer {
    fn size(&self) -> usize {
        self.sound_header.size() + 4 + list_size(&self.sounds)
    }
}

/// Sound and particle cues keyed to the unit's animations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSet {
    pub effect_type: i16,
    pub checksum: PString,
    /// Written for type 10 only.
    pub unknown: [f32; 5],
    pub skel_effects: Vec<SkelEff>,
    pub impact_sounds: Vec<SoundContainer>,
    pub additional_sounds: Vec<AdditionalSoundContainer>,
}

impl Default for EffectSet {
    fn default() -> Self {
        EffectSet {
            effect_type: 12,
            checksum: PString::default(),
            unknown: [0.0; 5],
            skel_effects: Vec::new(),
            impact_sounds: Vec::new(),
            additional_sounds: Vec::new(),
        }
    }
}

impl EffectSet {
    fn check_type_fields(&self) -> Result<(), String> {
        let plan = effect_set_plan(self.effect_type);
        if plan.is_empty()
            && !(self.skel_effects.is_empty() && self.impact_sounds.is_empty() && self.additional_sounds.is_empty())
        {
            return Err(format!("effect set type {} cannot carry effects or sounds", self.effect_type));
        }
        let wants_condition = keyframe_has_condition(self.effect_type);
        for effect in &self.skel_effects {
            if effect.keyframes.iter().any(|k| k.condition.is_some() != wants_condition) {
                return Err(format!(
                    "keyframe condition of '{}' does not match effect set type {}",
                    effect.name, self.effect_type
                ));
            }
        }
        Ok(())
    }
}

impl BinRead for EffectSet {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let mut set = EffectSet {
            effect_type: read(reader)?,
            checksum: read(reader)?,
            ..EffectSet::default()
        };
        for field in effect_set_plan(set.effect_type) {
            match field {
                EffectSetField::Unknown => set.unknown = read(reader)?,
                EffectSetField::SkelEffects => {
                    let count = read_count::<i32, _>(reader, "skeletal effect count")?;
                    for _ in 0..count {
                        set.skel_effects.push(SkelEff::read_options(reader, endian, (set.effect_type,))?);
                    }
                }
                EffectSetField::ImpactSounds => {
                    let count = read_count::<i16, _>(reader, "impact sound count")?;
                    set.impact_sounds = read_list(reader, count)?;
                }
                EffectSetField::AdditionalSounds => {
                    let count = read_count::<i16, _>(reader, "additional sound count")?;
                    set.additional_sounds = read_list(reader, count)?;
                }
            }
        }
        Ok(set)
    }
}

impl BinWrite for EffectSet {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if let Err(message) = self.check_type_fields() {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message,
            });
        }
        write(writer, &self.effect_type)?;
        write(writer, &self.checksum)?;
        for field in effect_set_plan(self.effect_type) {
            match field {
                EffectSetField::Unknown => write(writer, &self.unknown)?,
                EffectSetField::SkelEffects => {
                    write_count::<i32, _>(writer, self.skel_effects.len(), "skeleton effect")?;
                    write_list(writer, &self.skel_effects)?;
                }
                EffectSetField::ImpactSounds => {
                    write_count::<i16, _>(writer, self.impact_sounds.len(), "impact sound")?;
                    write_list(writer, &self.impact_sounds)?;
                }
                EffectSetField::AdditionalSounds => {
                    write_count::<i16, _>(writer, self.additional_sounds.len(), "additional sound")?;
                    write_list(writer, &self.additional_sounds)?;
                }
            }
        }
        Ok(())
    }
}

impl Record for EffectSet {
    fn size(&self) -> usize {
        let mut size = 2 + self.checksum.size();
        for field in effect_set_plan(self.effect_type) {
            size += match field {
                EffectSetField::Unknown => 20,
                EffectSetField::SkelEffects => 4 + list_size(&self.skel_effects),
                EffectSetField::ImpactSounds => 2 + list_size(&self.impact_sounds),
                EffectSetField::AdditionalSounds => 2 + list_size(&self.additional_sounds),
            };
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{from_bytes, to_bytes};

    fn make_test_effect_set(effect_type: i16) -> EffectSet {
        let condition = keyframe_has_condition(effect_type).then_some(-1);
        EffectSet {
            effect_type,
            checksum: PString::new("5f3a"),
            unknown: if effect_type == 10 { [0.5; 5] } else { [0.0; 5] },
            skel_effects: vec![SkelEff {
                name: PString::new("unit_attack.ska"),
                keyframes: vec![Keyframe {
                    time: 0.4,
                    keyframe_type: 1,
                    volume: 1.0,
                    condition,
                    variants: vec![Variant {
                        weight: 100,
                        name: PString::new("fx_hit.fxb"),
                    }],
                    ..Keyframe::default()
                }],
            }],
            impact_sounds: vec![SoundContainer {
                uk_index: 3,
                sound_files: vec![SoundFile {
                    weight: 50,
                    sound_file_name: PString::new("hit_01.snr"),
                    ..SoundFile::default()
                }],
                ..SoundContainer::default()
            }],
            additional_sounds: vec![AdditionalSoundContainer {
                sound_type: 2,
                sounds: vec![SoundContainer::default()],
                ..AdditionalSoundContainer::default()
            }],
        }
    }

    #[test]
    fn effect_set_size_matches_written() {
        for effect_type in [10, 11, 12] {
            let set = make_test_effect_set(effect_type);
            let bytes = to_bytes(&set).unwrap();
            assert_eq!(set.size(), bytes.len(), "type {effect_type}");
        }
    }

    #[test]
    fn write_and_reparse_effect_sets() {
        for effect_type in [10, 11, 12] {
            let set = make_test_effect_set(effect_type);
            let reparsed: EffectSet = from_bytes(&to_bytes(&set).unwrap()).unwrap();
            assert_eq!(reparsed, set, "type {effect_type}");
        }
    }

    #[test]
    fn type_eleven_keyframes_have_no_condition() {
        let with_condition = to_bytes(&make_test_effect_set(12)).unwrap();
        let without_condition = to_bytes(&make_test_effect_set(11)).unwrap();
        assert_eq!(with_condition.len(), without_condition.len() + 1);
    }

    #[test]
    fn other_types_stop_after_checksum() {
        let set = EffectSet {
            effect_type: 3,
            checksum: PString::new("ab"),
            ..EffectSet::default()
        };
        let bytes = to_bytes(&set).unwrap();
        assert_eq!(bytes.len(), 2 + 4 + 2);
        assert_eq!(from_bytes::<EffectSet>(&bytes).unwrap(), set);
    }

    #[test]
    fn condition_mismatch_fails_to_write() {
        let mut set = make_test_effect_set(12);
        set.effect_type = 11;
        assert!(to_bytes(&set).is_err());
    }
}
