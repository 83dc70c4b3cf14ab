//! `AnimationSet`: movement speeds, mode animation keys, IK atlases and marker sets.
//!
//! The record is a ladder of version gates. `version` decides whether the fifth word is a
//! `revision` or the key count, `revision` thresholds add flight and terrain scalars, and
//! `has_atlas`/`subversion` decide which trailing collections follow. Each gate only affects
//! fields that come after it, so a plan computed from partially read gates is a valid prefix
//! of the final plan. Decode, encode and size all walk [`animation_set_plan`].

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::math::Vector3;
use crate::primitive::{list_size, read, read_count, read_list, write, write_count, write_list, PString, Record};

pub const ANIMATION_SET_MAGIC: &str = "Battleforge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSetGates {
    pub version: i32,
    pub revision: i32,
    pub has_atlas: i16,
    pub subversion: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationSetField {
    Magic,
    Version,
    DefaultRunSpeed,
    DefaultWalkSpeed,
    /// Version 2 stores the key count where later versions store `revision`.
    LeadingKeyCount,
    Revision,
    ModeChangeType,
    HoveringGround,
    FlyBankScale,
    FlyAccelScale,
    FlyHitScale,
    AlignToTerrain,
    KeyMode,
    KeyCount,
    ModeAnimationKeys,
    HasAtlas,
    IkAtlases,
    UkInts,
    Subversion,
    AnimationMarkerSets,
    UnknownStructs,
}

pub fn animation_set_plan(gates: &AnimationSetGates) -> Vec<AnimationSetField> {
    use AnimationSetField::*;

    let mut plan = vec![Magic, Version, DefaultRunSpeed, DefaultWalkSpeed];
    plan.push(if gates.version == 2 { LeadingKeyCount } else { Revision });
    if gates.version >= 6 {
        if gates.revision >= 2 {
            plan.extend([ModeChangeType, HoveringGround]);
        }
        if gates.revision >= 5 {
            plan.extend([FlyBankScale, FlyAccelScale, FlyHitScale]);
        }
        if gates.revision >= 6 {
            plan.push(AlignToTerrain);
        }
    }
    plan.push(if gates.version == 2 { KeyMode } else { KeyCount });
    plan.push(ModeAnimationKeys);
    if gates.version >= 3 {
        plan.push(HasAtlas);
        if gates.has_atlas >= 1 {
            plan.push(IkAtlases);
        }
        if gates.has_atlas >= 2 {
            plan.push(UkInts);
        }
    }
    if gates.version >= 4 {
        plan.push(Subversion);
        match gates.subversion {
            2 => plan.push(AnimationMarkerSets),
            1 => plan.push(UnknownStructs),
            _ => {}
        }
    }
    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Constraint {
    pub revision: i16,
    pub left_angle: f32,
    pub right_angle: f32,
    pub left_damp_start: f32,
    pub right_damp_start: f32,
    pub damp_ratio: f32,
}

impl Default for Constraint {
    fn default() -> Self {
        Constraint {
            revision: 1,
            left_angle: -std::f32::consts::TAU,
            right_angle: std::f32::consts::TAU,
            left_damp_start: -std::f32::consts::TAU,
            right_damp_start: std::f32::consts::TAU,
            damp_ratio: 0.0,
        }
    }
}

impl BinRead for Constraint {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let revision: i16 = read(reader)?;
        if revision != 1 {
            return Ok(Constraint {
                revision,
                ..Constraint::default()
            });
        }
        let [left_angle, right_angle, left_damp_start, right_damp_start, damp_ratio]: [f32; 5] = read(reader)?;
        Ok(Constraint {
            revision,
            left_angle,
            right_angle,
            left_damp_start,
            right_damp_start,
            damp_ratio,
        })
    }
}

impl BinWrite for Constraint {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &self.revision)?;
        if self.revision == 1 {
            write(
                writer,
                &[
                    self.left_angle,
                    self.right_angle,
                    self.left_damp_start,
                    self.right_damp_start,
                    self.damp_ratio,
                ],
            )?;
        }
        Ok(())
    }
}

impl Record for Constraint {
    fn size(&self) -> usize {
        if self.revision == 1 {
            22
        } else {
            2
        }
    }
}

/// IK limits for one bone. Version 1 adds the axis and three constraints, version 2 the
/// purpose flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IKAtlas {
    pub identifier: i32,
    pub version: i16,
    pub axis: i32,
    pub chain_order: i32,
    pub constraints: [Constraint; 3],
    pub purpose_flags: i16,
}

impl Default for IKAtlas {
    fn default() -> Self {
        IKAtlas {
            identifier: 0,
            version: 2,
            axis: 2,
            chain_order: 0,
            constraints: [Constraint::default(); 3],
            purpose_flags: 0,
        }
    }
}

impl BinRead for IKAtlas {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let mut atlas = IKAtlas {
            identifier: read(reader)?,
            version: read(reader)?,
            ..IKAtlas::default()
        };
        if atlas.version >= 1 {
            atlas.axis = read(reader)?;
            atlas.chain_order = read(reader)?;
            atlas.constraints = read(reader)?;
        }
        if atlas.version >= 2 {
            atlas.purpose_flags = read(reader)?;
        }
        Ok(atlas)
    }
}

impl BinWrite for IKAtlas {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &self.identifier)?;
        write(writer, &self.version)?;
        if self.version >= 1 {
            write(writer, &self.axis)?;
            write(writer, &self.chain_order)?;
            write(writer, &self.constraints)?;
        }
        if self.version >= 2 {
            write(writer, &self.purpose_flags)?;
        }
        Ok(())
    }
}

impl Record for IKAtlas {
    fn size(&self) -> usize {
        let mut size = 6;
        if self.version >= 1 {
            size += 8 + list_size(&self.constraints);
        }
        if self.version >= 2 {
            size += 2;
        }
        size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantField {
    Range,
    AllowsIk,
    ForceNoBlend,
}

/// Fields after the file name of an animation variant.
pub fn variant_plan(version: i32) -> &'static [VariantField] {
    use VariantField::*;
    match version {
        i32::MIN..=3 => &[],
        4 => &[Range],
        5 | 6 => &[Range, AllowsIk],
        _ => &[Range, AllowsIk, ForceNoBlend],
    }
}

/// One `.ska` clip a mode key may pick, with its weight and playback window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationSetVariant {
    pub version: i32,
    pub weight: i32,
    pub file: PString,
    pub start: f32,
    pub end: f32,
    pub allows_ik: u8,
    pub force_no_blend: u8,
}

impl Default for AnimationSetVariant {
    fn default() -> Self {
        AnimationSetVariant {
            version: 7,
            weight: 100,
            file: PString::default(),
            start: 0.0,
            end: 1.0,
            allows_ik: 1,
            force_no_blend: 0,
        }
    }
}

impl BinRead for AnimationSetVariant {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let mut variant = AnimationSetVariant {
            version: read(reader)?,
            weight: read(reader)?,
            file: read(reader)?,
            ..AnimationSetVariant::default()
        };
        for field in variant_plan(variant.version) {
            match field {
                VariantField::Range => {
                    variant.start = read(reader)?;
                    variant.end = read(reader)?;
                }
                VariantField::AllowsIk => variant.allows_ik = read(reader)?,
                VariantField::ForceNoBlend => variant.force_no_blend = read(reader)?,
            }
        }
        Ok(variant)
    }
}

impl BinWrite for AnimationSetVariant {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &self.version)?;
        write(writer, &self.weight)?;
        write(writer, &self.file)?;
        for field in variant_plan(self.version) {
            match field {
                VariantField::Range => {
                    write(writer, &self.start)?;
                    write(writer, &self.end)?;
                }
                VariantField::AllowsIk => write(writer, &self.allows_ik)?,
                VariantField::ForceNoBlend => write(writer, &self.force_no_blend)?,
            }
        }
        Ok(())
    }
}

impl Record for AnimationSetVariant {
    fn size(&self) -> usize {
        let trailing: usize = variant_plan(self.version)
            .iter()
            .map(|field| match field {
                VariantField::Range => 8,
                VariantField::AllowsIk | VariantField::ForceNoBlend => 1,
            })
            .sum();
        8 + self.file.size() + trailing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    RawBlock,
    Unknown2,
    VisJob,
    Unknown3,
    SpecialMode,
}

/// Fields between `unknown` and the variant list of a mode key, by key type.
pub fn key_plan(key_type: i32) -> &'static [KeyField] {
    use KeyField::*;
    match key_type {
        1 => &[RawBlock],
        6 => &[Unknown2, VisJob, Unknown3, SpecialMode],
        t if t <= 5 => &[Unknown2, SpecialMode],
        _ => &[],
    }
}

/// Key type implied when the parent set omits the type word.
pub const IMPLIED_KEY_TYPE: i32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeAnimationKey {
    /// `None` when the parent set stores keys without a type word.
    pub key_type: Option<i32>,
    pub file: PString,
    pub unknown: i32,
    pub raw_block: [u8; 24],
    pub unknown2: i32,
    pub vis_job: i16,
    pub unknown3: i32,
    pub special_mode: i16,
    pub variants: Vec<AnimationSetVariant>,
}

impl ModeAnimationKey {
    pub fn effective_type(&self) -> i32 {
        self.key_type.unwrap_or(IMPLIED_KEY_TYPE)
    }
}

impl Default for ModeAnimationKey {
    fn default() -> Self {
        ModeAnimationKey {
            key_type: Some(6),
            file: PString::new(ANIMATION_SET_MAGIC),
            unknown: 2,
            raw_block: [0; 24],
            unknown2: 3,
            vis_job: 0,
            unknown3: 3,
            special_mode: 0,
            variants: Vec::new(),
        }
    }
}

impl BinRead for ModeAnimationKey {
    /// Whether the type word is omitted.
    type Args<'a> = (bool,);

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, args: Self::Args<'_>) -> BinResult<Self> {
        let key_type = if args.0 { None } else { Some(read(reader)?) };
        let mut key = ModeAnimationKey {
            key_type,
            file: read(reader)?,
            unknown: read(reader)?,
            ..ModeAnimationKey::default()
        };
        for field in key_plan(key.effective_type()) {
            match field {
                KeyField::RawBlock => key.raw_block = read(reader)?,
                KeyField::Unknown2 => key.unknown2 = read(reader)?,
                KeyField::VisJob => key.vis_job = read(reader)?,
                KeyField::Unknown3 => key.unknown3 = read(reader)?,
                KeyField::SpecialMode => key.special_mode = read(reader)?,
            }
        }
        let count = read_count::<i32, _>(reader, "animation variant count")?;
        key.variants = read_list(reader, count)?;
        Ok(key)
    }
}

impl BinWrite for ModeAnimationKey {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if let Some(key_type) = self.key_type {
            write(writer, &key_type)?;
        }
        write(writer, &self.file)?;
        write(writer, &self.unknown)?;
        for field in key_plan(self.effective_type()) {
            match field {
                KeyField::RawBlock => write(writer, &self.raw_block)?,
                KeyField::Unknown2 => write(writer, &self.unknown2)?,
                KeyField::VisJob => write(writer, &self.vis_job)?,
                KeyField::Unknown3 => write(writer, &self.unknown3)?,
                KeyField::SpecialMode => write(writer, &self.special_mode)?,
            }
        }
        write_count::<i32, _>(writer, self.variants.len(), "variant")?;
        write_list(writer, &self.variants)
    }
}

impl Record for ModeAnimationKey {
    fn size(&self) -> usize {
        let body: usize = key_plan(self.effective_type())
            .iter()
            .map(|field| match field {
                KeyField::RawBlock => 24,
                KeyField::Unknown2 | KeyField::Unknown3 => 4,
                KeyField::VisJob | KeyField::SpecialMode => 2,
            })
            .sum();
        self.key_type.map_or(0, |_| 4) + self.file.size() + 4 + body + 4 + list_size(&self.variants)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct AnimationMarker {
    pub is_spawn_animation: i32,
    pub time: f32,
    pub direction: Vector3,
    pub position: Vector3,
}

impl Record for AnimationMarker {
    fn size(&self) -> usize {
        32
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct AnimationMarkerSet {
    pub anim_id: i32,
    pub name: PString,
    pub animation_marker_id: u32,

    #[br(temp, assert(marker_count >= 0, "negative marker count {}", marker_count))]
    #[bw(try_calc = i32::try_from(markers.len()))]
    marker_count: i32,

    #[br(count = marker_count as usize)]
    pub markers: Vec<AnimationMarker>,
}

impl Record for AnimationMarkerSet {
    fn size(&self) -> usize {
        4 + self.name.size() + 8 + list_size(&self.markers)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct UnknownStruct2 {
    pub unknown_ints: [i32; 5],
}

impl Record for UnknownStruct2 {
    fn size(&self) -> usize {
        20
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct UnknownStruct {
    pub unknown: i32,
    pub name: PString,
    pub unknown2: i32,

    #[br(temp, assert(entry_count >= 0, "negative entry count {}", entry_count))]
    #[bw(try_calc = i32::try_from(entries.len()))]
    entry_count: i32,

    #[br(count = entry_count as usize)]
    pub entries: Vec<UnknownStruct2>,
}

impl Record for UnknownStruct {
    fn size(&self) -> usize {
        4 + self.name.size() + 8 + list_size(&self.entries)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationSet {
    pub magic: PString,
    pub version: i32,
    pub default_run_speed: f32,
    pub default_walk_speed: f32,
    pub revision: i32,
    pub mode_change_type: u8,
    pub hovering_ground: u8,
    pub fly_bank_scale: f32,
    pub fly_accel_scale: f32,
    pub fly_hit_scale: f32,
    pub align_to_terrain: u8,
    /// Version 2 only. Mode 2 drops the type word from every key.
    pub key_mode: i32,
    pub mode_animation_keys: Vec<ModeAnimationKey>,
    pub has_atlas: i16,
    pub ik_atlases: Vec<IKAtlas>,
    pub uk_ints: Vec<i32>,
    pub subversion: i16,
    pub animation_marker_sets: Vec<AnimationMarkerSet>,
    pub unknown_structs: Vec<UnknownStruct>,
}

impl Default for AnimationSet {
    fn default() -> Self {
        AnimationSet {
            magic: PString::new(ANIMATION_SET_MAGIC),
            version: 6,
            default_run_speed: 4.8,
            default_walk_speed: 2.3,
            revision: 0,
            mode_change_type: 0,
            hovering_ground: 0,
            fly_bank_scale: 1.0,
            fly_accel_scale: 0.0,
            fly_hit_scale: 1.0,
            align_to_terrain: 0,
            key_mode: 0,
            mode_animation_keys: Vec::new(),
            has_atlas: 1,
            ik_atlases: Vec::new(),
            uk_ints: Vec::new(),
            subversion: 2,
            animation_marker_sets: Vec::new(),
            unknown_structs: Vec::new(),
        }
    }
}

impl AnimationSet {
    pub fn gates(&self) -> AnimationSetGates {
        AnimationSetGates {
            version: self.version,
            revision: self.revision,
            has_atlas: self.has_atlas,
            subversion: self.subversion,
        }
    }

    pub fn omits_key_type(&self) -> bool {
        self.version == 2 && self.key_mode == 2
    }

    fn field_size(&self, field: AnimationSetField) -> usize {
        use AnimationSetField::*;
        match field {
            Magic => self.magic.size(),
            ModeChangeType | HoveringGround | AlignToTerrain => 1,
            HasAtlas | Subversion => 2,
            Version | DefaultRunSpeed | DefaultWalkSpeed | LeadingKeyCount | Revision | FlyBankScale
            | FlyAccelScale | FlyHitScale | KeyMode | KeyCount => 4,
            ModeAnimationKeys => list_size(&self.mode_animation_keys),
            IkAtlases => 4 + list_size(&self.ik_atlases),
            UkInts => 4 + 4 * self.uk_ints.len(),
            AnimationMarkerSets => 4 + list_size(&self.animation_marker_sets),
            UnknownStructs => 4 + list_size(&self.unknown_structs),
        }
    }
}

impl BinRead for AnimationSet {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        use AnimationSetField::*;

        // Gates start closed and open as their fields are read.
        let mut set = AnimationSet {
            version: 0,
            has_atlas: 0,
            subversion: 0,
            ..AnimationSet::default()
        };
        let mut key_count = 0;
        let mut position = 0;
        while let Some(field) = animation_set_plan(&set.gates()).get(position).copied() {
            match field {
                Magic => set.magic = read(reader)?,
                Version => set.version = read(reader)?,
                DefaultRunSpeed => set.default_run_speed = read(reader)?,
                DefaultWalkSpeed => set.default_walk_speed = read(reader)?,
                LeadingKeyCount | KeyCount => {
                    key_count = read_count::<i32, _>(reader, "mode animation key count")?
                }
                Revision => set.revision = read(reader)?,
                ModeChangeType => set.mode_change_type = read(reader)?,
                HoveringGround => set.hovering_ground = read(reader)?,
                FlyBankScale => set.fly_bank_scale = read(reader)?,
                FlyAccelScale => set.fly_accel_scale = read(reader)?,
                FlyHitScale => set.fly_hit_scale = read(reader)?,
                AlignToTerrain => set.align_to_terrain = read(reader)?,
                KeyMode => set.key_mode = read(reader)?,
                ModeAnimationKeys => {
                    let omit_type = set.omits_key_type();
                    let mut keys = Vec::with_capacity(key_count.min(1024));
                    for _ in 0..key_count {
                        keys.push(ModeAnimationKey::read_options(reader, endian, (omit_type,))?);
                    }
                    set.mode_animation_keys = keys;
                }
                HasAtlas => set.has_atlas = read(reader)?,
                IkAtlases => {
                    let count = read_count::<i32, _>(reader, "IK atlas count")?;
                    set.ik_atlases = read_list(reader, count)?;
                }
                UkInts => {
                    let count = read_count::<i32, _>(reader, "atlas word count")?;
                    set.uk_ints = read_list(reader, count)?;
                }
                Subversion => set.subversion = read(reader)?,
                AnimationMarkerSets => {
                    let count = read_count::<i32, _>(reader, "marker set count")?;
                    set.animation_marker_sets = read_list(reader, count)?;
                }
                UnknownStructs => {
                    let count = read_count::<i32, _>(reader, "unknown struct count")?;
                    set.unknown_structs = read_list(reader, count)?;
                }
            }
            position += 1;
        }
        Ok(set)
    }
}

impl BinWrite for AnimationSet {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        use AnimationSetField::*;

        let omit_type = self.omits_key_type();
        if self.mode_animation_keys.iter().any(|key| key.key_type.is_none() != omit_type) {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: format!(
                    "animation set version {} key mode {} {} key type words",
                    self.version,
                    self.key_mode,
                    if omit_type { "forbids" } else { "requires" }
                ),
            });
        }

        for field in animation_set_plan(&self.gates()) {
            match field {
                Magic => write(writer, &self.magic)?,
                Version => write(writer, &self.version)?,
                DefaultRunSpeed => write(writer, &self.default_run_speed)?,
                DefaultWalkSpeed => write(writer, &self.default_walk_speed)?,
                LeadingKeyCount | KeyCount => {
                    write_count::<i32, _>(writer, self.mode_animation_keys.len(), "mode animation key")?
                }
                Revision => write(writer, &self.revision)?,
                ModeChangeType => write(writer, &self.mode_change_type)?,
                HoveringGround => write(writer, &self.hovering_ground)?,
                FlyBankScale => write(writer, &self.fly_bank_scale)?,
                FlyAccelScale => write(writer, &self.fly_accel_scale)?,
                FlyHitScale => write(writer, &self.fly_hit_scale)?,
                AlignToTerrain => write(writer, &self.align_to_terrain)?,
                KeyMode => write(writer, &self.key_mode)?,
                ModeAnimationKeys => write_list(writer, &self.mode_animation_keys)?,
                HasAtlas => write(writer, &self.has_atlas)?,
                IkAtlases => {
                    write_count::<i32, _>(writer, self.ik_atlases.len(), "IK atlas")?;
                    write_list(writer, &self.ik_atlases)?;
                }
                UkInts => {
                    write_count::<i32, _>(writer, self.uk_ints.len(), "unknown int")?;
                    write_list(writer, &self.uk_ints)?;
                }
                Subversion => write(writer, &self.subversion)?,
                AnimationMarkerSets => {
                    write_count::<i32, _>(writer, self.animation_marker_sets.len(), "marker set")?;
                    write_list(writer, &self.animation_marker_sets)?;
                }
                UnknownStructs => {
                    write_count::<i32, _>(writer, self.unknown_structs.len(), "unknown struct")?;
                    write_list(writer, &self.unknown_structs)?;
                }
            }
        }
        Ok(())
    }
}

impl Record for AnimationSet {
    fn size(&self) -> usize {
        animation_set_plan(&self.gates())
            .into_iter()
            .map(|field| self.field_size(field))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{from_bytes, to_bytes};

    fn make_test_key(key_type: Option<i32>) -> ModeAnimationKey {
        let mut key = ModeAnimationKey {
            key_type,
            variants: vec![
                AnimationSetVariant {
                    file: PString::new("unit_idle.ska"),
                    ..AnimationSetVariant::default()
                },
                AnimationSetVariant {
                    version: 4,
                    weight: 50,
                    file: PString::new("unit_idle_2.ska"),
                    start: 0.25,
                    ..AnimationSetVariant::default()
                },
            ],
            ..ModeAnimationKey::default()
        };
        match key.effective_type() {
            1 => key.raw_block = [7; 24],
            _ => key.special_mode = 1,
        }
        key
    }

    fn make_test_set(gates: AnimationSetGates) -> AnimationSet {
        AnimationSet {
            version: gates.version,
            revision: gates.revision,
            has_atlas: gates.has_atlas,
            subversion: gates.subversion,
            mode_change_type: 1,
            hovering_ground: 1,
            fly_bank_scale: 0.5,
            align_to_terrain: 1,
            mode_animation_keys: vec![make_test_key(Some(6)), make_test_key(Some(1)), make_test_key(Some(3))],
            ik_atlases: vec![
                IKAtlas { identifier: 4, ..IKAtlas::default() },
                IKAtlas {
                    identifier: 5,
                    version: 1,
                    constraints: [
                        Constraint::default(),
                        Constraint { revision: 0, ..Constraint::default() },
                        Constraint::default(),
                    ],
                    ..IKAtlas::default()
                },
            ],
            uk_ints: vec![1, 2, 3],
            animation_marker_sets: vec![AnimationMarkerSet {
                anim_id: 3,
                name: PString::new("unit_attack.ska"),
                animation_marker_id: 0x1234,
                markers: vec![AnimationMarker { time: 0.4, ..AnimationMarker::default() }],
            }],
            unknown_structs: vec![UnknownStruct {
                name: PString::new("node"),
                entries: vec![UnknownStruct2 { unknown_ints: [1, 2, 3, 4, 5] }],
                ..UnknownStruct::default()
            }],
            ..AnimationSet::default()
        }
    }

    #[test]
    fn plan_opens_gates_in_stream_order() {
        use AnimationSetField::*;
        let plan = animation_set_plan(&AnimationSetGates {
            version: 6,
            revision: 6,
            has_atlas: 2,
            subversion: 2,
        });
        assert_eq!(
            plan,
            vec![
                Magic,
                Version,
                DefaultRunSpeed,
                DefaultWalkSpeed,
                Revision,
                ModeChangeType,
                HoveringGround,
                FlyBankScale,
                FlyAccelScale,
                FlyHitScale,
                AlignToTerrain,
                KeyCount,
                ModeAnimationKeys,
                HasAtlas,
                IkAtlases,
                UkInts,
                Subversion,
                AnimationMarkerSets,
            ]
        );
    }

    #[test]
    fn version_two_swaps_revision_for_key_count() {
        use AnimationSetField::*;
        let plan = animation_set_plan(&AnimationSetGates {
            version: 2,
            revision: 6,
            has_atlas: 2,
            subversion: 2,
        });
        assert_eq!(
            plan,
            vec![Magic, Version, DefaultRunSpeed, DefaultWalkSpeed, LeadingKeyCount, KeyMode, ModeAnimationKeys]
        );
    }

    #[test]
    fn animation_set_size_matches_written_for_every_gate() {
        for version in [2, 3, 4, 5, 6] {
            for revision in [0, 2, 5, 6] {
                for has_atlas in [0, 1, 2] {
                    for subversion in [0, 1, 2] {
                        let gates = AnimationSetGates { version, revision, has_atlas, subversion };
                        let set = make_test_set(gates);
                        let bytes = to_bytes(&set).unwrap();
                        assert_eq!(set.size(), bytes.len(), "{gates:?}");

                        let reparsed: AnimationSet = from_bytes(&bytes).unwrap();
                        assert_eq!(reparsed.size(), bytes.len(), "{gates:?}");
                        assert_eq!(to_bytes(&reparsed).unwrap(), bytes, "{gates:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn write_and_reparse_full_animation_set() {
        let set = make_test_set(AnimationSetGates {
            version: 6,
            revision: 6,
            has_atlas: 2,
            subversion: 2,
        });
        let reparsed: AnimationSet = from_bytes(&to_bytes(&set).unwrap()).unwrap();
        assert_eq!(reparsed, AnimationSet { unknown_structs: vec![], ..set });
    }

    #[test]
    fn key_mode_two_omits_key_types() {
        let set = AnimationSet {
            version: 2,
            key_mode: 2,
            mode_animation_keys: vec![make_test_key(None)],
            ..AnimationSet::default()
        };
        let bytes = to_bytes(&set).unwrap();
        assert_eq!(set.size(), bytes.len());

        let reparsed: AnimationSet = from_bytes(&bytes).unwrap();
        assert_eq!(reparsed.key_mode, 2);
        assert_eq!(reparsed.mode_animation_keys[0].key_type, None);
        assert_eq!(reparsed.mode_animation_keys[0].effective_type(), IMPLIED_KEY_TYPE);
        assert_eq!(to_bytes(&reparsed).unwrap(), bytes);
    }

    #[test]
    fn typed_keys_under_key_mode_two_fail_to_write() {
        let set = AnimationSet {
            version: 2,
            key_mode: 2,
            mode_animation_keys: vec![make_test_key(Some(2))],
            ..AnimationSet::default()
        };
        assert!(to_bytes(&set).is_err());
    }

    #[test]
    fn variant_plan_grows_with_version() {
        assert!(variant_plan(3).is_empty());
        assert_eq!(variant_plan(4), &[VariantField::Range]);
        assert_eq!(variant_plan(6).len(), 2);
        assert_eq!(variant_plan(7).len(), 3);

        let old = AnimationSetVariant {
            version: 3,
            file: PString::new("a.ska"),
            ..AnimationSetVariant::default()
        };
        assert_eq!(to_bytes(&old).unwrap().len(), 8 + 4 + 5);
        assert_eq!(old.size(), 17);
    }

    #[test]
    fn ik_atlas_size_follows_version() {
        let full = IKAtlas::default();
        assert_eq!(to_bytes(&full).unwrap().len(), full.size());
        assert_eq!(full.size(), 6 + 8 + 3 * 22 + 2);

        let bare = IKAtlas { version: 0, ..IKAtlas::default() };
        assert_eq!(to_bytes(&bare).unwrap().len(), 6);
        assert_eq!(bare.size(), 6);
    }
}
