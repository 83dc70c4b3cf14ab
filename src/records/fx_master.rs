//! `FxMaster`: the effect description embedded in unit and building models.
//!
//! Unlike the other records, most structures here are introduced by a 32-bit header word and
//! collections have no count. A reader keeps consuming items while the next word is the item
//! header, so lists are read by looking ahead one word.
//!
//! The element tree is stored flattened in pre-order. After each element a run of
//! end-of-children markers closes its scope and possibly those of its ancestors. Effect
//! elements make their parent level swallow one extra marker. [`FxMaster::elements`] keeps
//! that stream as is and [`FxMaster::parents`] rebuilds the tree from it.

use std::io::{self, Read, Seek, SeekFrom, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::error::variant_fault;
use crate::math::Vector3;
use crate::primitive::{list_size, read, write, PString, Record};

pub const FX_MASTER_MAGIC: u32 = 0xF8AE_ADE7;

const FX_MASTER_VERSION: u32 = 1;
const FX_MASTER_REVISION: u32 = 2;

const START_TRACK: u32 = 0xF857_5767;
const STATIC_TRACK: u32 = 0xF857_A71C;
const TRACK: u32 = 0xF876_AC30;
const TRACK_VERSION: u32 = 4;
const END_CONTROL_POINTS: u32 = 0xF876_AC3E;
const NODE_LINK: u32 = 0xF82D_712E;
const START_ELEMENT: u32 = 0xF8E7_EAA7;
const END_ELEMENT: u32 = 0xF8E7_5E2D;
const START_CHILDREN: u32 = 0xF876_E2D0;
const END_CHILDREN: u32 = 0xF8E2_DE2D;

const STATIC_FLOAT: u32 = 0xF857_A7F7;
const STATIC_VECTOR3: u32 = 0xF857_A77C;
const STATIC_TEXT: u32 = 0xF857_A757;
const STATIC_OTHER_VECTOR3: u32 = 0xF857_A747;

struct KeyHeaders {
    entry: u32,
    start_control: u32,
    control_point: u32,
}

const FLOAT_KEYS: KeyHeaders = KeyHeaders {
    entry: 0xF87E_F70A,
    start_control: 0xF87E_FC95,
    control_point: 0xF87E_F7C9,
};

const VECTOR3_KEYS: KeyHeaders = KeyHeaders {
    entry: 0xF87E_7EC7,
    start_control: 0xF87E_7C95,
    control_point: 0xF87E_7EC9,
};

/// Next word of the stream without consuming it. `None` at the end of the stream.
fn peek_header<R: Read + Seek>(reader: &mut R) -> BinResult<Option<u32>> {
    let pos = reader.stream_position()?;
    let mut raw = [0u8; 4];
    let header = match reader.read_exact(&mut raw) {
        Ok(()) => Some(u32::from_le_bytes(raw)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(err) => return Err(err.into()),
    };
    reader.seek(SeekFrom::Start(pos))?;
    Ok(header)
}

fn expect_word<R: Read + Seek>(reader: &mut R, expected: u32, what: &str) -> BinResult<()> {
    let pos = reader.stream_position()?;
    let found: u32 = read(reader)?;
    if found != expected {
        return Err(binrw::Error::AssertFail {
            pos,
            message: format!("invalid {} {:#010x}, expected {:#010x}", what, found, expected),
        });
    }
    Ok(())
}

fn expect_version<R: Read + Seek>(reader: &mut R, record: &'static str, max: u32) -> BinResult<u32> {
    let version: u32 = read(reader)?;
    if !(1..=max).contains(&version) {
        return Err(variant_fault(reader, record, version.into()));
    }
    Ok(version)
}

fn write_failure<W: Seek>(writer: &mut W, message: String) -> binrw::Error {
    binrw::Error::AssertFail {
        pos: writer.stream_position().unwrap_or(0),
        message,
    }
}

/// Consumes a run of identical marker words and returns its length.
fn count_markers<R: Read + Seek>(reader: &mut R, marker: u32) -> BinResult<u32> {
    let mut count = 0;
    while peek_header(reader)? == Some(marker) {
        let _: u32 = read(reader)?;
        count += 1;
    }
    Ok(count)
}

fn write_markers<W: Write + Seek>(writer: &mut W, marker: u32, count: u32) -> BinResult<()> {
    for _ in 0..count {
        write(writer, &marker)?;
    }
    Ok(())
}

/// Reads items for as long as each is introduced by `header`.
fn read_tagged<T, R>(reader: &mut R, header: u32) -> BinResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()>,
    R: Read + Seek,
{
    let mut items = Vec::new();
    while peek_header(reader)? == Some(header) {
        let _: u32 = read(reader)?;
        items.push(read(reader)?);
    }
    Ok(items)
}

fn write_tagged<T, W>(writer: &mut W, header: u32, items: &[T]) -> BinResult<()>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
    W: Write + Seek,
{
    for item in items {
        write(writer, &header)?;
        write(writer, item)?;
    }
    Ok(())
}

fn tagged_size<T: Record>(items: &[T]) -> usize {
    4 * items.len() + list_size(items)
}

/// Constant value of a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StaticValue {
    Float(f32),
    Vector3(Vector3),
    Text(PString),
    OtherVector3(Vector3),
}

impl StaticValue {
    fn header(&self) -> u32 {
        match self {
            StaticValue::Float(_) => STATIC_FLOAT,
            StaticValue::Vector3(_) => STATIC_VECTOR3,
            StaticValue::Text(_) => STATIC_TEXT,
            StaticValue::OtherVector3(_) => STATIC_OTHER_VECTOR3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticTrack {
    pub track_type: u32,
    pub value: StaticValue,
}

impl BinRead for StaticTrack {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        expect_version(reader, "StaticTrack", 1)?;
        let track_type = read(reader)?;
        let data_type: u32 = read(reader)?;
        let value = match data_type {
            STATIC_FLOAT => StaticValue::Float(read(reader)?),
            STATIC_VECTOR3 => StaticValue::Vector3(read(reader)?),
            STATIC_TEXT => StaticValue::Text(read(reader)?),
            STATIC_OTHER_VECTOR3 => StaticValue::OtherVector3(read(reader)?),
            other => return Err(variant_fault(reader, "StaticTrack", other.into())),
        };
        Ok(StaticTrack { track_type, value })
    }
}

impl BinWrite for StaticTrack {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &1u32)?;
        write(writer, &self.track_type)?;
        write(writer, &self.value.header())?;
        match &self.value {
            StaticValue::Float(value) => write(writer, value),
            StaticValue::Vector3(value) | StaticValue::OtherVector3(value) => write(writer, value),
            StaticValue::Text(value) => write(writer, value),
        }
    }
}

impl Record for StaticTrack {
    fn size(&self) -> usize {
        12 + match &self.value {
            StaticValue::Float(_) => 4,
            StaticValue::Vector3(_) | StaticValue::OtherVector3(_) => Vector3::SIZE,
            StaticValue::Text(value) => value.size(),
        }
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct FloatKey {
    pub frame: f32,
    pub value: f32,
}

impl Record for FloatKey {
    fn size(&self) -> usize {
        8
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct Vector3Key {
    pub frame: f32,
    pub value: Vector3,
}

impl Record for Vector3Key {
    fn size(&self) -> usize {
        4 + Vector3::SIZE
    }
}

/// Keyframes of a track and their optional control points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyList<T> {
    pub entries: Vec<T>,
    /// Word after the entries. Control points follow only when it opens a control point list.
    pub control_header: u32,
    pub control_points: Vec<T>,
}

impl<T> KeyList<T>
where
    T: for<'a> BinRead<Args<'a> = ()> + for<'a> BinWrite<Args<'a> = ()> + Record,
{
    fn read_with<R: Read + Seek>(reader: &mut R, headers: &KeyHeaders) -> BinResult<Self> {
        let entries = read_tagged(reader, headers.entry)?;
        let control_header: u32 = read(reader)?;
        let mut control_points = Vec::new();
        if control_header == headers.start_control {
            control_points = read_tagged(reader, headers.control_point)?;
            expect_word(reader, END_CONTROL_POINTS, "control point terminator")?;
        }
        Ok(KeyList {
            entries,
            control_header,
            control_points,
        })
    }

    fn write_with<W: Write + Seek>(&self, writer: &mut W, headers: &KeyHeaders) -> BinResult<()> {
        if self.entries.is_empty() {
            return Err(write_failure(writer, "track has no keyframes".to_string()));
        }
        let has_control_points = self.control_header == headers.start_control;
        if !has_control_points && !self.control_points.is_empty() {
            return Err(write_failure(
                writer,
                format!("control header {:#010x} cannot carry control points", self.control_header),
            ));
        }
        write_tagged(writer, headers.entry, &self.entries)?;
        write(writer, &self.control_header)?;
        if has_control_points {
            write_tagged(writer, headers.control_point, &self.control_points)?;
            write(writer, &END_CONTROL_POINTS)?;
        }
        Ok(())
    }

    fn size_with(&self, headers: &KeyHeaders) -> usize {
        let control = if self.control_header == headers.start_control {
            tagged_size(&self.control_points) + 4
        } else {
            0
        };
        tagged_size(&self.entries) + 4 + control
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TrackKeys {
    Float(KeyList<FloatKey>),
    Vector3(KeyList<Vector3Key>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub track_type: u32,
    pub length: f32,
    pub track_dim: u32,
    pub track_mode: u32,
    pub interpolation_type: u32,
    pub evaluation_type: u32,
    pub keys: TrackKeys,
}

impl BinRead for Track {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let version: u32 = read(reader)?;
        if version != TRACK_VERSION {
            return Err(variant_fault(reader, "Track", version.into()));
        }
        let track_type = read(reader)?;
        let length = read(reader)?;
        let track_dim = read(reader)?;
        let track_mode = read(reader)?;
        let interpolation_type = read(reader)?;
        let evaluation_type = read(reader)?;
        let keys = match peek_header(reader)? {
            Some(header) if header == FLOAT_KEYS.entry => TrackKeys::Float(KeyList::read_with(reader, &FLOAT_KEYS)?),
            Some(header) if header == VECTOR3_KEYS.entry => {
                TrackKeys::Vector3(KeyList::read_with(reader, &VECTOR3_KEYS)?)
            }
            Some(other) => return Err(variant_fault(reader, "TrackKeys", other.into())),
            None => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        };
        Ok(Track {
            track_type,
            length,
            track_dim,
            track_mode,
            interpolation_type,
            evaluation_type,
            keys,
        })
    }
}

impl BinWrite for Track {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &TRACK_VERSION)?;
        write(writer, &self.track_type)?;
        write(writer, &self.length)?;
        write(writer, &self.track_dim)?;
        write(writer, &self.track_mode)?;
        write(writer, &self.interpolation_type)?;
        write(writer, &self.evaluation_type)?;
        match &self.keys {
            TrackKeys::Float(keys) => keys.write_with(writer, &FLOAT_KEYS),
            TrackKeys::Vector3(keys) => keys.write_with(writer, &VECTOR3_KEYS),
        }
    }
}

impl Record for Track {
    fn size(&self) -> usize {
        28 + match &self.keys {
            TrackKeys::Float(keys) => keys.size_with(&FLOAT_KEYS),
            TrackKeys::Vector3(keys) => keys.size_with(&VECTOR3_KEYS),
        }
    }
}

/// Where an element attaches to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeLink {
    pub version: u32,
    pub parent: PString,
    pub slot: PString,
    pub destination_slot: PString,
    pub world: u32,
    pub node: u32,
    pub floor: u32,
    pub aim: u32,
    pub span: u32,
    /// Only stored from version 3 on.
    pub locator: u32,
}

impl Default for NodeLink {
    fn default() -> Self {
        NodeLink {
            version: 3,
            parent: PString::default(),
            slot: PString::default(),
            destination_slot: PString::default(),
            world: 0,
            node: 0,
            floor: 0,
            aim: 0,
            span: 0,
            locator: 0,
        }
    }
}

impl BinRead for NodeLink {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        expect_word(reader, NODE_LINK, "node link header")?;
        let version = expect_version(reader, "NodeLink", 3)?;
        Ok(NodeLink {
            version,
            parent: read(reader)?,
            slot: read(reader)?,
            destination_slot: read(reader)?,
            world: read(reader)?,
            node: read(reader)?,
            floor: read(reader)?,
            aim: read(reader)?,
            span: read(reader)?,
            locator: if version > 2 { read(reader)? } else { 0 },
        })
    }
}

impl BinWrite for NodeLink {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if !(1..=3).contains(&self.version) {
            return Err(write_failure(writer, format!("unsupported node link version {}", self.version)));
        }
        write(writer, &NODE_LINK)?;
        write(writer, &self.version)?;
        write(writer, &self.parent)?;
        write(writer, &self.slot)?;
        write(writer, &self.destination_slot)?;
        for value in [self.world, self.node, self.floor, self.aim, self.span] {
            write(writer, &value)?;
        }
        if self.version > 2 {
            write(writer, &self.locator)?;
        }
        Ok(())
    }
}

impl Record for NodeLink {
    fn size(&self) -> usize {
        let locator = if self.version > 2 { 4 } else { 0 };
        8 + self.parent.size() + self.slot.size() + self.destination_slot.size() + 20 + locator
    }
}

const LIGHT: u32 = 0xF871_6470;
const STATIC_DECAL: u32 = 0xF85D_ECA7;
const SOUND: u32 = 0xF850_C5D0;
const BILLBOARD: u32 = 0xF881_77BD;
const EMITTER: u32 = 0xF8E3_1777;
const CAMERA_SHAKE: u32 = 0xF8C5_AAEE;
const EFFECT_MESH: u32 = 0xF83E_5400;
const EFFECT: u32 = 0xF8EF_FE37;
const TRAIL: u32 = 0xF878_A175;
const PHYSIC_GROUP: u32 = 0xF850_4752;
const PHYSIC: u32 = 0xF850_4859;
const DECAL: u32 = 0xF8DE_CA70;
const FORCE: u32 = 0xF846_6F72;
const FORCE_POINT: u32 = 0xF850_4650;
const ANIMATED_MESH: u32 = 0xF8A2_3E54;
const ANIMATED_MESH_MATERIAL: u32 = 0xF853_4D4D;
const WATER_DECAL: u32 = 0xF8AD_ECA7;
const SFP_SYSTEM: u32 = 0xF85F_6575;
const SFP_EMITTER: u32 = 0xF85F_6E31;
const SFP_FORCE_FIELD: u32 = 0xF85F_6FFD;

/// Type-specific part of an element.
///
/// Decals and billboards are version 2 when their second texture is present. Every other
/// type except lights carries a version word that is always 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElementBody {
    Light { range: u32, radiance: f32 },
    StaticDecal { color_texture: PString, normal_texture: Option<PString> },
    Sound { sound_file: PString },
    Billboard { texture_one: PString, texture_two: Option<PString> },
    Emitter { emitter_file: PString, particle_count: u32 },
    CameraShake,
    EffectMesh { mesh_file: PString },
    Effect { effect_file: PString, embedded: u32, length: f32 },
    Trail { trail_file: PString },
    PhysicGroup,
    Physic { physic_file: PString },
    Decal { decal_file: PString },
    Force,
    ForcePoint,
    AnimatedMesh { mesh_file: PString, animation_file: PString },
    AnimatedMeshMaterial { mesh_material_file: PString },
    WaterDecal { decal_file: PString },
    SfpSystem { system_file: PString },
    SfpEmitter,
    SfpForceField,
}

impl ElementBody {
    pub fn header(&self) -> u32 {
        match self {
            ElementBody::Light { .. } => LIGHT,
            ElementBody::StaticDecal { .. } => STATIC_DECAL,
            ElementBody::Sound { .. } => SOUND,
            ElementBody::Billboard { .. } => BILLBOARD,
            ElementBody::Emitter { .. } => EMITTER,
            ElementBody::CameraShake => CAMERA_SHAKE,
            ElementBody::EffectMesh { .. } => EFFECT_MESH,
            ElementBody::Effect { .. } => EFFECT,
            ElementBody::Trail { .. } => TRAIL,
            ElementBody::PhysicGroup => PHYSIC_GROUP,
            ElementBody::Physic { .. } => PHYSIC,
            ElementBody::Decal { .. } => DECAL,
            ElementBody::Force => FORCE,
            ElementBody::ForcePoint => FORCE_POINT,
            ElementBody::AnimatedMesh { .. } => ANIMATED_MESH,
            ElementBody::AnimatedMeshMaterial { .. } => ANIMATED_MESH_MATERIAL,
            ElementBody::WaterDecal { .. } => WATER_DECAL,
            ElementBody::SfpSystem { .. } => SFP_SYSTEM,
            ElementBody::SfpEmitter => SFP_EMITTER,
            ElementBody::SfpForceField => SFP_FORCE_FIELD,
        }
    }

    fn version(&self) -> Option<u32> {
        match self {
            ElementBody::Light { .. } => None,
            ElementBody::StaticDecal { normal_texture: second, .. }
            | ElementBody::Billboard { texture_two: second, .. } => Some(if second.is_some() { 2 } else { 1 }),
            _ => Some(1),
        }
    }

    /// Animated meshes and their materials are the only elements without exactly two
    /// start-track markers.
    fn free_track_markers(&self) -> bool {
        matches!(self, ElementBody::AnimatedMesh { .. } | ElementBody::AnimatedMeshMaterial { .. })
    }

    fn files(&self) -> Vec<&PString> {
        match self {
            ElementBody::StaticDecal {
                color_texture: first,
                normal_texture: second,
            }
            | ElementBody::Billboard {
                texture_one: first,
                texture_two: second,
            } => std::iter::once(first).chain(second.as_ref()).collect(),
            ElementBody::Sound { sound_file: file }
            | ElementBody::Emitter { emitter_file: file, .. }
            | ElementBody::EffectMesh { mesh_file: file }
            | ElementBody::Effect { effect_file: file, .. }
            | ElementBody::Trail { trail_file: file }
            | ElementBody::Physic { physic_file: file }
            | ElementBody::Decal { decal_file: file }
            | ElementBody::AnimatedMeshMaterial {
                mesh_material_file: file,
            }
            | ElementBody::WaterDecal { decal_file: file }
            | ElementBody::SfpSystem { system_file: file } => vec![file],
            ElementBody::AnimatedMesh {
                mesh_file,
                animation_file,
            } => vec![mesh_file, animation_file],
            _ => Vec::new(),
        }
    }
}

impl BinRead for ElementBody {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let header: u32 = read(reader)?;
        let version = match header {
            LIGHT => 0,
            STATIC_DECAL => expect_version(reader, "StaticDecal", 2)?,
            BILLBOARD => expect_version(reader, "Billboard", 2)?,
            SOUND | EMITTER | CAMERA_SHAKE | EFFECT_MESH | EFFECT | TRAIL | PHYSIC_GROUP | PHYSIC | DECAL | FORCE
            | FORCE_POINT | ANIMATED_MESH | ANIMATED_MESH_MATERIAL | WATER_DECAL | SFP_SYSTEM | SFP_EMITTER
            | SFP_FORCE_FIELD => expect_version(reader, "ElementBody", 1)?,
            other => return Err(variant_fault(reader, "Element", other.into())),
        };
        Ok(match header {
            LIGHT => ElementBody::Light {
                range: read(reader)?,
                radiance: read(reader)?,
            },
            STATIC_DECAL => ElementBody::StaticDecal {
                color_texture: read(reader)?,
                normal_texture: if version == 2 { Some(read(reader)?) } else { None },
            },
            SOUND => ElementBody::Sound {
                sound_file: read(reader)?,
            },
            BILLBOARD => ElementBody::Billboard {
                texture_one: read(reader)?,
                texture_two: if version == 2 { Some(read(reader)?) } else { None },
            },
            EMITTER => ElementBody::Emitter {
                emitter_file: read(reader)?,
                particle_count: read(reader)?,
            },
            CAMERA_SHAKE => ElementBody::CameraShake,
            EFFECT_MESH => ElementBody::EffectMesh { mesh_file: read(reader)? },
            EFFECT => ElementBody::Effect {
                effect_file: read(reader)?,
                embedded: read(reader)?,
                length: read(reader)?,
            },
            TRAIL => ElementBody::Trail {
                trail_file: read(reader)?,
            },
            PHYSIC_GROUP => ElementBody::PhysicGroup,
            PHYSIC => ElementBody::Physic {
                physic_file: read(reader)?,
            },
            DECAL => ElementBody::Decal {
                decal_file: read(reader)?,
            },
            FORCE => ElementBody::Force,
            FORCE_POINT => ElementBody::ForcePoint,
            ANIMATED_MESH => ElementBody::AnimatedMesh {
                mesh_file: read(reader)?,
                animation_file: read(reader)?,
            },
            ANIMATED_MESH_MATERIAL => ElementBody::AnimatedMeshMaterial {
                mesh_material_file: read(reader)?,
            },
            WATER_DECAL => ElementBody::WaterDecal {
                decal_file: read(reader)?,
            },
            SFP_SYSTEM => ElementBody::SfpSystem {
                system_file: read(reader)?,
            },
            SFP_EMITTER => ElementBody::SfpEmitter,
            _ => ElementBody::SfpForceField,
        })
    }
}

impl BinWrite for ElementBody {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        write(writer, &self.header())?;
        if let Some(version) = self.version() {
            write(writer, &version)?;
        }
        match self {
            ElementBody::Light { range, radiance } => {
                write(writer, range)?;
                write(writer, radiance)?;
            }
            ElementBody::Emitter {
                emitter_file,
                particle_count,
            } => {
                write(writer, emitter_file)?;
                write(writer, particle_count)?;
            }
            ElementBody::Effect {
                effect_file,
                embedded,
                length,
            } => {
                write(writer, effect_file)?;
                write(writer, embedded)?;
                write(writer, length)?;
            }
            _ => {
                for file in self.files() {
                    write(writer, file)?;
                }
            }
        }
        Ok(())
    }
}

impl Record for ElementBody {
    fn size(&self) -> usize {
        let trailing = match self {
            ElementBody::Light { .. } => 8,
            ElementBody::Emitter { .. } => 4,
            ElementBody::Effect { .. } => 8,
            _ => 0,
        };
        4 + self.version().map_or(0, |_| 4) + self.files().iter().map(|f| f.size()).sum::<usize>() + trailing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub node_link: NodeLink,
    pub name: PString,
    pub body: ElementBody,
    /// Start-track markers after the body. Two for everything but animated meshes.
    pub track_markers: u32,
    pub static_tracks: Vec<StaticTrack>,
    pub tracks: Vec<Track>,
    /// End-of-children markers following the element.
    pub closing_markers: u32,
}

impl Element {
    fn check_track_markers(&self) -> Result<(), String> {
        if self.track_markers != 2 && !self.body.free_track_markers() {
            return Err(format!(
                "element '{}' has {} start-track markers, expected 2",
                self.name, self.track_markers
            ));
        }
        Ok(())
    }
}

impl BinRead for Element {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let node_link = read(reader)?;
        expect_word(reader, START_ELEMENT, "element header")?;
        expect_version(reader, "Element", 1)?;
        let name = read(reader)?;
        let body = read(reader)?;
        expect_word(reader, END_ELEMENT, "element terminator")?;

        let pos = reader.stream_position()?;
        let mut element = Element {
            node_link,
            name,
            body,
            track_markers: count_markers(reader, START_TRACK)?,
            static_tracks: Vec::new(),
            tracks: Vec::new(),
            closing_markers: 0,
        };
        element
            .check_track_markers()
            .map_err(|message| binrw::Error::AssertFail { pos, message })?;

        element.static_tracks = read_tagged(reader, STATIC_TRACK)?;
        element.tracks = read_tagged(reader, TRACK)?;
        expect_word(reader, START_CHILDREN, "children header")?;
        element.closing_markers = count_markers(reader, END_CHILDREN)?;
        Ok(element)
    }
}

impl BinWrite for Element {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if let Err(message) = self.check_track_markers() {
            return Err(write_failure(writer, message));
        }
        write(writer, &self.node_link)?;
        write(writer, &START_ELEMENT)?;
        write(writer, &1u32)?;
        write(writer, &self.name)?;
        write(writer, &self.body)?;
        write(writer, &END_ELEMENT)?;
        write_markers(writer, START_TRACK, self.track_markers)?;
        write_tagged(writer, STATIC_TRACK, &self.static_tracks)?;
        write_tagged(writer, TRACK, &self.tracks)?;
        write(writer, &START_CHILDREN)?;
        write_markers(writer, END_CHILDREN, self.closing_markers)
    }
}

impl Record for Element {
    fn size(&self) -> usize {
        self.node_link.size()
            + 8
            + self.name.size()
            + self.body.size()
            + 4
            + 4 * self.track_markers as usize
            + tagged_size(&self.static_tracks)
            + tagged_size(&self.tracks)
            + 4
            + 4 * self.closing_markers as usize
    }
}

/// Replays the end-of-children markers of the flattened element stream.
///
/// `depth` starts at 1 and the stream ends when it reaches -1. An effect element makes the
/// level it sits on ignore one marker.
struct Nesting {
    depth: i64,
    ignores: Vec<u32>,
    scopes: Vec<usize>,
}

impl Nesting {
    fn new() -> Self {
        Nesting {
            depth: 1,
            ignores: Vec::new(),
            scopes: Vec::new(),
        }
    }

    /// Enters element `index` and applies its markers. Returns the element's parent.
    fn advance(&mut self, index: usize, element: &Element) -> Option<usize> {
        let parent = self.scopes.last().copied();
        if let ElementBody::Effect { .. } = element.body {
            let level = usize::try_from(self.depth).unwrap_or(0);
            if self.ignores.len() <= level {
                self.ignores.resize(level + 1, 0);
            }
            self.ignores[level] += 1;
        }
        self.depth += 1;
        self.scopes.push(index);

        for _ in 0..element.closing_markers {
            let ignored = usize::try_from(self.depth)
                .ok()
                .and_then(|level| self.ignores.get_mut(level))
                .filter(|pending| **pending > 0);
            match ignored {
                Some(pending) => *pending -= 1,
                None => {
                    self.scopes.pop();
                    self.depth -= 1;
                }
            }
        }
        parent
    }

    fn finished(&self) -> bool {
        self.depth == -1
    }

    fn overrun(&self) -> bool {
        self.depth < -1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FxMaster {
    pub name: PString,
    pub length: f32,
    pub setup_file_name: PString,
    pub setup_source_id: i32,
    pub setup_target_id: i32,
    pub play_length: f32,
    pub static_tracks: Vec<StaticTrack>,
    pub tracks: Vec<Track>,
    /// Element tree in pre-order.
    pub elements: Vec<Element>,
    /// End-of-children markers after an empty element tree. Must be 0 when `elements` is
    /// not empty.
    pub closing_markers: u32,
}

impl FxMaster {
    /// Index of each element's parent, `None` for top-level elements.
    pub fn parents(&self) -> Vec<Option<usize>> {
        let mut nesting = Nesting::new();
        self.elements
            .iter()
            .enumerate()
            .map(|(i, element)| nesting.advance(i, element))
            .collect()
    }

    fn check_elements(&self) -> Result<(), String> {
        if !self.elements.is_empty() && self.closing_markers != 0 {
            return Err("closing markers of an empty tree set on a non-empty one".to_string());
        }
        let mut nesting = Nesting::new();
        for (i, element) in self.elements.iter().enumerate() {
            nesting.advance(i, element);
            let last = i + 1 == self.elements.len();
            if nesting.overrun() || nesting.finished() != last {
                return Err(format!("markers after element '{}' do not close the tree", element.name));
            }
        }
        Ok(())
    }
}

impl BinRead for FxMaster {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let version: u32 = read(reader)?;
        if version != FX_MASTER_VERSION {
            return Err(variant_fault(reader, "FxMaster", version.into()));
        }
        expect_word(reader, FX_MASTER_MAGIC, "effect magic")?;
        let revision: u32 = read(reader)?;
        if revision != FX_MASTER_REVISION {
            return Err(variant_fault(reader, "FxMaster", revision.into()));
        }

        let mut fx = FxMaster {
            name: read(reader)?,
            length: read(reader)?,
            setup_file_name: read(reader)?,
            setup_source_id: read(reader)?,
            setup_target_id: read(reader)?,
            play_length: read(reader)?,
            ..FxMaster::default()
        };
        expect_word(reader, 0, "reserved word")?;
        expect_word(reader, 0, "reserved word")?;
        expect_word(reader, START_TRACK, "start-track marker")?;
        expect_word(reader, START_TRACK, "start-track marker")?;
        fx.static_tracks = read_tagged(reader, STATIC_TRACK)?;
        fx.tracks = read_tagged(reader, TRACK)?;
        expect_word(reader, START_CHILDREN, "children header")?;

        match peek_header(reader)? {
            None | Some(END_CHILDREN) => fx.closing_markers = count_markers(reader, END_CHILDREN)?,
            Some(_) => {
                let mut nesting = Nesting::new();
                loop {
                    let pos = reader.stream_position()?;
                    let element: Element = read(reader)?;
                    nesting.advance(fx.elements.len(), &element);
                    fx.elements.push(element);
                    if nesting.overrun() {
                        return Err(binrw::Error::AssertFail {
                            pos,
                            message: "more end-of-children markers than open elements".to_string(),
                        });
                    }
                    if nesting.finished() {
                        break;
                    }
                }
            }
        }
        Ok(fx)
    }
}

impl BinWrite for FxMaster {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        if let Err(message) = self.check_elements() {
            return Err(write_failure(writer, message));
        }
        write(writer, &FX_MASTER_VERSION)?;
        write(writer, &FX_MASTER_MAGIC)?;
        write(writer, &FX_MASTER_REVISION)?;
        write(writer, &self.name)?;
        write(writer, &self.length)?;
        write(writer, &self.setup_file_name)?;
        write(writer, &self.setup_source_id)?;
        write(writer, &self.setup_target_id)?;
        write(writer, &self.play_length)?;
        write(writer, &[0u32; 2])?;
        write_markers(writer, START_TRACK, 2)?;
        write_tagged(writer, STATIC_TRACK, &self.static_tracks)?;
        write_tagged(writer, TRACK, &self.tracks)?;
        write(writer, &START_CHILDREN)?;
        for element in &self.elements {
            write(writer, element)?;
        }
        write_markers(writer, END_CHILDREN, self.closing_markers)
    }
}

impl Record for FxMaster {
    fn size(&self) -> usize {
        12 + self.name.size()
            + 4
            + self.setup_file_name.size()
            + 12
            + 8
            + 8
            + tagged_size(&self.static_tracks)
            + tagged_size(&self.tracks)
            + 4
            + list_size(&self.elements)
            + 4 * self.closing_markers as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DrsError;
    use crate::primitive::{from_bytes, to_bytes};
    use crate::records::RecordKind;

    fn make_test_track(vector: bool) -> Track {
        let keys = if vector {
            TrackKeys::Vector3(KeyList {
                entries: vec![
                    Vector3Key {
                        frame: 0.0,
                        value: Vector3::new(0.0, 1.0, 0.0),
                    },
                    Vector3Key {
                        frame: 1.0,
                        value: Vector3::new(0.0, 2.0, 0.0),
                    },
                ],
                control_header: VECTOR3_KEYS.start_control,
                control_points: vec![Vector3Key {
                    frame: 0.5,
                    value: Vector3::new(0.0, 1.5, 0.0),
                }],
            })
        } else {
            TrackKeys::Float(KeyList {
                entries: vec![FloatKey { frame: 0.0, value: 0.25 }],
                control_header: END_CONTROL_POINTS,
                control_points: Vec::new(),
            })
        };
        Track {
            track_type: 3,
            length: 1.0,
            track_dim: if vector { 3 } else { 1 },
            track_mode: 1,
            interpolation_type: 2,
            evaluation_type: 0,
            keys,
        }
    }

    fn make_test_element(name: &str, body: ElementBody, closing_markers: u32) -> Element {
        Element {
            node_link: NodeLink {
                parent: PString::new("root"),
                slot: PString::new("fx_slot"),
                locator: 7,
                ..NodeLink::default()
            },
            name: PString::new(name),
            body,
            track_markers: 2,
            static_tracks: vec![StaticTrack {
                track_type: 1,
                value: StaticValue::Text(PString::new("additive")),
            }],
            tracks: vec![make_test_track(false)],
            closing_markers,
        }
    }

    /// An emitter with a sound child, then a top-level billboard.
    fn make_test_fx_master() -> FxMaster {
        FxMaster {
            name: PString::new(""),
            length: 2.5,
            setup_file_name: PString::new("fx_setup.xml"),
            setup_source_id: -1,
            setup_target_id: 4,
            play_length: 2.5,
            static_tracks: vec![
                StaticTrack {
                    track_type: 0,
                    value: StaticValue::Float(1.0),
                },
                StaticTrack {
                    track_type: 5,
                    value: StaticValue::Vector3(Vector3::new(1.0, 0.5, 0.25)),
                },
            ],
            tracks: vec![make_test_track(true)],
            elements: vec![
                make_test_element(
                    "sparks",
                    ElementBody::Emitter {
                        emitter_file: PString::new("sparks.emitter"),
                        particle_count: 64,
                    },
                    0,
                ),
                make_test_element(
                    "crackle",
                    ElementBody::Sound {
                        sound_file: PString::new("crackle.snr"),
                    },
                    2,
                ),
                make_test_element(
                    "glow",
                    ElementBody::Billboard {
                        texture_one: PString::new("glow.dds"),
                        texture_two: Some(PString::new("glow_mask.dds")),
                    },
                    3,
                ),
            ],
            closing_markers: 0,
        }
    }

    #[test]
    fn fx_master_size_matches_written() {
        let fx = make_test_fx_master();
        let bytes = to_bytes(&fx).unwrap();
        assert_eq!(fx.size(), bytes.len());

        let empty = FxMaster {
            closing_markers: 1,
            ..FxMaster::default()
        };
        assert_eq!(empty.size(), to_bytes(&empty).unwrap().len());
    }

    #[test]
    fn write_and_reparse_fx_master() {
        let fx = make_test_fx_master();
        let reparsed: FxMaster = from_bytes(&to_bytes(&fx).unwrap()).unwrap();
        assert_eq!(reparsed, fx);
    }

    #[test]
    fn every_element_body_survives_a_rewrite() {
        let file = || PString::new("file.bin");
        let bodies = vec![
            ElementBody::Light {
                range: 12,
                radiance: 0.75,
            },
            ElementBody::StaticDecal {
                color_texture: file(),
                normal_texture: None,
            },
            ElementBody::Sound { sound_file: file() },
            ElementBody::Billboard {
                texture_one: file(),
                texture_two: None,
            },
            ElementBody::Emitter {
                emitter_file: file(),
                particle_count: 3,
            },
            ElementBody::CameraShake,
            ElementBody::EffectMesh { mesh_file: file() },
            ElementBody::Effect {
                effect_file: file(),
                embedded: 1,
                length: 0.5,
            },
            ElementBody::Trail { trail_file: file() },
            ElementBody::PhysicGroup,
            ElementBody::Physic { physic_file: file() },
            ElementBody::Decal { decal_file: file() },
            ElementBody::Force,
            ElementBody::ForcePoint,
            ElementBody::AnimatedMesh {
                mesh_file: file(),
                animation_file: file(),
            },
            ElementBody::AnimatedMeshMaterial {
                mesh_material_file: file(),
            },
            ElementBody::WaterDecal { decal_file: file() },
            ElementBody::SfpSystem { system_file: file() },
            ElementBody::SfpEmitter,
            ElementBody::SfpForceField,
        ];
        for body in bodies {
            let bytes = to_bytes(&body).unwrap();
            assert_eq!(body.size(), bytes.len(), "{body:?}");
            assert_eq!(&bytes[..4], &body.header().to_le_bytes());
            let reparsed: ElementBody = from_bytes(&bytes).unwrap();
            assert_eq!(reparsed, body);
        }
    }

    #[test]
    fn end_markers_rebuild_the_tree() {
        assert_eq!(make_test_fx_master().parents(), vec![None, Some(0), None]);
    }

    #[test]
    fn effect_element_swallows_one_extra_marker() {
        let effect = |closing| FxMaster {
            elements: vec![make_test_element(
                "nested",
                ElementBody::Effect {
                    effect_file: PString::new("nested.fxb"),
                    embedded: 0,
                    length: 1.0,
                },
                closing,
            )],
            ..FxMaster::default()
        };
        let fx = effect(4);
        let reparsed: FxMaster = from_bytes(&to_bytes(&fx).unwrap()).unwrap();
        assert_eq!(reparsed, fx);

        // Three markers would close a plain element, but leave the effect's tree open.
        assert!(to_bytes(&effect(3)).is_err());
    }

    #[test]
    fn animated_meshes_may_have_any_track_marker_count() {
        let mut mesh = make_test_element(
            "mesh",
            ElementBody::AnimatedMesh {
                mesh_file: PString::new("a.bmd"),
                animation_file: PString::new("a.ska"),
            },
            3,
        );
        mesh.track_markers = 1;
        let fx = FxMaster {
            elements: vec![mesh.clone()],
            ..FxMaster::default()
        };
        let reparsed: FxMaster = from_bytes(&to_bytes(&fx).unwrap()).unwrap();
        assert_eq!(reparsed, fx);

        let mut sound = mesh;
        sound.body = ElementBody::Sound {
            sound_file: PString::new("a.snr"),
        };
        assert!(to_bytes(&sound).is_err());
    }

    #[test]
    fn unknown_element_type_is_a_variant_fault() {
        let mut bytes = to_bytes(&make_test_fx_master()).unwrap();
        let emitter = EMITTER.to_le_bytes();
        let at = bytes.windows(4).position(|w| w == emitter).unwrap();
        bytes[at..at + 4].copy_from_slice(&0xF800_0001u32.to_le_bytes());

        let err = from_bytes::<FxMaster>(&bytes).unwrap_err();
        match DrsError::from_record(RecordKind::FxMaster, err) {
            DrsError::Variant { record, value } => {
                assert_eq!(record, "Element");
                assert_eq!(value, 0xF800_0001);
            }
            other => panic!("expected a variant fault, got {other:?}"),
        }
    }

    #[test]
    fn control_header_without_control_points_is_kept() {
        let track = make_test_track(false);
        let bytes = to_bytes(&track).unwrap();
        assert_eq!(track.size(), bytes.len());
        assert_eq!(&bytes[bytes.len() - 4..], &END_CONTROL_POINTS.to_le_bytes());
        assert_eq!(from_bytes::<Track>(&bytes).unwrap(), track);
    }
}
