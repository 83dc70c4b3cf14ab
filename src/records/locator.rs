//! Attachment points: `CDrwLocatorList` (effects, turrets, hit points) and the
//! gameplay-side `CGdLocatorList`.

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::error::variant_fault;
use crate::math::CoordinateSystem;
use crate::primitive::{list_size, read, read_count, read_list, write, write_count, write_list, PString, Record};

pub const LOCATOR_LIST_MAGIC: i32 = 281702437;

/// What a locator anchors. Ids outside the table are kept as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocatorClass {
    HealthBar,
    DestructiblePart,
    Construction,
    Turret,
    FxbIdle,
    Wheel,
    StaticPerm,
    Unknown7,
    DynamicPerm,
    DamageFlameSmall,
    DamageFlameSmallSmoke,
    DamageFlameLarge,
    DamageSmokeOnly,
    DamageFlameHuge,
    SpellCast,
    SpellHitAll,
    Hit,
    ProjectileSpawn,
    Unknown(i32),
}

impl LocatorClass {
    pub fn from_id(id: i32) -> Self {
        match id {
            0 => LocatorClass::HealthBar,
            1 => LocatorClass::DestructiblePart,
            2 => LocatorClass::Construction,
            3 => LocatorClass::Turret,
            4 => LocatorClass::FxbIdle,
            5 => LocatorClass::Wheel,
            6 => LocatorClass::StaticPerm,
            7 => LocatorClass::Unknown7,
            8 => LocatorClass::DynamicPerm,
            9 => LocatorClass::DamageFlameSmall,
            10 => LocatorClass::DamageFlameSmallSmoke,
            11 => LocatorClass::DamageFlameLarge,
            12 => LocatorClass::DamageSmokeOnly,
            13 => LocatorClass::DamageFlameHuge,
            14 => LocatorClass::SpellCast,
            15 => LocatorClass::SpellHitAll,
            16 => LocatorClass::Hit,
            29 => LocatorClass::ProjectileSpawn,
            other => LocatorClass::Unknown(other),
        }
    }

    pub fn id(self) -> i32 {
        match self {
            LocatorClass::HealthBar => 0,
            LocatorClass::DestructiblePart => 1,
            LocatorClass::Construction => 2,
            LocatorClass::Turret => 3,
            LocatorClass::FxbIdle => 4,
            LocatorClass::Wheel => 5,
            LocatorClass::StaticPerm => 6,
            LocatorClass::Unknown7 => 7,
            LocatorClass::DynamicPerm => 8,
            LocatorClass::DamageFlameSmall => 9,
            LocatorClass::DamageFlameSmallSmoke => 10,
            LocatorClass::DamageFlameLarge => 11,
            LocatorClass::DamageSmokeOnly => 12,
            LocatorClass::DamageFlameHuge => 13,
            LocatorClass::SpellCast => 14,
            LocatorClass::SpellHitAll => 15,
            LocatorClass::Hit => 16,
            LocatorClass::ProjectileSpawn => 29,
            LocatorClass::Unknown(id) => id,
        }
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[brw(little)]
#[br(import(version: i32))]
pub struct SLocator {
    pub coordinate_system: CoordinateSystem,

    #[br(map = |id: i32| LocatorClass::from_id(id))]
    #[bw(map = |class: &LocatorClass| class.id())]
    pub class: LocatorClass,

    pub bone_id: i32,
    pub file_name: PString,

    /// Only version 5 lists carry this word.
    #[br(if(version == 5))]
    pub uk_int: Option<i32>,
}

impl Record for SLocator {
    fn size(&self) -> usize {
        CoordinateSystem::SIZE + 8 + self.file_name.size() + self.uk_int.map_or(0, |_| 4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CDrwLocatorList {
    pub magic: i32,
    pub version: i32,
    pub locators: Vec<SLocator>,
}

impl Default for CDrwLocatorList {
    fn default() -> Self {
        CDrwLocatorList {
            magic: LOCATOR_LIST_MAGIC,
            version: 5,
            locators: Vec::new(),
        }
    }
}

impl BinRead for CDrwLocatorList {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, endian: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let magic = read(reader)?;
        let version: i32 = read(reader)?;
        let count = read_count::<i32, _>(reader, "locator count")?;
        let mut locators = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            locators.push(SLocator::read_options(reader, endian, (version,))?);
        }
        Ok(CDrwLocatorList { magic, version, locators })
    }
}

impl BinWrite for CDrwLocatorList {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        let wants_word = self.version == 5;
        if self.locators.iter().any(|locator| locator.uk_int.is_some() != wants_word) {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: format!(
                    "locator list version {} {} a trailing word on every locator",
                    self.version,
                    if wants_word { "requires" } else { "forbids" }
                ),
            });
        }
        write(writer, &self.magic)?;
        write(writer, &self.version)?;
        write_count::<i32, _>(writer, self.locators.len(), "locator")?;
        write_list(writer, &self.locators)
    }
}

impl Record for CDrwLocatorList {
    fn size(&self) -> usize {
        12 + list_size(&self.locators)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[brw(little)]
pub struct GdLocator {
    pub coordinate_system: CoordinateSystem,
    pub class_id: i16,
    pub sub_id: i16,
}

impl Record for GdLocator {
    fn size(&self) -> usize {
        CoordinateSystem::SIZE + 4
    }
}

/// Version 2 lists carry entries. Version 1 lists end after the version word.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CGdLocatorList {
    pub magic: i32,
    pub version: i32,
    pub locators: Vec<GdLocator>,
}

impl Default for CGdLocatorList {
    fn default() -> Self {
        CGdLocatorList {
            magic: LOCATOR_LIST_MAGIC,
            version: 2,
            locators: Vec::new(),
        }
    }
}

impl BinRead for CGdLocatorList {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let magic = read(reader)?;
        let version: i32 = read(reader)?;
        let locators = match version {
            1 => Vec::new(),
            2 => {
                let count = read_count::<i32, _>(reader, "locator count")?;
                read_list(reader, count)?
            }
            other => return Err(variant_fault(reader, "CGdLocatorList", other.into())),
        };
        Ok(CGdLocatorList { magic, version, locators })
    }
}

impl BinWrite for CGdLocatorList {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        match self.version {
            1 => {
                write(writer, &self.magic)?;
                write(writer, &self.version)
            }
            2 => {
                write(writer, &self.magic)?;
                write(writer, &self.version)?;
                write_count::<i32, _>(writer, self.locators.len(), "locator")?;
                write_list(writer, &self.locators)
            }
            other => Err(variant_fault(writer, "CGdLocatorList", other.into())),
        }
    }
}

impl Record for CGdLocatorList {
    fn size(&self) -> usize {
        match self.version {
            1 => 8,
            _ => 12 + list_size(&self.locators),
        }
    }
}
