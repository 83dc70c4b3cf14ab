//! Building grids (`.bmg`) and their per-cell state sets.
//!
//! A `MeshSetGrid` is `(2w + 1) * (2h + 1)` modules laid out row by row, followed by the
//! locator list of the whole building. Each module may carry a `StateBasedMeshSet` that
//! swaps meshes as the building takes damage.

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use serde::Serialize;

use crate::primitive::{list_size, read, read_list, write, write_list, PString, Record};
use crate::records::locator::CDrwLocatorList;

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct MeshStateFiles {
    pub uk_file: PString,
    pub drs_file: PString,
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct SMeshState {
    pub state_num: i32,

    /// Presence flag as stored. Any nonzero value means `files` follows.
    #[bw(assert((*has_files != 0) == files.is_some(), "mesh state flag {} disagrees with its files", has_files))]
    pub has_files: i16,

    #[br(if(has_files != 0))]
    pub files: Option<MeshStateFiles>,
}

impl Record for SMeshState {
    fn size(&self) -> usize {
        6 + self.files.as_ref().map_or(0, |f| f.uk_file.size() + f.drs_file.size())
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct DestructionState {
    pub state_num: i32,
    pub file_name: PString,
}

impl Record for DestructionState {
    fn size(&self) -> usize {
        4 + self.file_name.size()
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct StateBasedMeshSet {
    pub uk: i16,
    pub uk2: i32,

    #[br(temp, assert(mesh_state_count >= 0, "negative mesh state count {}", mesh_state_count))]
    #[bw(try_calc = i32::try_from(mesh_states.len()))]
    mesh_state_count: i32,

    #[br(count = mesh_state_count as usize)]
    pub mesh_states: Vec<SMeshState>,

    #[br(temp, assert(destruction_state_count >= 0, "negative destruction state count {}", destruction_state_count))]
    #[bw(try_calc = i32::try_from(destruction_states.len()))]
    destruction_state_count: i32,

    #[br(count = destruction_state_count as usize)]
    pub destruction_states: Vec<DestructionState>,
}

impl Default for StateBasedMeshSet {
    fn default() -> Self {
        StateBasedMeshSet {
            uk: 1,
            uk2: 11,
            mesh_states: Vec::new(),
            destruction_states: Vec::new(),
        }
    }
}

impl Record for StateBasedMeshSet {
    fn size(&self) -> usize {
        2 + 4 + 4 + list_size(&self.mesh_states) + 4 + list_size(&self.destruction_states)
    }
}

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[brw(little)]
pub struct MeshGridModule {
    pub uk: i16,

    /// Presence flag as stored. Any nonzero value means a state set follows.
    #[bw(assert(
        (*has_mesh_set != 0) == state_based_mesh_set.is_some(),
        "module flag {} disagrees with its state set",
        has_mesh_set
    ))]
    pub has_mesh_set: u8,

    #[br(if(has_mesh_set != 0))]
    pub state_based_mesh_set: Option<StateBasedMeshSet>,
}

impl Record for MeshGridModule {
    fn size(&self) -> usize {
        3 + self.state_based_mesh_set.as_ref().map_or(0, Record::size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSetGrid {
    pub revision: i16,
    pub grid_width: u8,
    pub grid_height: u8,
    pub name: PString,
    pub uuid: PString,
    pub grid_rotation: i16,
    pub ground_decal: PString,
    pub uk_string0: PString,
    pub uk_string1: PString,
    pub module_distance: f32,
    pub is_center_pivoted: u8,
    pub mesh_modules: Vec<MeshGridModule>,
    pub locator_list: CDrwLocatorList,
}

impl Default for MeshSetGrid {
    fn default() -> Self {
        MeshSetGrid {
            revision: 5,
            grid_width: 0,
            grid_height: 0,
            name: PString::default(),
            uuid: PString::default(),
            grid_rotation: 0,
            ground_decal: PString::default(),
            uk_string0: PString::default(),
            uk_string1: PString::default(),
            module_distance: 2.0,
            is_center_pivoted: 0,
            mesh_modules: vec![MeshGridModule::default()],
            locator_list: CDrwLocatorList::default(),
        }
    }
}

/// Number of modules a grid of the given half-extents holds.
pub fn module_count(grid_width: u8, grid_height: u8) -> usize {
    (grid_width as usize * 2 + 1) * (grid_height as usize * 2 + 1)
}

impl BinRead for MeshSetGrid {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(reader: &mut R, _: Endian, _: Self::Args<'_>) -> BinResult<Self> {
        let revision = read(reader)?;
        let grid_width = read(reader)?;
        let grid_height = read(reader)?;
        Ok(MeshSetGrid {
            revision,
            grid_width,
            grid_height,
            name: read(reader)?,
            uuid: read(reader)?,
            grid_rotation: read(reader)?,
            ground_decal: read(reader)?,
            uk_string0: read(reader)?,
            uk_string1: read(reader)?,
            module_distance: read(reader)?,
            is_center_pivoted: read(reader)?,
            mesh_modules: read_list(reader, module_count(grid_width, grid_height))?,
            locator_list: read(reader)?,
        })
    }
}

impl BinWrite for MeshSetGrid {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(&self, writer: &mut W, _: Endian, _: Self::Args<'_>) -> BinResult<()> {
        let expected = module_count(self.grid_width, self.grid_height);
        if self.mesh_modules.len() != expected {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: format!(
                    "{}x{} grid needs {} modules, found {}",
                    self.grid_width,
                    self.grid_height,
                    expected,
                    self.mesh_modules.len()
                ),
            });
        }
        write(writer, &self.revision)?;
        write(writer, &self.grid_width)?;
        write(writer, &self.grid_height)?;
        write(writer, &self.name)?;
        write(writer, &self.uuid)?;
        write(writer, &self.grid_rotation)?;
        write(writer, &self.ground_decal)?;
        write(writer, &self.uk_string0)?;
        write(writer, &self.uk_string1)?;
        write(writer, &self.module_distance)?;
        write(writer, &self.is_center_pivoted)?;
        write_list(writer, &self.mesh_modules)?;
        write(writer, &self.locator_list)
    }
}

impl Record for MeshSetGrid {
    fn size(&self) -> usize {
        2 + 1
            + 1
            + self.name.size()
            + self.uuid.size()
            + 2
            + self.ground_decal.size()
            + self.uk_string0.size()
            + self.uk_string1.size()
            + 4
            + 1
            + list_size(&self.mesh_modules)
            + self.locator_list.size()
    }
}
