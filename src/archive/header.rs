use binrw::binrw;
use serde::Serialize;

use crate::error::{DrsError, Result};
use crate::primitive::Record;

pub const DRS_MAGIC: i32 = -981667554;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[brw(little)]
pub struct DrsHeader {
    pub magic: i32,
    pub model_count: i32,
    pub index_table_offset: i32,
    pub hierarchy_offset: i32,
    /// Entries in both tables, root included.
    pub node_count: u32,
}

impl DrsHeader {
    pub const SIZE: usize = 20;

    pub fn validate(&self) -> Result<()> {
        if self.magic != DRS_MAGIC || self.node_count < 1 {
            return Err(DrsError::Format {
                magic: self.magic,
                node_count: self.node_count,
            });
        }
        Ok(())
    }
}

impl Default for DrsHeader {
    fn default() -> Self {
        DrsHeader {
            magic: DRS_MAGIC,
            model_count: 1,
            index_table_offset: Self::SIZE as i32,
            hierarchy_offset: Self::SIZE as i32,
            node_count: 1,
        }
    }
}

impl Record for DrsHeader {
    fn size(&self) -> usize {
        Self::SIZE
    }
}
