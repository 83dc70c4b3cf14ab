use binrw::binrw;
use serde::Serialize;

use crate::primitive::{PString, Record};

#[binrw]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[brw(little)]
pub struct DrwResourceMeta {
    pub version: i32,
    /// Unit tier in the 0..=3 range.
    pub unknown: i32,
    pub hash: PString,
}

impl Default for DrwResourceMeta {
    fn default() -> Self {
        DrwResourceMeta {
            version: 1,
            unknown: 1,
            hash: PString::default(),
        }
    }
}

impl Record for DrwResourceMeta {
    fn size(&self) -> usize {
        8 + self.hash.size()
    }
}
