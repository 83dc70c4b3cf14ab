//! Primitive codec shared by every record.
//!
//! All values are little-endian. Counts and string lengths are stored as a separate prefix in
//! front of the data they describe:
//!
//! ```text
//! PString   i32 length | u8[length]
//! list      <int> count | T[count]
//! ```
//!
//! Nothing here knows about record semantics. Callers decide how many bytes a field takes.

use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};
use serde::{Serialize, Serializer};

/// A payload or nested structure with a known encoded length.
///
/// Decoding and encoding go through binrw's `BinRead`/`BinWrite`. `size` must be pure and
/// must equal the number of bytes the `BinWrite` impl emits, since the writer lays out
/// offsets from it before any byte is written.
pub trait Record {
    fn size(&self) -> usize;
}

pub fn read<T, R>(reader: &mut R) -> BinResult<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
    R: Read + Seek,
{
    T::read_options(reader, Endian::Little, ())
}

pub fn write<T, W>(writer: &mut W, value: &T) -> BinResult<()>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
    W: Write + Seek,
{
    value.write_options(writer, Endian::Little, ())
}

pub fn from_bytes<T>(bytes: &[u8]) -> BinResult<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    read(&mut Cursor::new(bytes))
}

pub fn to_bytes<T>(value: &T) -> BinResult<Vec<u8>>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::new());
    write(&mut cursor, value)?;
    Ok(cursor.into_inner())
}

/// Reads a count prefix of type `T`, rejecting values that do not fit a length.
pub fn read_count<T, R>(reader: &mut R, what: &str) -> BinResult<usize>
where
    T: for<'a> BinRead<Args<'a> = ()> + TryInto<usize> + Copy + fmt::Display,
    R: Read + Seek,
{
    let pos = reader.stream_position()?;
    let raw: T = read(reader)?;
    raw.try_into().map_err(|_| binrw::Error::AssertFail {
        pos,
        message: format!("invalid {} {}", what, raw),
    })
}

pub fn read_list<T, R>(reader: &mut R, count: usize) -> BinResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()>,
    R: Read + Seek,
{
    // A corrupt count must not trigger a huge allocation before the reads fail.
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(read(reader)?);
    }
    Ok(items)
}

/// Writes `len` as a count prefix of type `T`, failing when it does not fit.
pub fn write_count<T, W>(writer: &mut W, len: usize, what: &str) -> BinResult<()>
where
    T: for<'a> BinWrite<Args<'a> = ()> + TryFrom<usize>,
    W: Write + Seek,
{
    let pos = writer.stream_position()?;
    let count = T::try_from(len).map_err(|_| binrw::Error::AssertFail {
        pos,
        message: format!("{} count {} does not fit its prefix", what, len),
    })?;
    write(writer, &count)
}

pub fn write_list<T, W>(writer: &mut W, items: &[T]) -> BinResult<()>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
    W: Write + Seek,
{
    for item in items {
        write(writer, item)?;
    }
    Ok(())
}

pub fn list_size<T: Record>(items: &[T]) -> usize {
    items.iter().map(Record::size).sum()
}

macro_rules! scalar_record {
    ($($ty:ty),*) => {
        $(
            impl Record for $ty {
                fn size(&self) -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

scalar_record!(u8, i8, u16, i16, u32, i32, f32);

/// Length-prefixed byte string.
///
/// Trailing NUL padding is split off on decode and written back on encode, so the stored
/// length survives a round trip while `as_str` never shows the padding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PString {
    bytes: Vec<u8>,
    nul_padding: usize,
}

impl PString {
    pub fn new(text: &str) -> Self {
        Self {
            bytes: text.as_bytes().to_vec(),
            nul_padding: 0,
        }
    }

    pub fn from_raw(raw: Vec<u8>) -> Self {
        let text_len = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let nul_padding = raw.len() - text_len;
        let mut bytes = raw;
        bytes.truncate(text_len);
        Self { bytes, nul_padding }
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn nul_padding(&self) -> usize {
        self.nul_padding
    }

    /// Value of the length prefix.
    pub fn encoded_len(&self) -> usize {
        self.bytes.len() + self.nul_padding
    }

    pub fn is_empty(&self) -> bool {
        self.encoded_len() == 0
    }
}

impl From<&str> for PString {
    fn from(text: &str) -> Self {
        PString::new(text)
    }
}

impl fmt::Display for PString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for PString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl BinRead for PString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let len = read_count::<i32, _>(reader, "string length")?;
        let mut raw = vec![0u8; len];
        reader.read_exact(&mut raw)?;
        Ok(PString::from_raw(raw))
    }
}

impl BinWrite for PString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        let pos = writer.stream_position()?;
        let len = i32::try_from(self.encoded_len()).map_err(|_| binrw::Error::AssertFail {
            pos,
            message: format!("string of {} bytes does not fit its length prefix", self.encoded_len()),
        })?;
        len.write_options(writer, endian, ())?;
        writer.write_all(&self.bytes)?;
        writer.write_all(&vec![0u8; self.nul_padding])?;
        Ok(())
    }
}

impl Record for PString {
    fn size(&self) -> usize {
        4 + self.encoded_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pstring_strips_and_restores_padding() {
        let mut raw = 6i32.to_le_bytes().to_vec();
        raw.extend_from_slice(b"mesh\0\0");

        let name: PString = from_bytes(&raw).unwrap();
        assert_eq!(name.as_str(), "mesh");
        assert_eq!(name.nul_padding(), 2);
        assert_eq!(name.size(), raw.len());
        assert_eq!(to_bytes(&name).unwrap(), raw);
    }

    #[test]
    fn count_that_does_not_fit_is_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        write_count::<u8, _>(&mut cursor, 255, "block").unwrap();
        let err = write_count::<u8, _>(&mut cursor, 256, "block").unwrap_err();
        assert!(matches!(err, binrw::Error::AssertFail { pos: 1, .. }), "{err}");
        assert_eq!(cursor.into_inner(), vec![255]);
    }

    #[test]
    fn new_pstring_has_no_padding() {
        let name = PString::new("root node");
        let bytes = to_bytes(&name).unwrap();
        assert_eq!(&bytes[..4], &9i32.to_le_bytes());
        assert_eq!(&bytes[4..], b"root node");
    }

    #[test]
    fn negative_count_is_rejected() {
        let raw = (-3i32).to_le_bytes();
        let result = read_count::<i32, _>(&mut Cursor::new(&raw[..]), "face count");
        assert!(result.is_err());
    }

    #[test]
    fn truncated_list_fails() {
        let raw = [1u8, 0, 0, 0, 2, 0];
        let result: BinResult<Vec<i32>> = read_list(&mut Cursor::new(&raw[..]), 2);
        assert!(result.is_err());
    }
}
