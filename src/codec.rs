//! Big-endian primitives of the map stream format.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::MapError;

pub fn write_i32<W: Write>(out: &mut W, value: i32) -> Result<(), MapError> {
    out.write_i32::<BigEndian>(value)?;
    Ok(())
}

pub fn read_i32<R: Read>(input: &mut R) -> Result<i32, MapError> {
    Ok(input.read_i32::<BigEndian>()?)
}

/// UTF-8 bytes behind a `u16` byte length.
pub fn write_str<W: Write>(out: &mut W, value: &str) -> Result<(), MapError> {
    let len = u16::try_from(value.len())
        .map_err(|_| MapError::malformed(format!("string of {} bytes is too long", value.len())))?;
    out.write_u16::<BigEndian>(len)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

pub fn read_str<R: Read>(input: &mut R) -> Result<String, MapError> {
    let len = input.read_u16::<BigEndian>()?;
    let mut bytes = vec![0u8; usize::from(len)];
    input.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| MapError::malformed(format!("invalid UTF-8 string: {e}")))
}
