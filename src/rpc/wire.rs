//! Primitive field encode/decode.
//!
//! A self-describing, big-endian, length-prefixed encoding for the
//! primitive fields every RPC record is built from (spec §3/§4.B/§9): both
//! peers must agree on this format bit-for-bit, so the functions here are
//! the *only* place that ever reads or writes one of these fields. Modeled
//! on `parser/primitive.rs` in the teacher, minus XDR's 4-byte alignment
//! padding — nothing downstream of this wire format needs XDR
//! compatibility.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{DfsError, Result};

fn io_err(e: std::io::Error) -> DfsError {
    DfsError::RpcFailure(format!("wire io error: {e}"))
}

/// Writes a `u32` in big-endian order.
pub fn write_u32(dst: &mut impl Write, value: u32) -> Result<()> {
    dst.write_u32::<BigEndian>(value).map_err(io_err)
}

/// Reads a `u32` in big-endian order.
pub fn read_u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<BigEndian>().map_err(io_err)
}

/// Writes a `u64` in big-endian order.
pub fn write_u64(dst: &mut impl Write, value: u64) -> Result<()> {
    dst.write_u64::<BigEndian>(value).map_err(io_err)
}

/// Reads a `u64` in big-endian order.
pub fn read_u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<BigEndian>().map_err(io_err)
}

/// Writes an `i64` in big-endian order. Storage offsets and lengths are
/// signed on the wire so that a negative value (rejected with
/// [`DfsError::OutOfBounds`] by the storage adapter) can be represented at
/// all, rather than wrapping into an enormous `u64`.
pub fn write_i64(dst: &mut impl Write, value: i64) -> Result<()> {
    dst.write_i64::<BigEndian>(value).map_err(io_err)
}

/// Reads an `i64` in big-endian order.
pub fn read_i64(src: &mut impl Read) -> Result<i64> {
    src.read_i64::<BigEndian>().map_err(io_err)
}

/// Writes a `bool` as a single byte.
pub fn write_bool(dst: &mut impl Write, value: bool) -> Result<()> {
    dst.write_u8(value as u8).map_err(io_err)
}

/// Reads a `bool` from a single byte.
pub fn read_bool(src: &mut impl Read) -> Result<bool> {
    match src.read_u8().map_err(io_err)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DfsError::RpcFailure(format!("bad bool discriminant: {other}"))),
    }
}

/// Writes a length-prefixed byte vector.
pub fn write_bytes(dst: &mut impl Write, value: &[u8]) -> Result<()> {
    write_u32(dst, value.len() as u32)?;
    dst.write_all(value).map_err(io_err)
}

/// Reads a length-prefixed byte vector.
pub fn read_bytes(src: &mut impl Read) -> Result<Vec<u8>> {
    let len = read_u32(src)? as usize;
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf).map_err(io_err)?;
    Ok(buf)
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string(dst: &mut impl Write, value: &str) -> Result<()> {
    write_bytes(dst, value.as_bytes())
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string(src: &mut impl Read) -> Result<String> {
    let bytes = read_bytes(src)?;
    String::from_utf8(bytes).map_err(|e| DfsError::RpcFailure(format!("bad utf-8: {e}")))
}

/// Writes a sequence, preceded by its element count.
pub fn write_seq<T>(
    dst: &mut impl Write,
    items: &[T],
    mut write_one: impl FnMut(&mut dyn Write, &T) -> Result<()>,
) -> Result<()> {
    write_u32(dst, items.len() as u32)?;
    for item in items {
        write_one(dst, item)?;
    }
    Ok(())
}

/// Reads a sequence, preceded by its element count.
pub fn read_seq<T>(
    src: &mut impl Read,
    mut read_one: impl FnMut(&mut dyn Read) -> Result<T>,
) -> Result<Vec<T>> {
    let len = read_u32(src)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_one(src)?);
    }
    Ok(out)
}

/// Writes an `Option<T>` as a leading boolean followed by the value.
pub fn write_option<T>(
    dst: &mut impl Write,
    value: &Option<T>,
    write_some: impl FnOnce(&mut dyn Write, &T) -> Result<()>,
) -> Result<()> {
    match value {
        Some(v) => {
            write_bool(dst, true)?;
            write_some(dst, v)
        }
        None => write_bool(dst, false),
    }
}

/// Reads an `Option<T>` as a leading boolean followed by the value.
pub fn read_option<T>(
    src: &mut impl Read,
    read_some: impl FnOnce(&mut dyn Read) -> Result<T>,
) -> Result<Option<T>> {
    if read_bool(src)? {
        Ok(Some(read_some(src)?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_primitives() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 42).unwrap();
        write_bool(&mut buf, true).unwrap();
        write_string(&mut buf, "hello").unwrap();
        write_bytes(&mut buf, &[1, 2, 3]).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(read_u32(&mut cur).unwrap(), 42);
        assert!(read_bool(&mut cur).unwrap());
        assert_eq!(read_string(&mut cur).unwrap(), "hello");
        assert_eq!(read_bytes(&mut cur).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn round_trips_signed_offsets() {
        let mut buf = Vec::new();
        write_i64(&mut buf, -1).unwrap();
        write_i64(&mut buf, i64::MAX).unwrap();

        let mut cur = Cursor::new(buf);
        assert_eq!(read_i64(&mut cur).unwrap(), -1);
        assert_eq!(read_i64(&mut cur).unwrap(), i64::MAX);
    }

    #[test]
    fn round_trips_seq_and_option() {
        let mut buf = Vec::new();
        write_seq(&mut buf, &["a".to_string(), "b".to_string()], |w, s| write_string(w, s))
            .unwrap();
        write_option(&mut buf, &Some(7u32), |w, v| write_u32(w, *v)).unwrap();
        write_option(&mut buf, &None::<u32>, |w, v| write_u32(w, *v)).unwrap();

        let mut cur = Cursor::new(buf);
        let seq = read_seq(&mut cur, |r| read_string(r)).unwrap();
        assert_eq!(seq, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(read_option(&mut cur, |r| read_u32(r)).unwrap(), Some(7));
        assert_eq!(read_option(&mut cur, |r| read_u32(r)).unwrap(), None);
    }

    #[test]
    fn rejects_bad_bool_discriminant() {
        let mut cur = Cursor::new(vec![5u8]);
        assert!(read_bool(&mut cur).is_err());
    }
}
