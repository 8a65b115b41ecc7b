/*!

Low-level binary primitives shared by `save.rs`/`load.rs` (`spec.md` §4.6). Hand-rolled, not `bincode`/`serde`: the
format is a fixed little-endian layout with NUL-terminated strings, mirroring the reference implementation's own
byte-for-byte scheme closely enough that the version/size tags mean something.

*/

use crate::error::{EngineError, EngineResult};

pub const MAGIC_PREFIX: &[u8] = b"RULECORE-BSAVE\0";
pub const FORMAT_VERSION: &[u8] = b"1\0";

pub fn write_cstring(buf: &mut Vec<u8>, s: &str) {
  buf.extend_from_slice(s.as_bytes());
  buf.push(0);
}

pub fn read_cstring(bytes: &[u8], pos: &mut usize) -> EngineResult<String> {
  let start = *pos;
  loop {
    match bytes.get(*pos) {
      Some(0) => break,
      Some(_) => *pos += 1,
      None => return Err(EngineError::FormatError("unterminated string in binary image".to_string())),
    }
  }
  let text = std::str::from_utf8(&bytes[start..*pos])
      .map_err(|err| EngineError::FormatError(err.to_string()))?
      .to_string();
  *pos += 1;
  Ok(text)
}

pub fn write_u8(buf: &mut Vec<u8>, v: u8) {
  buf.push(v);
}

pub fn read_u8(bytes: &[u8], pos: &mut usize) -> EngineResult<u8> {
  let byte = *bytes.get(*pos).ok_or_else(|| EngineError::FormatError("truncated binary image".to_string()))?;
  *pos += 1;
  Ok(byte)
}

pub fn write_u32(buf: &mut Vec<u8>, v: u32) {
  buf.extend_from_slice(&v.to_le_bytes());
}

pub fn read_u32(bytes: &[u8], pos: &mut usize) -> EngineResult<u32> {
  let slice = read_slice(bytes, pos, 4)?;
  Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
  buf.extend_from_slice(&v.to_le_bytes());
}

pub fn read_u64(bytes: &[u8], pos: &mut usize) -> EngineResult<u64> {
  let slice = read_slice(bytes, pos, 8)?;
  Ok(u64::from_le_bytes(slice.try_into().unwrap()))
}

pub fn write_i64(buf: &mut Vec<u8>, v: i64) {
  buf.extend_from_slice(&v.to_le_bytes());
}

pub fn read_i64(bytes: &[u8], pos: &mut usize) -> EngineResult<i64> {
  let slice = read_slice(bytes, pos, 8)?;
  Ok(i64::from_le_bytes(slice.try_into().unwrap()))
}

pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
  buf.extend_from_slice(&v.to_le_bytes());
}

pub fn read_f64(bytes: &[u8], pos: &mut usize) -> EngineResult<f64> {
  let slice = read_slice(bytes, pos, 8)?;
  Ok(f64::from_le_bytes(slice.try_into().unwrap()))
}

pub fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
  write_u32(buf, data.len() as u32);
  buf.extend_from_slice(data);
}

pub fn read_bytes(bytes: &[u8], pos: &mut usize) -> EngineResult<Vec<u8>> {
  let len = read_u32(bytes, pos)? as usize;
  Ok(read_slice(bytes, pos, len)?.to_vec())
}

fn read_slice<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> EngineResult<&'a [u8]> {
  let end = pos.checked_add(len).ok_or_else(|| EngineError::FormatError("length overflow".to_string()))?;
  let slice = bytes.get(*pos..end).ok_or_else(|| EngineError::FormatError("truncated binary image".to_string()))?;
  *pos = end;
  Ok(slice)
}
