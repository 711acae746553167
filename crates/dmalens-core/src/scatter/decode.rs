//! Typed decoding of raw page buffers.

use encoding_rs::WINDOWS_1252;

use crate::error::{Error, Result};
use crate::scatter::entry::{ScatterValue, TypeTag};

/// Decode `buf` according to `tag`.
///
/// Fixed-size tags require an exact length match; list tags require a
/// whole number of records. Anything else is a [`Error::DecodeMismatch`].
pub fn decode(tag: TypeTag, buf: &[u8]) -> Result<ScatterValue> {
    match tag {
        TypeTag::Ptr => {
            let value = u64::from_le_bytes(exact(tag, buf)?);
            if value == 0 {
                return Err(Error::NullPointer);
            }
            Ok(ScatterValue::Ptr(value))
        }
        TypeTag::I32 => Ok(ScatterValue::I32(i32::from_le_bytes(exact(tag, buf)?))),
        TypeTag::F32 => Ok(ScatterValue::F32(f32::from_le_bytes(exact(tag, buf)?))),
        TypeTag::Bool => {
            let [b]: [u8; 1] = exact(tag, buf)?;
            Ok(ScatterValue::Bool(b != 0))
        }
        TypeTag::Vec2 => {
            let raw: [u8; 8] = exact(tag, buf)?;
            Ok(ScatterValue::Vec2([
                f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
                f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
            ]))
        }
        TypeTag::Bytes => Ok(ScatterValue::Bytes(buf.to_vec())),
        TypeTag::Str => Ok(ScatterValue::Str(decode_narrow(buf))),
        TypeTag::WStr => Ok(ScatterValue::Str(decode_wide(buf)?)),
        TypeTag::I32List => {
            if buf.len() % 4 != 0 {
                return Err(Error::DecodeMismatch {
                    tag,
                    len: buf.len(),
                });
            }
            Ok(ScatterValue::I32List(
                buf.chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ))
        }
        TypeTag::Vec4List => {
            if buf.len() % 16 != 0 {
                return Err(Error::DecodeMismatch {
                    tag,
                    len: buf.len(),
                });
            }
            Ok(ScatterValue::Vec4List(
                buf.chunks_exact(16)
                    .map(|c| {
                        [
                            f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                            f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                            f32::from_le_bytes([c[8], c[9], c[10], c[11]]),
                            f32::from_le_bytes([c[12], c[13], c[14], c[15]]),
                        ]
                    })
                    .collect(),
            ))
        }
    }
}

/// Copy `buf` into a fixed-size array, requiring an exact length match.
///
/// Any other length is a [`Error::DecodeMismatch`] carrying `tag` and the
/// actual length.
fn exact<const N: usize>(tag: TypeTag, buf: &[u8]) -> Result<[u8; N]> {
    buf.try_into().map_err(|_| Error::DecodeMismatch {
        tag,
        len: buf.len(),
    })
}

/// Narrow string: single-byte codec, truncated at the first terminator.
pub fn decode_narrow(buf: &[u8]) -> String {
    let end = memchr::memchr(0, buf).unwrap_or(buf.len());
    let (text, _, _) = WINDOWS_1252.decode(&buf[..end]);
    text.into_owned()
}

/// Wide string: UTF-16LE with trailing terminators trimmed. Odd lengths
/// and invalid code unit sequences are decode mismatches.
pub fn decode_wide(buf: &[u8]) -> Result<String> {
    if buf.len() % 2 != 0 {
        return Err(Error::DecodeMismatch {
            tag: TypeTag::WStr,
            len: buf.len(),
        });
    }
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let text = String::from_utf16(&units).map_err(|_| Error::DecodeMismatch {
        tag: TypeTag::WStr,
        len: buf.len(),
    })?;
    Ok(text.trim_end_matches('\0').to_string())
}
