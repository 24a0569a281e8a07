//! Fixed-offset big-endian field access and IBM decimal encodings.
//!
//! The integer accessors index directly into a caller-sized buffer. An offset that does not
//! leave room for the field is a programming error and panics; the decimal decoders validate
//! their input because it comes straight off the wire.
use rust_decimal::Decimal;

use crate::error::ReadError;

/// # Panics
///
/// If `offset + 2` exceeds the buffer length.
pub fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

/// # Panics
///
/// If `offset + 4` exceeds the buffer length.
pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// # Panics
///
/// If `offset + 4` exceeds the buffer length.
pub fn get_i32(buf: &[u8], offset: usize) -> i32 {
    get_u32(buf, offset) as i32
}

/// # Panics
///
/// If `offset + 8` exceeds the buffer length.
pub fn get_i64(buf: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    i64::from_be_bytes(bytes)
}

pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

pub fn put_i32(buf: &mut [u8], offset: usize, value: i32) {
    put_u32(buf, offset, value as u32);
}

/// Checked variant of [`get_u16`] for data that was received from a host.
pub fn read_u16(buf: &[u8], offset: usize, what: &'static str) -> Result<u16, ReadError> {
    ensure(buf, offset, 2, what)?;
    Ok(get_u16(buf, offset))
}

/// Checked variant of [`get_u32`] for data that was received from a host.
pub fn read_u32(buf: &[u8], offset: usize, what: &'static str) -> Result<u32, ReadError> {
    ensure(buf, offset, 4, what)?;
    Ok(get_u32(buf, offset))
}

/// Checked variant of [`get_i32`] for data that was received from a host.
pub fn read_i32(buf: &[u8], offset: usize, what: &'static str) -> Result<i32, ReadError> {
    ensure(buf, offset, 4, what)?;
    Ok(get_i32(buf, offset))
}

pub(crate) fn ensure(
    buf: &[u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<(), ReadError> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(ReadError::truncated(
            what,
            offset.saturating_add(len),
            buf.len(),
        )),
    }
}

const PACKED_POSITIVE: u8 = 0x0F;
const PACKED_NEGATIVE: u8 = 0x0D;

fn negative_sign(nibble: u8) -> Result<bool, ReadError> {
    match nibble {
        0x0B | 0x0D => Ok(true),
        0x0A | 0x0C | 0x0E | 0x0F => Ok(false),
        other => Err(ReadError::InvalidFormat(format!(
            "Invalid decimal sign nibble 0x{:X}",
            other
        ))),
    }
}

fn digit(nibble: u8) -> Result<i128, ReadError> {
    if nibble > 9 {
        return Err(ReadError::InvalidFormat(format!(
            "Invalid decimal digit nibble 0x{:X}",
            nibble
        )));
    }
    Ok(nibble as i128)
}

/// Appends a digit, failing once the value no longer fits the mantissa.
fn push_digit(mantissa: i128, digit: i128) -> Result<i128, ReadError> {
    mantissa
        .checked_mul(10)
        .and_then(|m| m.checked_add(digit))
        .ok_or_else(|| ReadError::InvalidFormat("Decimal out of range".to_string()))
}

fn scaled(mantissa: i128, scale: u32) -> Result<Decimal, ReadError> {
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map_err(|e| ReadError::InvalidFormat(format!("Decimal out of range: {}", e)))
}

/// Decodes a packed (BCD) decimal. The last nibble carries the sign.
pub fn decode_packed(bytes: &[u8], scale: u32) -> Result<Decimal, ReadError> {
    let Some((&last, leading)) = bytes.split_last() else {
        return Err(ReadError::truncated("packed decimal", 1, 0));
    };
    let mut mantissa: i128 = 0;
    for &b in leading {
        mantissa = push_digit(mantissa, digit(b >> 4)?)?;
        mantissa = push_digit(mantissa, digit(b & 0x0F)?)?;
    }
    mantissa = push_digit(mantissa, digit(last >> 4)?)?;
    if negative_sign(last & 0x0F)? {
        mantissa = -mantissa;
    }
    scaled(mantissa, scale)
}

/// Encodes `value` as a packed decimal with `precision` digits and `scale` fractional digits.
///
/// The result occupies `precision / 2 + 1` bytes. Values that do not fit are rejected.
pub fn encode_packed(value: Decimal, precision: u32, scale: u32) -> Result<Vec<u8>, ReadError> {
    let mut rescaled = value;
    rescaled.rescale(scale);
    if rescaled.scale() != scale {
        return Err(ReadError::Conversion(format!(
            "{} cannot be represented with scale {}",
            value, scale
        )));
    }
    let negative = rescaled.is_sign_negative() && !rescaled.is_zero();
    let mut mantissa = rescaled.mantissa().unsigned_abs();

    let len = precision as usize / 2 + 1;
    let mut out = vec![0u8; len];
    out[len - 1] = ((mantissa % 10) as u8) << 4
        | if negative {
            PACKED_NEGATIVE
        } else {
            PACKED_POSITIVE
        };
    mantissa /= 10;
    for byte in out[..len - 1].iter_mut().rev() {
        let low = (mantissa % 10) as u8;
        mantissa /= 10;
        let high = (mantissa % 10) as u8;
        mantissa /= 10;
        *byte = high << 4 | low;
    }
    let digits_used = rescaled.mantissa().unsigned_abs().to_string().len() as u32;
    if mantissa != 0 || digits_used > precision {
        return Err(ReadError::Conversion(format!(
            "{} does not fit in DECIMAL({}, {})",
            value, precision, scale
        )));
    }
    Ok(out)
}

/// Decodes a zoned decimal: one EBCDIC digit per byte with the sign in the zone of the last byte.
pub fn decode_zoned(bytes: &[u8], scale: u32) -> Result<Decimal, ReadError> {
    let Some(&last) = bytes.last() else {
        return Err(ReadError::truncated("zoned decimal", 1, 0));
    };
    let mut mantissa: i128 = 0;
    for &b in bytes {
        mantissa = push_digit(mantissa, digit(b & 0x0F)?)?;
    }
    if negative_sign(last >> 4)? {
        mantissa = -mantissa;
    }
    scaled(mantissa, scale)
}
