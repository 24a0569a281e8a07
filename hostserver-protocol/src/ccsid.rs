//! CCSID-aware conversion between host bytes and Rust strings.
use crate::error::ReadError;

/// Converts text between a host coded character set and Unicode.
pub trait CharConverter: Send + Sync {
    /// The coded character set identifier handled by this converter.
    fn ccsid(&self) -> u16;

    fn to_string(&self, bytes: &[u8]) -> Result<String, ReadError>;

    fn to_bytes(&self, text: &str) -> Result<Vec<u8>, ReadError>;

    /// Encodes `text` into exactly `len` bytes, padding with the blank of this character set.
    fn to_padded_bytes(&self, text: &str, len: usize) -> Result<Vec<u8>, ReadError> {
        let mut bytes = self.to_bytes(text)?;
        if bytes.len() > len {
            return Err(ReadError::Conversion(format!(
                "'{}' does not fit in {} bytes",
                text, len
            )));
        }
        let blank = self.to_bytes(" ")?;
        while bytes.len() + blank.len() <= len {
            bytes.extend_from_slice(&blank);
        }
        bytes.resize(len, 0);
        Ok(bytes)
    }
}

/// Decodes the `len` bytes at `offset` and strips trailing blanks.
pub fn decode_span(
    converter: &dyn CharConverter,
    buf: &[u8],
    offset: usize,
    len: usize,
) -> Result<String, ReadError> {
    crate::binary::ensure(buf, offset, len, "character field")?;
    let text = converter.to_string(&buf[offset..offset + len])?;
    Ok(text.trim_end_matches([' ', '\0']).to_string())
}

/// CCSID 37, EBCDIC US/Canada.
pub const CCSID_EBCDIC_37: u16 = 37;
/// CCSID 1200, UTF-16 big endian.
pub const CCSID_UTF16: u16 = 1200;
/// CCSID 13488, UCS-2 big endian. Treated like 1200.
pub const CCSID_UCS2: u16 = 13488;
/// CCSID 1208, UTF-8.
pub const CCSID_UTF8: u16 = 1208;
/// CCSID 65535 marks binary data that must not be converted.
pub const CCSID_BINARY: u16 = 65535;

#[rustfmt::skip]
const CP037_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0xAC,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0xDD, 0xDE, 0xAE,
    0x5E, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0x5B, 0x5D, 0xAF, 0xA8, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

const fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut inverse = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inverse[table[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

// CP037 is a permutation of all 256 byte values, so the inverse is total.
const LATIN1_TO_CP037: [u8; 256] = invert(&CP037_TO_LATIN1);

/// Single byte EBCDIC code page 37.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ebcdic37;

impl Ebcdic37 {
    /// Translates a single EBCDIC byte into its character.
    pub fn decode_char(byte: u8) -> char {
        char::from(CP037_TO_LATIN1[byte as usize])
    }

    /// Translates a Latin-1 character into its EBCDIC byte, if representable.
    pub fn encode_char(ch: char) -> Option<u8> {
        u8::try_from(ch as u32)
            .ok()
            .map(|latin1| LATIN1_TO_CP037[latin1 as usize])
    }
}

impl CharConverter for Ebcdic37 {
    fn ccsid(&self) -> u16 {
        CCSID_EBCDIC_37
    }

    fn to_string(&self, bytes: &[u8]) -> Result<String, ReadError> {
        Ok(bytes.iter().map(|&b| Ebcdic37::decode_char(b)).collect())
    }

    fn to_bytes(&self, text: &str) -> Result<Vec<u8>, ReadError> {
        text.chars()
            .map(|ch| {
                Ebcdic37::encode_char(ch).ok_or_else(|| {
                    ReadError::Conversion(format!(
                        "Character '{}' (U+{:04X}) cannot be encoded in CCSID 37",
                        ch, ch as u32
                    ))
                })
            })
            .collect()
    }
}

/// UTF-16 big endian, used for CCSID 1200 and 13488.
#[derive(Debug, Clone, Copy)]
pub struct Utf16Be {
    ccsid: u16,
}

impl CharConverter for Utf16Be {
    fn ccsid(&self) -> u16 {
        self.ccsid
    }

    fn to_string(&self, bytes: &[u8]) -> Result<String, ReadError> {
        if bytes.len() % 2 != 0 {
            return Err(ReadError::Conversion(format!(
                "Odd number of bytes ({}) for CCSID {}",
                bytes.len(),
                self.ccsid
            )));
        }
        let units = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        char::decode_utf16(units)
            .collect::<Result<String, _>>()
            .map_err(|e| ReadError::Conversion(e.to_string()))
    }

    fn to_bytes(&self, text: &str) -> Result<Vec<u8>, ReadError> {
        Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8;

impl CharConverter for Utf8 {
    fn ccsid(&self) -> u16 {
        CCSID_UTF8
    }

    fn to_string(&self, bytes: &[u8]) -> Result<String, ReadError> {
        str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| ReadError::Conversion(format!("Invalid UTF8: {}", e)))
    }

    fn to_bytes(&self, text: &str) -> Result<Vec<u8>, ReadError> {
        Ok(text.as_bytes().to_vec())
    }
}

static EBCDIC_37: Ebcdic37 = Ebcdic37;
static UTF16: Utf16Be = Utf16Be { ccsid: CCSID_UTF16 };
static UCS2: Utf16Be = Utf16Be { ccsid: CCSID_UCS2 };
static UTF8: Utf8 = Utf8;

/// Looks up the converter for a CCSID.
pub fn converter_for(ccsid: u16) -> Result<&'static dyn CharConverter, ReadError> {
    match ccsid {
        CCSID_EBCDIC_37 => Ok(&EBCDIC_37),
        CCSID_UTF16 => Ok(&UTF16),
        CCSID_UCS2 => Ok(&UCS2),
        CCSID_UTF8 => Ok(&UTF8),
        other => Err(ReadError::UnsupportedCcsid(other)),
    }
}
