//! LL/CP code points: a 4-byte length that includes the header, a 2-byte id and a payload.
use std::collections::BTreeMap;

use crate::binary::{get_i32, get_u16, get_u32, put_i32, put_u16, put_u32};
use crate::ccsid::CharConverter;
use crate::error::ReadError;

/// Length of the LL/CP header in front of every payload.
pub const LL_CP_HEADER_LEN: usize = 6;

/// A tagged variable-length field of a datastream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CodePoint {
    id: u16,
    data: Vec<u8>,
}

impl CodePoint {
    pub fn new(id: u16, data: impl Into<Vec<u8>>) -> CodePoint {
        CodePoint {
            id,
            data: data.into(),
        }
    }

    /// The tag of this code point
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Total length on the wire, header included.
    pub fn length(&self) -> usize {
        LL_CP_HEADER_LEN + self.data.len()
    }

    /// Code points without payload are never serialized.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes length, id and payload into `buf` at `offset` and returns the offset past it.
    ///
    /// # Panics
    ///
    /// If `buf` is shorter than `offset + self.length()`.
    pub fn write_into(&self, buf: &mut [u8], offset: usize) -> usize {
        put_u32(buf, offset, self.length() as u32);
        put_u16(buf, offset + 4, self.id);
        buf[offset + LL_CP_HEADER_LEN..offset + self.length()].copy_from_slice(&self.data);
        offset + self.length()
    }

    /// Interprets the payload as a nested chain of code points.
    pub fn chain(&self) -> CodePointChain<'_> {
        CodePointChain::new(&self.data)
    }
}

/// A code point borrowed out of a larger buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawCodePoint<'a> {
    /// Offset of the LL field within the scanned buffer
    pub offset: usize,
    pub id: u16,
    pub data: &'a [u8],
}

impl RawCodePoint<'_> {
    pub fn to_code_point(&self) -> CodePoint {
        CodePoint::new(self.id, self.data)
    }
}

/// Iterates over consecutive LL/CP entries of a buffer.
///
/// Each accepted entry consumes at least [`LL_CP_HEADER_LEN`] bytes. An entry whose declared
/// length is shorter than its own header or runs past the end of the buffer yields an error and
/// ends the iteration.
pub struct CodePointChain<'a> {
    buf: &'a [u8],
    offset: usize,
    end: usize,
    failed: bool,
}

impl<'a> CodePointChain<'a> {
    pub fn new(buf: &'a [u8]) -> CodePointChain<'a> {
        CodePointChain::within(buf, 0, buf.len())
    }

    /// Restricts the scan to `len` bytes starting at `offset`. The range is clamped to `buf`.
    pub fn within(buf: &'a [u8], offset: usize, len: usize) -> CodePointChain<'a> {
        let end = offset.saturating_add(len).min(buf.len());
        CodePointChain {
            buf,
            offset: offset.min(end),
            end,
            failed: false,
        }
    }
}

impl<'a> Iterator for CodePointChain<'a> {
    type Item = Result<RawCodePoint<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.end {
            return None;
        }
        let remaining = self.end - self.offset;
        if remaining < LL_CP_HEADER_LEN {
            self.failed = true;
            return Some(Err(ReadError::truncated(
                "code point header",
                LL_CP_HEADER_LEN,
                remaining,
            )));
        }
        let declared = get_u32(self.buf, self.offset) as usize;
        if declared < LL_CP_HEADER_LEN || declared > remaining {
            self.failed = true;
            return Some(Err(ReadError::InvalidLength {
                what: "code point",
                declared,
                offset: self.offset,
                remaining,
            }));
        }
        let entry = RawCodePoint {
            offset: self.offset,
            id: get_u16(self.buf, self.offset + 4),
            data: &self.buf[self.offset + LL_CP_HEADER_LEN..self.offset + declared],
        };
        self.offset += declared;
        Some(Ok(entry))
    }
}

/// Serializes code points back to back, skipping the ones without payload.
pub fn encode_chain<'a>(code_points: impl IntoIterator<Item = &'a CodePoint>) -> Vec<u8> {
    let code_points: Vec<&CodePoint> = code_points.into_iter().filter(|cp| !cp.is_empty()).collect();
    let mut buf = vec![0u8; code_points.iter().map(|cp| cp.length()).sum()];
    let mut offset = 0;
    for cp in code_points {
        offset = cp.write_into(&mut buf, offset);
    }
    buf
}

const ATTRIBUTE_ENTRY_LEN: usize = 12;
const ATTRIBUTE_TYPE_INT: u16 = 1;
const ATTRIBUTE_TYPE_TEXT: u16 = 2;
const ATTRIBUTE_TYPE_BYTES: u16 = 3;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttributeValue {
    Int(i32),
    /// Text, kept in the host encoding until a converter is applied.
    Text(Vec<u8>),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    fn type_code(&self) -> u16 {
        match self {
            AttributeValue::Int(_) => ATTRIBUTE_TYPE_INT,
            AttributeValue::Text(_) => ATTRIBUTE_TYPE_TEXT,
            AttributeValue::Bytes(_) => ATTRIBUTE_TYPE_BYTES,
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            AttributeValue::Int(_) => 4,
            AttributeValue::Text(b) | AttributeValue::Bytes(b) => b.len(),
        }
    }
}

/// Attribute id to value mapping carried by an attribute-list code point.
///
/// Payload: entry count (u16), entry header length (u16, 12), then one
/// `{ id u16, type u16, length u32, offset u32 }` entry per attribute and finally the values.
/// Offsets are relative to the start of the payload.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeList {
    values: BTreeMap<u16, AttributeValue>,
}

impl AttributeList {
    pub fn new() -> AttributeList {
        AttributeList::default()
    }

    pub fn set(&mut self, id: u16, value: AttributeValue) {
        self.values.insert(id, value);
    }

    pub fn set_int(&mut self, id: u16, value: i32) {
        self.set(id, AttributeValue::Int(value));
    }

    pub fn set_text(
        &mut self,
        id: u16,
        text: &str,
        converter: &dyn CharConverter,
    ) -> Result<(), ReadError> {
        self.set(id, AttributeValue::Text(converter.to_bytes(text)?));
        Ok(())
    }

    pub fn get(&self, id: u16) -> Option<&AttributeValue> {
        self.values.get(&id)
    }

    pub fn get_int(&self, id: u16) -> Option<i32> {
        match self.values.get(&id) {
            Some(AttributeValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_text(
        &self,
        id: u16,
        converter: &dyn CharConverter,
    ) -> Result<Option<String>, ReadError> {
        match self.values.get(&id) {
            Some(AttributeValue::Text(bytes)) => converter.to_string(bytes).map(Some),
            _ => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &AttributeValue)> {
        self.values.iter().map(|(id, value)| (*id, value))
    }

    pub fn to_code_point(&self, id: u16) -> CodePoint {
        if self.values.is_empty() {
            return CodePoint::new(id, Vec::new());
        }
        let header_len = 4 + self.values.len() * ATTRIBUTE_ENTRY_LEN;
        let values_len: usize = self.values.values().map(AttributeValue::encoded_len).sum();
        let mut buf = vec![0u8; header_len + values_len];
        put_u16(&mut buf, 0, self.values.len() as u16);
        put_u16(&mut buf, 2, ATTRIBUTE_ENTRY_LEN as u16);

        let mut entry = 4;
        let mut value_offset = header_len;
        for (id, value) in &self.values {
            let len = value.encoded_len();
            put_u16(&mut buf, entry, *id);
            put_u16(&mut buf, entry + 2, value.type_code());
            put_u32(&mut buf, entry + 4, len as u32);
            put_u32(&mut buf, entry + 8, value_offset as u32);
            match value {
                AttributeValue::Int(v) => put_i32(&mut buf, value_offset, *v),
                AttributeValue::Text(b) | AttributeValue::Bytes(b) => {
                    buf[value_offset..value_offset + len].copy_from_slice(b)
                }
            }
            entry += ATTRIBUTE_ENTRY_LEN;
            value_offset += len;
        }
        CodePoint::new(id, buf)
    }

    pub fn from_payload(payload: &[u8]) -> Result<AttributeList, ReadError> {
        let mut list = AttributeList::new();
        if payload.is_empty() {
            return Ok(list);
        }
        let count = crate::binary::read_u16(payload, 0, "attribute count")? as usize;
        let entry_len = crate::binary::read_u16(payload, 2, "attribute entry length")? as usize;
        if entry_len < ATTRIBUTE_ENTRY_LEN {
            return Err(ReadError::InvalidLength {
                what: "attribute entry",
                declared: entry_len,
                offset: 2,
                remaining: payload.len(),
            });
        }
        for index in 0..count {
            let entry = 4 + index * entry_len;
            crate::binary::ensure(payload, entry, ATTRIBUTE_ENTRY_LEN, "attribute entry")?;
            let id = get_u16(payload, entry);
            let kind = get_u16(payload, entry + 2);
            let len = get_u32(payload, entry + 4) as usize;
            let offset = get_u32(payload, entry + 8) as usize;
            crate::binary::ensure(payload, offset, len, "attribute value")?;
            let raw = &payload[offset..offset + len];
            let value = match kind {
                ATTRIBUTE_TYPE_INT if len == 4 => AttributeValue::Int(get_i32(raw, 0)),
                ATTRIBUTE_TYPE_TEXT => AttributeValue::Text(raw.to_vec()),
                ATTRIBUTE_TYPE_BYTES => AttributeValue::Bytes(raw.to_vec()),
                _ => {
                    return Err(ReadError::InvalidFormat(format!(
                        "Attribute 0x{:04X} has unsupported type {} (length {})",
                        id, kind, len
                    )));
                }
            };
            list.values.insert(id, value);
        }
        Ok(list)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ccsid::Ebcdic37;

    #[test]
    fn length_includes_header() {
        let cp = CodePoint::new(0x1103, vec![1, 2, 3, 4]);
        assert_eq!(cp.length(), 10);
        let mut buf = vec![0u8; 10];
        assert_eq!(cp.write_into(&mut buf, 0), 10);
        assert_eq!(buf, vec![0, 0, 0, 10, 0x11, 0x03, 1, 2, 3, 4]);
    }

    #[test]
    fn chain_skips_empty_payloads() {
        let chain = encode_chain(&[
            CodePoint::new(1, vec![0xAA]),
            CodePoint::new(2, Vec::new()),
            CodePoint::new(3, vec![0xBB, 0xCC]),
        ]);
        let decoded: Vec<CodePoint> = CodePointChain::new(&chain)
            .map(|cp| cp.unwrap().to_code_point())
            .collect();
        assert_eq!(
            decoded,
            vec![
                CodePoint::new(1, vec![0xAA]),
                CodePoint::new(3, vec![0xBB, 0xCC])
            ]
        );
    }

    #[test]
    fn chain_rejects_undersized_entry() {
        // A zero length entry would never advance the scan
        let buf = [0, 0, 0, 0, 0x38, 0x40, 0, 0];
        let results: Vec<_> = CodePointChain::new(&buf).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ReadError::InvalidLength { declared: 0, .. })
        ));
    }

    #[test]
    fn chain_rejects_overrun() {
        let buf = [0, 0, 0, 9, 0x38, 0x40, 0, 0];
        assert!(matches!(
            CodePointChain::new(&buf).next(),
            Some(Err(ReadError::InvalidLength { declared: 9, .. }))
        ));
    }

    #[test]
    fn chain_rejects_trailing_garbage() {
        let buf = [0, 0, 0, 6, 0x00, 0x01, 0xFF];
        let mut chain = CodePointChain::new(&buf);
        assert!(chain.next().unwrap().is_ok());
        assert!(matches!(
            chain.next(),
            Some(Err(ReadError::Truncated { .. }))
        ));
        assert!(chain.next().is_none());
    }

    #[test]
    fn attribute_list_values() {
        let mut attributes = AttributeList::new();
        attributes.set_int(0x0024, 3);
        attributes
            .set_text(0x0010, "PRT01", &Ebcdic37)
            .unwrap();
        attributes.set(0x0099, AttributeValue::Bytes(vec![0xDE, 0xAD]));

        let cp = attributes.to_code_point(0x0004);
        assert_eq!(cp.id(), 0x0004);
        // count + entry length + 3 entries + 4 + 5 + 2 value bytes
        assert_eq!(cp.data().len(), 4 + 36 + 11);

        let decoded = AttributeList::from_payload(cp.data()).unwrap();
        assert_eq!(decoded, attributes);
        assert_eq!(decoded.get_int(0x0024), Some(3));
        assert_eq!(
            decoded.get_text(0x0010, &Ebcdic37).unwrap().as_deref(),
            Some("PRT01")
        );
        assert_eq!(decoded.get_int(0x0010), None);
    }

    #[test]
    fn empty_attribute_list_is_an_empty_code_point() {
        assert!(AttributeList::new().to_code_point(0x0004).is_empty());
        assert!(AttributeList::from_payload(&[]).unwrap().is_empty());
    }

    #[test]
    fn attribute_value_outside_payload() {
        let mut payload = vec![0u8; 16];
        put_u16(&mut payload, 0, 1);
        put_u16(&mut payload, 2, 12);
        put_u16(&mut payload, 4, 0x0010);
        put_u16(&mut payload, 6, ATTRIBUTE_TYPE_BYTES);
        put_u32(&mut payload, 8, 8);
        put_u32(&mut payload, 12, 12);
        assert!(matches!(
            AttributeList::from_payload(&payload),
            Err(ReadError::Truncated { .. })
        ));
    }
}
