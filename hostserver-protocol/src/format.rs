//! The super extended data format: the column description returned by the database server.
//!
//! ```text
//! +-----------------+-----------------------------+------------------------------+
//! | header (16)     | field records (48 * count)  | variable LL/CP areas         |
//! +-----------------+-----------------------------+------------------------------+
//! ```
//!
//! Each field record points at its own variable area with an offset relative to the start of
//! the format. The variable areas hold the names of the column.
use rust_decimal::Decimal;

use crate::binary::{ensure, get_i64, get_u16, get_u32, read_i32, read_u16};
use crate::ccsid::{CCSID_BINARY, converter_for};
use crate::codepoint::{CodePoint, CodePointChain, LL_CP_HEADER_LEN};
use crate::error::ReadError;

const HEADER_LEN: usize = 16;
/// Size of every field record, independent of the number of fields.
pub const FIELD_RECORD_LEN: usize = 48;

pub const CP_FIELD_NAME: u16 = 0x3840;
pub const CP_BASE_COLUMN_NAME: u16 = 0x3841;
pub const CP_BASE_TABLE_NAME: u16 = 0x3842;
pub const CP_SCHEMA_NAME: u16 = 0x3843;
pub const CP_COLUMN_LABEL: u16 = 0x3844;

const FLAG_LOB_LOCATOR: u8 = 0x01;
const FLAG_ARRAY: u8 = 0x02;

/// Scans the LL/CP entries at `offset` for `tag`, never looking past `declared_len` bytes.
///
/// Returns the offset of the matching entry's length field, or `None` if the area does not
/// contain the tag. An entry that is shorter than its own header or runs past the declared area
/// is reported as a format error, so the scan always terminates.
pub fn find_code_point(
    buf: &[u8],
    offset: usize,
    declared_len: usize,
    tag: u16,
) -> Result<Option<usize>, ReadError> {
    ensure(buf, offset, declared_len, "variable field area")?;
    for entry in CodePointChain::within(buf, offset, declared_len) {
        let entry = entry?;
        if entry.id == tag {
            return Ok(Some(entry.offset));
        }
    }
    Ok(None)
}

/// SQL types of the result columns, by their even (not nullable) type code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SqlType {
    VarChar,
    Char,
    BigInt,
    Decimal,
    Numeric,
    Integer,
    SmallInt,
    Other(u16),
}

impl SqlType {
    pub fn from_code(code: u16) -> SqlType {
        match code & !1 {
            448 => SqlType::VarChar,
            452 => SqlType::Char,
            492 => SqlType::BigInt,
            484 => SqlType::Decimal,
            488 => SqlType::Numeric,
            496 => SqlType::Integer,
            500 => SqlType::SmallInt,
            other => SqlType::Other(other),
        }
    }
}

/// One decoded column value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Decimal(Decimal),
    Text(String),
    /// Bytes of a type that has no converter here, or of a CCSID 65535 column
    Raw(Vec<u8>),
}

/// Description of one result column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDescriptor {
    pub sql_type_code: u16,
    pub length: u32,
    pub scale: u16,
    pub precision: u16,
    pub ccsid: u16,
    pub parameter_type: u8,
    pub flags: u8,
    pub lob_max_size: u32,
    variable_offset: usize,
    variable_len: usize,
}

impl FieldDescriptor {
    pub fn sql_type(&self) -> SqlType {
        SqlType::from_code(self.sql_type_code)
    }

    pub fn nullable(&self) -> bool {
        self.sql_type_code & 1 == 1
    }

    pub fn is_lob_locator(&self) -> bool {
        self.flags & FLAG_LOB_LOCATOR != 0
    }

    pub fn is_array(&self) -> bool {
        self.flags & FLAG_ARRAY != 0
    }

    /// Decodes this column out of `data`, which holds exactly `self.length` bytes.
    pub fn decode(&self, data: &[u8]) -> Result<FieldValue, ReadError> {
        ensure(data, 0, self.length as usize, "column value")?;
        let data = &data[..self.length as usize];
        let scale = self.scale as u32;
        match self.sql_type() {
            SqlType::SmallInt => Ok(FieldValue::SmallInt(read_u16(data, 0, "SMALLINT")? as i16)),
            SqlType::Integer => Ok(FieldValue::Integer(read_i32(data, 0, "INTEGER")?)),
            SqlType::BigInt => {
                ensure(data, 0, 8, "BIGINT")?;
                Ok(FieldValue::BigInt(get_i64(data, 0)))
            }
            SqlType::Decimal => Ok(FieldValue::Decimal(crate::binary::decode_packed(
                data, scale,
            )?)),
            SqlType::Numeric => Ok(FieldValue::Decimal(crate::binary::decode_zoned(
                data, scale,
            )?)),
            SqlType::Char => self.text(data),
            SqlType::VarChar => {
                let len = read_u16(data, 0, "varchar length")? as usize;
                ensure(data, 2, len, "varchar data")?;
                self.text(&data[2..2 + len])
            }
            SqlType::Other(_) => Ok(FieldValue::Raw(data.to_vec())),
        }
    }

    fn text(&self, data: &[u8]) -> Result<FieldValue, ReadError> {
        if self.ccsid == CCSID_BINARY {
            return Ok(FieldValue::Raw(data.to_vec()));
        }
        Ok(FieldValue::Text(converter_for(self.ccsid)?.to_string(data)?))
    }
}

/// Decoded super extended data format.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuperExtendedDataFormat {
    data: Vec<u8>,
    pub consistency_token: u32,
    pub date_format: u8,
    pub time_format: u8,
    pub date_separator: u8,
    pub time_separator: u8,
    pub record_size: u32,
    fields: Vec<FieldDescriptor>,
}

impl SuperExtendedDataFormat {
    pub fn parse(data: &[u8]) -> Result<SuperExtendedDataFormat, ReadError> {
        ensure(data, 0, HEADER_LEN, "data format header")?;
        let count = get_u32(data, 4) as usize;
        let fields_len = count.checked_mul(FIELD_RECORD_LEN).ok_or(ReadError::InvalidLength {
            what: "field count",
            declared: count,
            offset: 4,
            remaining: data.len(),
        })?;
        ensure(data, HEADER_LEN, fields_len, "field records")?;

        let mut fields = Vec::with_capacity(count);
        for index in 0..count {
            let at = HEADER_LEN + index * FIELD_RECORD_LEN;
            let variable_offset = get_u32(data, at + 32) as usize;
            let variable_len = get_u32(data, at + 36) as usize;
            ensure(data, variable_offset, variable_len, "variable field area")?;
            fields.push(FieldDescriptor {
                sql_type_code: get_u16(data, at + 4),
                length: get_u32(data, at + 6),
                scale: get_u16(data, at + 10),
                precision: get_u16(data, at + 12),
                ccsid: get_u16(data, at + 14),
                parameter_type: data[at + 16],
                flags: data[at + 17],
                lob_max_size: get_u32(data, at + 40),
                variable_offset,
                variable_len,
            });
        }

        Ok(SuperExtendedDataFormat {
            consistency_token: get_u32(data, 0),
            date_format: data[8],
            time_format: data[9],
            date_separator: data[10],
            time_separator: data[11],
            record_size: get_u32(data, 12),
            data: data.to_vec(),
            fields,
        })
    }

    pub fn from_code_point(code_point: &CodePoint) -> Result<SuperExtendedDataFormat, ReadError> {
        SuperExtendedDataFormat::parse(code_point.data())
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn variable(&self, index: usize, tag: u16) -> Result<Option<&[u8]>, ReadError> {
        let Some(field) = self.fields.get(index) else {
            return Ok(None);
        };
        let Some(at) = find_code_point(&self.data, field.variable_offset, field.variable_len, tag)?
        else {
            return Ok(None);
        };
        let len = get_u32(&self.data, at) as usize;
        Ok(Some(&self.data[at + LL_CP_HEADER_LEN..at + len]))
    }

    /// Decodes a name entry: a CCSID followed by the name. A CCSID of 0 or 65535 means the name
    /// uses the column CCSID.
    fn name(&self, index: usize, tag: u16) -> Result<Option<String>, ReadError> {
        let Some(payload) = self.variable(index, tag)? else {
            return Ok(None);
        };
        let ccsid = match read_u16(payload, 0, "name CCSID")? {
            0 | CCSID_BINARY => self.fields[index].ccsid,
            ccsid => ccsid,
        };
        let text = converter_for(ccsid)?.to_string(&payload[2..])?;
        Ok(Some(text))
    }

    pub fn field_name(&self, index: usize) -> Result<Option<String>, ReadError> {
        self.name(index, CP_FIELD_NAME)
    }

    pub fn base_column_name(&self, index: usize) -> Result<Option<String>, ReadError> {
        self.name(index, CP_BASE_COLUMN_NAME)
    }

    pub fn base_table_name(&self, index: usize) -> Result<Option<String>, ReadError> {
        self.name(index, CP_BASE_TABLE_NAME)
    }

    pub fn schema_name(&self, index: usize) -> Result<Option<String>, ReadError> {
        self.name(index, CP_SCHEMA_NAME)
    }

    pub fn column_label(&self, index: usize) -> Result<Option<String>, ReadError> {
        self.name(index, CP_COLUMN_LABEL)
    }

    /// Decodes one row. Columns are laid out back to back in field order.
    pub fn decode_row(&self, row: &[u8]) -> Result<Vec<FieldValue>, ReadError> {
        let mut offset = 0;
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let len = field.length as usize;
            ensure(row, offset, len, "row")?;
            values.push(field.decode(&row[offset..offset + len])?);
            offset += len;
        }
        Ok(values)
    }
}

/// Builder for formats, used by hosts that describe result sets.
#[derive(Default)]
pub struct FormatBuilder {
    consistency_token: u32,
    record_size: u32,
    fields: Vec<(FieldDescriptor, Vec<CodePoint>)>,
}

impl FormatBuilder {
    pub fn new(consistency_token: u32) -> FormatBuilder {
        FormatBuilder {
            consistency_token,
            ..FormatBuilder::default()
        }
    }

    /// Adds a column; `names` are the variable entries such as the field name.
    pub fn field(
        mut self,
        sql_type_code: u16,
        length: u32,
        precision: u16,
        scale: u16,
        ccsid: u16,
        names: Vec<CodePoint>,
    ) -> FormatBuilder {
        self.record_size += length;
        self.fields.push((
            FieldDescriptor {
                sql_type_code,
                length,
                scale,
                precision,
                ccsid,
                parameter_type: 0,
                flags: 0,
                lob_max_size: 0,
                variable_offset: 0,
                variable_len: 0,
            },
            names,
        ));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let fixed = HEADER_LEN + self.fields.len() * FIELD_RECORD_LEN;
        let areas: Vec<Vec<u8>> = self
            .fields
            .iter()
            .map(|(_, names)| crate::codepoint::encode_chain(names))
            .collect();
        let mut buf = vec![0u8; fixed + areas.iter().map(Vec::len).sum::<usize>()];
        crate::binary::put_u32(&mut buf, 0, self.consistency_token);
        crate::binary::put_u32(&mut buf, 4, self.fields.len() as u32);
        crate::binary::put_u32(&mut buf, 12, self.record_size);

        let mut area_offset = fixed;
        for (index, ((field, _), area)) in self.fields.iter().zip(&areas).enumerate() {
            let at = HEADER_LEN + index * FIELD_RECORD_LEN;
            crate::binary::put_u32(&mut buf, at, FIELD_RECORD_LEN as u32);
            crate::binary::put_u16(&mut buf, at + 4, field.sql_type_code);
            crate::binary::put_u32(&mut buf, at + 6, field.length);
            crate::binary::put_u16(&mut buf, at + 10, field.scale);
            crate::binary::put_u16(&mut buf, at + 12, field.precision);
            crate::binary::put_u16(&mut buf, at + 14, field.ccsid);
            crate::binary::put_u32(&mut buf, at + 32, area_offset as u32);
            crate::binary::put_u32(&mut buf, at + 36, area.len() as u32);
            buf[area_offset..area_offset + area.len()].copy_from_slice(area);
            area_offset += area.len();
        }
        buf
    }
}

/// A field name entry for [`FormatBuilder::field`].
pub fn name_entry(tag: u16, ccsid: u16, name_bytes: &[u8]) -> CodePoint {
    let mut payload = ccsid.to_be_bytes().to_vec();
    payload.extend_from_slice(name_bytes);
    CodePoint::new(tag, payload)
}
