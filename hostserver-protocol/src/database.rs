//! Database server requests and replies.
//!
//! Character parameters carry their own CCSID and length in front of the text so the host can
//! convert them: `CCSID (u16) | length (u16) | bytes`.
use crate::binary::{ensure, read_u16};
use crate::ccsid::{CharConverter, converter_for};
use crate::codepoint::CodePoint;
use crate::datastream::{Datastream, server};
use crate::error::ReadError;
use crate::format::SuperExtendedDataFormat;
use crate::template::{
    CP_DB_CURSOR_NAME, CP_DB_PREPARE_OPTION, CP_DB_STATEMENT_NAME, CP_DB_STATEMENT_TEXT,
    CP_DB_SUPER_EXTENDED_FORMAT, DB_PREPARE_DESCRIBE, DbReplyTemplate, DbRequestTemplate,
};

pub fn string_parameter(
    id: u16,
    text: &str,
    converter: &dyn CharConverter,
) -> Result<CodePoint, ReadError> {
    let bytes = converter.to_bytes(text)?;
    let len = u16::try_from(bytes.len()).map_err(|_| ReadError::TooLarge {
        max: u16::MAX as usize,
        got: bytes.len(),
    })?;
    let mut payload = Vec::with_capacity(4 + bytes.len());
    payload.extend_from_slice(&converter.ccsid().to_be_bytes());
    payload.extend_from_slice(&len.to_be_bytes());
    payload.extend_from_slice(&bytes);
    Ok(CodePoint::new(id, payload))
}

/// Decodes a character parameter with the converter for its own CCSID.
pub fn decode_string_parameter(code_point: &CodePoint) -> Result<String, ReadError> {
    let data = code_point.data();
    let ccsid = read_u16(data, 0, "parameter CCSID")?;
    let len = read_u16(data, 2, "parameter length")? as usize;
    ensure(data, 4, len, "parameter text")?;
    converter_for(ccsid)?.to_string(&data[4..4 + len])
}

pub fn short_parameter(id: u16, value: u16) -> CodePoint {
    CodePoint::new(id, value.to_be_bytes().to_vec())
}

pub fn int_parameter(id: u16, value: u32) -> CodePoint {
    CodePoint::new(id, value.to_be_bytes().to_vec())
}

/// Prepare option: a regular statement.
pub const PREPARE_NORMAL: u8 = 0;
/// Prepare option: enhanced prepare, which returns the extended column information.
pub const PREPARE_ENHANCED: u8 = 1;

/// Prepare a statement and describe its result columns.
#[derive(Clone, Debug, Default)]
pub struct PrepareDescribe {
    pub statement_name: String,
    pub statement_text: String,
    pub cursor_name: Option<String>,
    pub prepare_option: u8,
    pub rpb_handle: u16,
}

impl PrepareDescribe {
    pub fn to_request(&self, converter: &dyn CharConverter) -> Result<Datastream, ReadError> {
        let template = DbRequestTemplate {
            ors_bitmap: DbRequestTemplate::ORS_SEND_REPLY_IMMEDIATELY
                | DbRequestTemplate::ORS_MESSAGE_ID
                | DbRequestTemplate::ORS_SQLCA
                | DbRequestTemplate::ORS_EXTENDED_FORMAT,
            return_ors_handle: self.rpb_handle,
            fill_ors_handle: self.rpb_handle,
            rpb_handle: self.rpb_handle,
            ..DbRequestTemplate::default()
        };
        let mut ds = Datastream::new(server::DATABASE, DB_PREPARE_DESCRIBE, template.to_bytes());
        ds.set_code_point(string_parameter(
            CP_DB_STATEMENT_NAME,
            &self.statement_name,
            converter,
        )?);
        ds.set_code_point(string_parameter(
            CP_DB_STATEMENT_TEXT,
            &self.statement_text,
            converter,
        )?);
        ds.add(CP_DB_PREPARE_OPTION, vec![self.prepare_option]);
        if let Some(cursor) = &self.cursor_name {
            ds.set_code_point(string_parameter(CP_DB_CURSOR_NAME, cursor, converter)?);
        }
        Ok(ds)
    }
}

/// A decoded database reply.
#[derive(Clone, Debug)]
pub struct DatabaseReply {
    pub template: DbReplyTemplate,
    pub format: Option<SuperExtendedDataFormat>,
}

impl DatabaseReply {
    pub fn from_datastream(ds: &Datastream) -> Result<DatabaseReply, ReadError> {
        let template = DbReplyTemplate::parse(ds.template())?;
        let format = ds
            .code_point(CP_DB_SUPER_EXTENDED_FORMAT)
            .map(SuperExtendedDataFormat::from_code_point)
            .transpose()?;
        Ok(DatabaseReply { template, format })
    }
}

/// Prepare option sent with a request, if the request carried one.
pub fn prepare_option(request: &Datastream) -> Option<u8> {
    request
        .code_point(CP_DB_PREPARE_OPTION)
        .and_then(|cp| cp.data().first().copied())
}

/// Returns the request's RPB handle.
pub fn rpb_handle(request: &Datastream) -> Result<u16, ReadError> {
    Ok(DbRequestTemplate::parse(request.template())?.rpb_handle)
}
