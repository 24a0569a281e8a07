//! Fixed templates of the datastreams used by this crate, with their request ids and code points.
use crate::binary::{ensure, get_i32, get_u16, get_u32, put_i32, put_u16, put_u32};
use crate::ccsid::{CharConverter, decode_span};
use crate::codepoint::AttributeList;
use crate::datastream::{Datastream, server};
use crate::error::ReadError;

pub const CALL_PROGRAM_REQUEST: u16 = 0x1003;
pub const CALL_PROGRAM_REPLY: u16 = 0x8003;
pub const CP_PARAMETER_LIST: u16 = 0x1100;
pub const CP_MESSAGE_LIST: u16 = 0x1102;
pub const CP_PARAMETER: u16 = 0x1103;
pub const CP_MESSAGE: u16 = 0x1106;

pub const NP_REQUEST: u16 = 0x0001;
pub const NP_REPLY: u16 = 0x8001;
pub const CP_NP_ATTRIBUTES: u16 = 0x0004;
pub const CP_NP_SELECTION: u16 = 0x0005;

pub const DB_PREPARE_DESCRIBE: u16 = 0x1803;
pub const DB_REPLY: u16 = 0x2800;
pub const CP_DB_STATEMENT_NAME: u16 = 0x3806;
pub const CP_DB_STATEMENT_TEXT: u16 = 0x3807;
pub const CP_DB_PREPARE_OPTION: u16 = 0x3808;
pub const CP_DB_CURSOR_NAME: u16 = 0x380B;
pub const CP_DB_SUPER_EXTENDED_FORMAT: u16 = 0x3812;

fn check_len(buf: &[u8], len: usize, what: &'static str) -> Result<(), ReadError> {
    ensure(buf, 0, len, what)
}

/// Template of a remote command server program call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgramCallTemplate {
    pub program: String,
    pub library: String,
    pub message_option: u8,
    pub parameter_count: u16,
}

impl ProgramCallTemplate {
    pub const LEN: usize = 23;
    const NAME_LEN: usize = 10;

    pub fn to_bytes(&self, converter: &dyn CharConverter) -> Result<Vec<u8>, ReadError> {
        let mut buf = Vec::with_capacity(Self::LEN);
        buf.extend(converter.to_padded_bytes(&self.program, Self::NAME_LEN)?);
        buf.extend(converter.to_padded_bytes(&self.library, Self::NAME_LEN)?);
        buf.push(self.message_option);
        buf.extend_from_slice(&self.parameter_count.to_be_bytes());
        Ok(buf)
    }

    pub fn parse(buf: &[u8], converter: &dyn CharConverter) -> Result<Self, ReadError> {
        check_len(buf, Self::LEN, "program call template")?;
        Ok(ProgramCallTemplate {
            program: decode_span(converter, buf, 0, Self::NAME_LEN)?,
            library: decode_span(converter, buf, Self::NAME_LEN, Self::NAME_LEN)?,
            message_option: buf[20],
            parameter_count: get_u16(buf, 21),
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgramCallReplyTemplate {
    pub return_code: u16,
}

impl ProgramCallReplyTemplate {
    pub const LEN: usize = 2;

    pub fn to_bytes(&self) -> Vec<u8> {
        self.return_code.to_be_bytes().to_vec()
    }
}

/// Network print template. Requests fill action and flags, replies the return code.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NpTemplate {
    pub action: u16,
    pub flags: u16,
    pub return_code: u16,
    pub error_code_point: u16,
    pub correlation: u32,
}

impl NpTemplate {
    pub const LEN: usize = 12;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        put_u16(&mut buf, 0, self.action);
        put_u16(&mut buf, 2, self.flags);
        put_u16(&mut buf, 4, self.return_code);
        put_u16(&mut buf, 6, self.error_code_point);
        put_u32(&mut buf, 8, self.correlation);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ReadError> {
        check_len(buf, Self::LEN, "network print template")?;
        Ok(NpTemplate {
            action: get_u16(buf, 0),
            flags: get_u16(buf, 2),
            return_code: get_u16(buf, 4),
            error_code_point: get_u16(buf, 6),
            correlation: get_u32(buf, 8),
        })
    }

    /// Builds a network print request carrying an attribute list.
    pub fn request(&self, attributes: &AttributeList) -> Datastream {
        let mut ds = Datastream::new(server::NETWORK_PRINT, NP_REQUEST, self.to_bytes());
        ds.set_code_point(attributes.to_code_point(CP_NP_ATTRIBUTES));
        ds
    }
}

/// Template of database server requests.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DbRequestTemplate {
    /// Operation result set bitmap: which reply parts the host should send back.
    pub ors_bitmap: u32,
    pub return_ors_handle: u16,
    pub fill_ors_handle: u16,
    pub based_on_ors_handle: u16,
    pub rpb_handle: u16,
    pub parameter_marker_handle: u16,
    pub parameter_count: u16,
}

impl DbRequestTemplate {
    pub const LEN: usize = 20;

    pub const ORS_SEND_REPLY_IMMEDIATELY: u32 = 0x8000_0000;
    pub const ORS_MESSAGE_ID: u32 = 0x4000_0000;
    pub const ORS_DATA_FORMAT: u32 = 0x0800_0000;
    pub const ORS_SQLCA: u32 = 0x0200_0000;
    pub const ORS_EXTENDED_FORMAT: u32 = 0x0002_0000;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        put_u32(&mut buf, 0, self.ors_bitmap);
        put_u16(&mut buf, 8, self.return_ors_handle);
        put_u16(&mut buf, 10, self.fill_ors_handle);
        put_u16(&mut buf, 12, self.based_on_ors_handle);
        put_u16(&mut buf, 14, self.rpb_handle);
        put_u16(&mut buf, 16, self.parameter_marker_handle);
        put_u16(&mut buf, 18, self.parameter_count);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ReadError> {
        check_len(buf, Self::LEN, "database request template")?;
        Ok(DbRequestTemplate {
            ors_bitmap: get_u32(buf, 0),
            return_ors_handle: get_u16(buf, 8),
            fill_ors_handle: get_u16(buf, 10),
            based_on_ors_handle: get_u16(buf, 12),
            rpb_handle: get_u16(buf, 14),
            parameter_marker_handle: get_u16(buf, 16),
            parameter_count: get_u16(buf, 18),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DbReplyTemplate {
    pub ors_bitmap: u32,
    pub error_class: u16,
    pub return_code: i32,
}

impl DbReplyTemplate {
    pub const LEN: usize = 20;

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        put_u32(&mut buf, 0, self.ors_bitmap);
        put_u16(&mut buf, 14, self.error_class);
        put_i32(&mut buf, 16, self.return_code);
        buf
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ReadError> {
        check_len(buf, Self::LEN, "database reply template")?;
        Ok(DbReplyTemplate {
            ors_bitmap: get_u32(buf, 0),
            error_class: get_u16(buf, 14),
            return_code: get_i32(buf, 16),
        })
    }
}
