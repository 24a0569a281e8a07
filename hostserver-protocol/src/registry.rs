//! Explicit registry of the datastream kinds a channel understands.
//!
//! A kind is identified by its server id and request/reply id. The registry tells the reader
//! which code points are expected, and tells the client where the return code lives and which
//! non-zero codes are ordinary outcomes rather than failures.
use std::collections::HashMap;

use crate::binary::{read_i32, read_u16};
use crate::datastream::{Datastream, server};
use crate::error::ReadError;
use crate::template;

/// Return codes shared by the host servers.
pub mod return_code {
    pub const OK: i32 = 0x0000;
    pub const INVALID_REQUEST_ACTION: i32 = 0x0001;
    pub const INVALID_REQUEST_ID: i32 = 0x0002;
    pub const INVALID_CODE_POINT: i32 = 0x0003;
    pub const INVALID_ATTRIBUTE: i32 = 0x0004;
    pub const NOT_AUTHORIZED: i32 = 0x0005;
    pub const END_OF_FILE: i32 = 0x0006;
    pub const EMPTY_LIST: i32 = 0x0007;
    pub const FUNCTION_NOT_SUPPORTED: i32 = 0x0008;
    pub const NO_MESSAGE: i32 = 0x0009;
    pub const PROGRAM_ERROR: i32 = 0x0500;

    /// Codes that are reported to the caller instead of being raised.
    pub const BENIGN: &[i32] = &[END_OF_FILE, EMPTY_LIST, FUNCTION_NOT_SUPPORTED, NO_MESSAGE];

    /// SQL "no data" outcome of the database server.
    pub const SQL_END_OF_DATA: i32 = 100;
}

/// Location of the return code inside the template of a reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReturnCodeField {
    /// Requests carry no return code.
    None,
    U16At(usize),
    I32At(usize),
}

/// How a reply's return code is to be treated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReturnCodeClass {
    Ok,
    Benign(i32),
    Fatal(i32),
}

/// Description of one request or reply datastream.
#[derive(Clone, Debug)]
pub struct DatastreamKind {
    pub name: &'static str,
    /// Minimum template length. Longer templates from newer hosts are accepted.
    pub template_len: usize,
    /// Code points that are decoded into the datastream; anything else lands in the unknown bucket.
    pub code_points: Vec<u16>,
    pub return_code: ReturnCodeField,
    pub benign_codes: Vec<i32>,
    /// Code point carrying the host messages that explain a failure.
    pub message_code_point: Option<u16>,
}

impl DatastreamKind {
    pub fn request(name: &'static str, template_len: usize, code_points: &[u16]) -> DatastreamKind {
        DatastreamKind {
            name,
            template_len,
            code_points: code_points.to_vec(),
            return_code: ReturnCodeField::None,
            benign_codes: Vec::new(),
            message_code_point: None,
        }
    }

    pub fn reply(
        name: &'static str,
        template_len: usize,
        code_points: &[u16],
        return_code: ReturnCodeField,
    ) -> DatastreamKind {
        DatastreamKind {
            name,
            template_len,
            code_points: code_points.to_vec(),
            return_code,
            benign_codes: return_code::BENIGN.to_vec(),
            message_code_point: None,
        }
    }

    /// Replaces the benign codes of this kind.
    pub fn with_benign_codes(mut self, codes: &[i32]) -> DatastreamKind {
        self.benign_codes = codes.to_vec();
        self
    }

    /// Adds benign codes on top of the ones already declared.
    pub fn with_additional_benign_codes(mut self, codes: &[i32]) -> DatastreamKind {
        for &code in codes {
            if !self.benign_codes.contains(&code) {
                self.benign_codes.push(code);
            }
        }
        self
    }

    pub fn with_message_code_point(mut self, id: u16) -> DatastreamKind {
        self.message_code_point = Some(id);
        if !self.code_points.contains(&id) {
            self.code_points.push(id);
        }
        self
    }

    pub fn knows(&self, code_point: u16) -> bool {
        self.code_points.contains(&code_point)
    }

    /// Extracts the return code from a decoded datastream of this kind.
    pub fn return_code(&self, ds: &Datastream) -> Result<Option<i32>, ReadError> {
        match self.return_code {
            ReturnCodeField::None => Ok(None),
            ReturnCodeField::U16At(offset) => {
                Ok(Some(read_u16(ds.template(), offset, "return code")? as i32))
            }
            ReturnCodeField::I32At(offset) => {
                Ok(Some(read_i32(ds.template(), offset, "return code")?))
            }
        }
    }

    pub fn classify(&self, code: i32) -> ReturnCodeClass {
        if code == return_code::OK {
            ReturnCodeClass::Ok
        } else if self.benign_codes.contains(&code) {
            ReturnCodeClass::Benign(code)
        } else {
            ReturnCodeClass::Fatal(code)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DatastreamRegistry {
    kinds: HashMap<(u16, u16), DatastreamKind>,
}

impl DatastreamRegistry {
    /// An empty registry. Every datastream read through it is unknown until registered.
    pub fn new() -> DatastreamRegistry {
        DatastreamRegistry::default()
    }

    /// Registry with the remote command, network print and database kinds of this crate.
    pub fn with_defaults() -> DatastreamRegistry {
        let mut registry = DatastreamRegistry::new();
        registry.register(
            server::REMOTE_COMMAND,
            template::CALL_PROGRAM_REQUEST,
            DatastreamKind::request(
                "call program",
                template::ProgramCallTemplate::LEN,
                &[template::CP_PARAMETER_LIST],
            ),
        );
        registry.register(
            server::REMOTE_COMMAND,
            template::CALL_PROGRAM_REPLY,
            DatastreamKind::reply(
                "call program reply",
                template::ProgramCallReplyTemplate::LEN,
                &[template::CP_PARAMETER_LIST],
                ReturnCodeField::U16At(0),
            )
            .with_message_code_point(template::CP_MESSAGE_LIST),
        );
        registry.register(
            server::NETWORK_PRINT,
            template::NP_REQUEST,
            DatastreamKind::request(
                "network print request",
                template::NpTemplate::LEN,
                &[template::CP_NP_ATTRIBUTES, template::CP_NP_SELECTION],
            ),
        );
        registry.register(
            server::NETWORK_PRINT,
            template::NP_REPLY,
            DatastreamKind::reply(
                "network print reply",
                template::NpTemplate::LEN,
                &[template::CP_NP_ATTRIBUTES],
                ReturnCodeField::U16At(4),
            )
            .with_message_code_point(template::CP_MESSAGE_LIST),
        );
        registry.register(
            server::DATABASE,
            template::DB_PREPARE_DESCRIBE,
            DatastreamKind::request(
                "prepare and describe",
                template::DbRequestTemplate::LEN,
                &[
                    template::CP_DB_STATEMENT_NAME,
                    template::CP_DB_STATEMENT_TEXT,
                    template::CP_DB_PREPARE_OPTION,
                    template::CP_DB_CURSOR_NAME,
                ],
            ),
        );
        registry.register(
            server::DATABASE,
            template::DB_REPLY,
            DatastreamKind::reply(
                "database reply",
                template::DbReplyTemplate::LEN,
                &[template::CP_DB_SUPER_EXTENDED_FORMAT],
                ReturnCodeField::I32At(16),
            )
            .with_additional_benign_codes(&[return_code::SQL_END_OF_DATA]),
        );
        registry
    }

    /// Registers a kind, replacing any previous registration for the same ids.
    pub fn register(&mut self, server_id: u16, request_id: u16, kind: DatastreamKind) {
        self.kinds.insert((server_id, request_id), kind);
    }

    pub fn lookup(&self, server_id: u16, request_id: u16) -> Result<&DatastreamKind, ReadError> {
        self.kinds
            .get(&(server_id, request_id))
            .ok_or(ReadError::UnknownDatastream {
                server_id,
                request_id,
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_return_codes() {
        let registry = DatastreamRegistry::with_defaults();
        let kind = registry
            .lookup(server::REMOTE_COMMAND, template::CALL_PROGRAM_REPLY)
            .unwrap();
        assert_eq!(kind.classify(0), ReturnCodeClass::Ok);
        assert_eq!(
            kind.classify(return_code::EMPTY_LIST),
            ReturnCodeClass::Benign(return_code::EMPTY_LIST)
        );
        assert_eq!(
            kind.classify(return_code::PROGRAM_ERROR),
            ReturnCodeClass::Fatal(return_code::PROGRAM_ERROR)
        );
        assert!(kind.knows(template::CP_MESSAGE_LIST));
    }

    #[test]
    fn database_end_of_data_is_benign() {
        let registry = DatastreamRegistry::with_defaults();
        let kind = registry.lookup(server::DATABASE, template::DB_REPLY).unwrap();
        assert_eq!(kind.classify(100), ReturnCodeClass::Benign(100));
        for &code in return_code::BENIGN {
            assert_eq!(kind.classify(code), ReturnCodeClass::Benign(code));
        }
        assert_eq!(kind.classify(-204), ReturnCodeClass::Fatal(-204));
    }

    #[test]
    fn replacing_benign_codes() {
        let kind = DatastreamKind::reply("custom", 2, &[], ReturnCodeField::U16At(0))
            .with_benign_codes(&[42]);
        assert_eq!(kind.classify(42), ReturnCodeClass::Benign(42));
        assert_eq!(
            kind.classify(return_code::EMPTY_LIST),
            ReturnCodeClass::Fatal(return_code::EMPTY_LIST)
        );
        let kind = kind.with_additional_benign_codes(&[42, 43]);
        assert_eq!(kind.benign_codes, vec![42, 43]);
    }

    #[test]
    fn unknown_kind() {
        let registry = DatastreamRegistry::new();
        assert!(matches!(
            registry.lookup(server::SIGNON, 0x7004),
            Err(ReadError::UnknownDatastream {
                server_id: 0xE009,
                request_id: 0x7004
            })
        ));
    }
}
