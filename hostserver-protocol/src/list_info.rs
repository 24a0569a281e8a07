//! The 80-byte list information block returned by the list APIs.
use std::fmt::Display;

use crate::binary::{get_i32, put_i32};
use crate::ccsid::Ebcdic37;
use crate::error::ReadError;

pub const LIST_INFORMATION_LEN: usize = 80;

const TOTAL_RECORDS: usize = 0;
const RECORDS_RETURNED: usize = 4;
const REQUEST_HANDLE: usize = 8;
const RECORD_LENGTH: usize = 12;
const INFO_COMPLETE: usize = 16;
const CREATED: usize = 17;
const CREATED_LEN: usize = 13;
const LIST_STATUS: usize = 30;
const INFO_LENGTH: usize = 32;
const FIRST_RECORD: usize = 36;

/// Program names and parameter positions of the open list APIs.
pub mod api {
    pub const LIBRARY: &str = "QSYS";
    /// Get List Entries: `receiver, receiver length, handle, list information, number of
    /// records, starting record, error code`. A starting record of 0 only refreshes the list
    /// information.
    pub const GET_LIST_ENTRIES: &str = "QGYGTLE";
    /// Close List: `handle, error code`.
    pub const CLOSE_LIST: &str = "QGYCLST";

    pub const RECEIVER: usize = 0;
    pub const RECEIVER_LENGTH: usize = 1;
    pub const HANDLE: usize = 2;
    pub const LIST_INFORMATION: usize = 3;
    pub const NUMBER_OF_RECORDS: usize = 4;
    pub const STARTING_RECORD: usize = 5;
    pub const ERROR_CODE: usize = 6;

    /// Error code structure with zero bytes provided, so the host reports errors as messages.
    pub const ERROR_CODE_LEN: u32 = 8;
}

/// Opaque token for a list that the host builds asynchronously.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListHandle([u8; 4]);

impl ListHandle {
    pub const fn new(bytes: [u8; 4]) -> ListHandle {
        ListHandle(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl Display for ListHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X?}", self.0)
    }
}

/// Whether the information in the block is complete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InfoComplete {
    Complete,
    Interrupted,
    Partial,
    Unknown(char),
}

impl InfoComplete {
    fn from_char(c: char) -> InfoComplete {
        match c {
            'C' => InfoComplete::Complete,
            'I' => InfoComplete::Interrupted,
            'P' => InfoComplete::Partial,
            other => InfoComplete::Unknown(other),
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            InfoComplete::Complete => 'C',
            InfoComplete::Interrupted => 'I',
            InfoComplete::Partial => 'P',
            InfoComplete::Unknown(c) => *c,
        }
    }
}

/// Build state of the list on the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListStatus {
    Pending,
    BeingBuilt,
    Complete,
    Error,
    Primed,
    TooMuchData,
    Unknown(char),
}

impl ListStatus {
    fn from_char(c: char) -> ListStatus {
        match c {
            '0' => ListStatus::Pending,
            '1' => ListStatus::BeingBuilt,
            '2' => ListStatus::Complete,
            '3' => ListStatus::Error,
            '4' => ListStatus::Primed,
            '5' => ListStatus::TooMuchData,
            other => ListStatus::Unknown(other),
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            ListStatus::Pending => '0',
            ListStatus::BeingBuilt => '1',
            ListStatus::Complete => '2',
            ListStatus::Error => '3',
            ListStatus::Primed => '4',
            ListStatus::TooMuchData => '5',
            ListStatus::Unknown(c) => *c,
        }
    }

    /// Position along pending, being built and complete.
    /// Error states are terminal and have no progress value.
    pub fn progress(&self) -> Option<u8> {
        match self {
            ListStatus::Pending => Some(0),
            ListStatus::BeingBuilt => Some(1),
            ListStatus::Complete => Some(2),
            _ => None,
        }
    }
}

impl Display for ListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}'", self.as_char())
    }
}

/// Decoded list information block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListInformation {
    pub total_records: i32,
    pub records_returned: i32,
    pub handle: ListHandle,
    pub record_length: i32,
    pub info_complete: InfoComplete,
    /// Creation timestamp in `CYYMMDDHHMMSS` form.
    pub created: String,
    pub status: ListStatus,
    pub info_length: i32,
    /// 1-based number of the first record in the receiver.
    pub first_record: i32,
}

impl ListInformation {
    pub fn parse(buf: &[u8]) -> Result<ListInformation, ReadError> {
        crate::binary::ensure(buf, 0, LIST_INFORMATION_LEN, "list information")?;
        let mut handle = [0u8; 4];
        handle.copy_from_slice(&buf[REQUEST_HANDLE..REQUEST_HANDLE + 4]);
        Ok(ListInformation {
            total_records: get_i32(buf, TOTAL_RECORDS),
            records_returned: get_i32(buf, RECORDS_RETURNED),
            handle: ListHandle(handle),
            record_length: get_i32(buf, RECORD_LENGTH),
            info_complete: InfoComplete::from_char(Ebcdic37::decode_char(buf[INFO_COMPLETE])),
            created: buf[CREATED..CREATED + CREATED_LEN]
                .iter()
                .map(|&b| Ebcdic37::decode_char(b))
                .collect::<String>()
                .trim_end()
                .to_string(),
            status: ListStatus::from_char(Ebcdic37::decode_char(buf[LIST_STATUS])),
            info_length: get_i32(buf, INFO_LENGTH),
            first_record: get_i32(buf, FIRST_RECORD),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; LIST_INFORMATION_LEN];
        put_i32(&mut buf, TOTAL_RECORDS, self.total_records);
        put_i32(&mut buf, RECORDS_RETURNED, self.records_returned);
        buf[REQUEST_HANDLE..REQUEST_HANDLE + 4].copy_from_slice(&self.handle.0);
        put_i32(&mut buf, RECORD_LENGTH, self.record_length);
        buf[INFO_COMPLETE] = encode_indicator(self.info_complete.as_char())?;
        let created: Vec<char> = self.created.chars().collect();
        for (i, slot) in buf[CREATED..CREATED + CREATED_LEN].iter_mut().enumerate() {
            *slot = encode_indicator(created.get(i).copied().unwrap_or(' '))?;
        }
        buf[LIST_STATUS] = encode_indicator(self.status.as_char())?;
        put_i32(&mut buf, INFO_LENGTH, self.info_length);
        put_i32(&mut buf, FIRST_RECORD, self.first_record);
        Ok(buf)
    }
}

fn encode_indicator(c: char) -> Result<u8, ReadError> {
    Ebcdic37::encode_char(c).ok_or_else(|| {
        ReadError::Conversion(format!("Indicator '{}' cannot be encoded in CCSID 37", c))
    })
}
