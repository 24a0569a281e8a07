use std::{io, time::Duration};

use hostserver_protocol::error::ReadError;
use hostserver_protocol::list_info::{ListHandle, ListStatus};
use hostserver_protocol::message::HostMessage;
use thiserror::Error;

/// Errors of a host server exchange or of the list protocol.
#[derive(Debug, Error)]
pub enum HostError {
    /// The connection failed or timed out.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The host sent something that could not be decoded.
    #[error("Protocol error: {0}")]
    Read(#[from] ReadError),
    #[error("Host returned code 0x{return_code:04X}{}", describe_messages(.messages))]
    Server {
        return_code: i32,
        messages: Vec<HostMessage>,
    },
    #[error("Building list {handle} was interrupted")]
    ListInterrupted { handle: ListHandle },
    #[error(
        "List {handle} ended in status {status} with {records_returned} of {total_records} records"
    )]
    ListStatus {
        handle: ListHandle,
        status: ListStatus,
        total_records: i32,
        records_returned: i32,
    },
    #[error("List {handle} was not complete after waiting {waited:?}")]
    ListTimeout { handle: ListHandle, waited: Duration },
    #[error("Status of list {handle} went back from {from} to {to}")]
    ListRegressed {
        handle: ListHandle,
        from: ListStatus,
        to: ListStatus,
    },
    #[error("Waiting for list {handle} was cancelled")]
    Cancelled { handle: ListHandle },
    #[error(
        "List {handle}: only {returned} of {requested} entries fit after {attempts} attempts (receiver length {receiver_len})"
    )]
    BufferGrowthExhausted {
        handle: ListHandle,
        requested: i32,
        returned: i32,
        attempts: u32,
        receiver_len: usize,
    },
    #[error("Offset {offset} is not a valid list position")]
    InvalidOffset { offset: i32 },
    #[error("{0}")]
    Protocol(String),
}

fn describe_messages(messages: &[HostMessage]) -> String {
    messages.iter().map(|m| format!("; {}", m)).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn server_error_lists_messages() {
        let error = HostError::Server {
            return_code: 0x0500,
            messages: vec![
                HostMessage::new("CPF9801", "Object not found.", 40),
                HostMessage::new("CPF3C90", "Literal value cannot be changed.", 30),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Host returned code 0x0500; CPF9801: Object not found. (severity 40); \
             CPF3C90: Literal value cannot be changed. (severity 30)"
        );
    }

    #[test]
    fn list_status_error() {
        let error = HostError::ListStatus {
            handle: ListHandle::new([0, 0, 0, 1]),
            status: ListStatus::TooMuchData,
            total_records: 10,
            records_returned: 2,
        };
        assert_eq!(
            error.to_string(),
            "List [00, 00, 00, 01] ended in status '5' with 2 of 10 records"
        );
    }
}
