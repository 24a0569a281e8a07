//! An emulated host serving synthetic lists through the open list APIs.
//!
//! `QGYMOCK/OPNLST` opens a list that is built in the background. Every later `QGYGTLE` call
//! on the list advances the build by one step until the list is complete.
//!
//! `OPNLST` takes `receiver, receiver length, list information, number of records, total
//! records, record length, build steps, error code`. Record `n` (1-based) holds `n` as a
//! big-endian `BINARY(4)` followed by EBCDIC blanks.
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use hostserver_protocol::list_info::{
    InfoComplete, LIST_INFORMATION_LEN, ListHandle, ListInformation, ListStatus, api,
};
use hostserver_protocol::message::HostMessage;
use hostserver_protocol::program::ProgramParameter;

use crate::HostServer;

pub const MOCK_LIBRARY: &str = "QGYMOCK";
pub const OPEN_LIST: &str = "OPNLST";

/// Parameter positions of `OPNLST`.
pub mod open_list {
    pub const RECEIVER: usize = 0;
    pub const RECEIVER_LENGTH: usize = 1;
    pub const LIST_INFORMATION: usize = 2;
    pub const NUMBER_OF_RECORDS: usize = 3;
    pub const TOTAL_RECORDS: usize = 4;
    pub const RECORD_LENGTH: usize = 5;
    pub const BUILD_STEPS: usize = 6;
    pub const ERROR_CODE: usize = 7;
}

const RECORD_NUMBER_LEN: usize = 4;
/// Creation timestamp reported for every list, `CYYMMDDHHMMSS`.
const CREATED: &str = "1261019120000";

#[derive(Debug)]
struct SyntheticList {
    total_records: i32,
    record_length: i32,
    build_steps: u32,
    polls: u32,
}

impl SyntheticList {
    fn status(&self) -> ListStatus {
        if self.polls >= self.build_steps {
            ListStatus::Complete
        } else if self.polls == 0 {
            ListStatus::Pending
        } else {
            ListStatus::BeingBuilt
        }
    }

    /// Records built so far.
    fn built(&self) -> i32 {
        if self.polls >= self.build_steps {
            self.total_records
        } else {
            (self.total_records as i64 * self.polls as i64 / self.build_steps as i64) as i32
        }
    }

    fn record(&self, number: i32) -> Vec<u8> {
        let mut record = vec![0x40u8; self.record_length as usize];
        record[..RECORD_NUMBER_LEN].copy_from_slice(&number.to_be_bytes());
        record
    }

    /// Fills the receiver with up to `count` records from the 1-based `start`.
    fn page(
        &self,
        handle: ListHandle,
        receiver_len: usize,
        count: i32,
        start: i32,
    ) -> (ListInformation, Vec<u8>) {
        let status = self.status();
        let mut receiver = Vec::new();
        let mut returned = 0;
        if start > 0 {
            let available = (self.built() - (start - 1)).max(0);
            let fit = (receiver_len / self.record_length as usize).min(i32::MAX as usize) as i32;
            returned = count.min(available).min(fit).max(0);
            for number in start..start + returned {
                receiver.extend(self.record(number));
            }
        }
        let info = ListInformation {
            total_records: self.built(),
            records_returned: returned,
            handle,
            record_length: self.record_length,
            info_complete: match status {
                ListStatus::Complete => InfoComplete::Complete,
                _ => InfoComplete::Partial,
            },
            created: CREATED.to_string(),
            status,
            info_length: LIST_INFORMATION_LEN as i32,
            first_record: if returned > 0 { start } else { 0 },
        };
        (info, receiver)
    }
}

/// Host serving synthetic lists.
#[derive(Debug, Default)]
pub struct ListHost {
    lists: Mutex<HashMap<ListHandle, SyntheticList>>,
    last_handle: Mutex<u32>,
}

fn parameter_error(index: usize) -> HostMessage {
    HostMessage::new(
        "CPF3C1D",
        format!("Length specified in parameter {} not valid.", index + 1),
        40,
    )
}

fn handle_error(handle: &[u8]) -> HostMessage {
    HostMessage::new(
        "GUI0002",
        format!("{:02X?} is not valid for parameter request handle.", handle),
        40,
    )
}

fn int_parameter(parameters: &[ProgramParameter], index: usize) -> Result<i32, Vec<HostMessage>> {
    parameters
        .get(index)
        .and_then(|p| p.as_i32().ok())
        .ok_or_else(|| vec![parameter_error(index)])
}

fn handle_parameter(
    parameters: &[ProgramParameter],
    index: usize,
) -> Result<ListHandle, Vec<HostMessage>> {
    let data = &parameters
        .get(index)
        .ok_or_else(|| vec![parameter_error(index)])?
        .data;
    let bytes: [u8; 4] = data
        .as_slice()
        .try_into()
        .map_err(|_| vec![handle_error(data)])?;
    Ok(ListHandle::new(bytes))
}

/// Stores `data` into an output parameter, cut to the length the caller provided.
fn fill(
    parameters: &mut [ProgramParameter],
    index: usize,
    mut data: Vec<u8>,
) -> Result<(), Vec<HostMessage>> {
    let parameter = parameters
        .get_mut(index)
        .ok_or_else(|| vec![parameter_error(index)])?;
    data.truncate(parameter.max_length as usize);
    parameter.data = data;
    Ok(())
}

fn expect_count(
    parameters: &[ProgramParameter],
    count: usize,
    program: &str,
) -> Result<(), Vec<HostMessage>> {
    if parameters.len() == count {
        Ok(())
    } else {
        Err(vec![HostMessage::new(
            "CPD0172",
            format!(
                "Parameters passed on CALL do not match those required: {} expects {}, got {}.",
                program,
                count,
                parameters.len()
            ),
            30,
        )])
    }
}

fn list_information_bytes(info: &ListInformation) -> Result<Vec<u8>, Vec<HostMessage>> {
    info.to_bytes()
        .map_err(|e| vec![HostMessage::new("CPF3CF2", e.to_string(), 40)])
}

impl ListHost {
    pub fn new() -> ListHost {
        ListHost::default()
    }

    /// Number of lists that are open and not yet closed.
    pub fn open_lists(&self) -> usize {
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_handle(&self) -> ListHandle {
        let mut last = self
            .last_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = last.wrapping_add(1);
        ListHandle::new(last.to_be_bytes())
    }

    fn open_list(
        &self,
        mut parameters: Vec<ProgramParameter>,
    ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>> {
        use open_list::*;
        expect_count(&parameters, 8, OPEN_LIST)?;
        let receiver_len = int_parameter(&parameters, RECEIVER_LENGTH)?;
        let count = int_parameter(&parameters, NUMBER_OF_RECORDS)?;
        let total_records = int_parameter(&parameters, TOTAL_RECORDS)?;
        let record_length = int_parameter(&parameters, RECORD_LENGTH)?;
        let build_steps = int_parameter(&parameters, BUILD_STEPS)?;
        if receiver_len < 0 {
            return Err(vec![parameter_error(RECEIVER_LENGTH)]);
        }
        if total_records < 0 {
            return Err(vec![parameter_error(TOTAL_RECORDS)]);
        }
        if record_length < RECORD_NUMBER_LEN as i32 {
            return Err(vec![parameter_error(RECORD_LENGTH)]);
        }
        if build_steps < 0 {
            return Err(vec![parameter_error(BUILD_STEPS)]);
        }

        let handle = self.next_handle();
        let list = SyntheticList {
            total_records,
            record_length,
            build_steps: build_steps as u32,
            polls: 0,
        };
        let (info, receiver) = list.page(handle, receiver_len as usize, count, 1);
        log::info!(
            "Opened list {} with {} records of {} bytes, complete after {} steps",
            handle,
            total_records,
            record_length,
            build_steps
        );
        self.lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, list);

        fill(&mut parameters, RECEIVER, receiver)?;
        fill(&mut parameters, LIST_INFORMATION, list_information_bytes(&info)?)?;
        Ok(parameters)
    }

    fn get_list_entries(
        &self,
        mut parameters: Vec<ProgramParameter>,
    ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>> {
        expect_count(&parameters, 7, api::GET_LIST_ENTRIES)?;
        let receiver_len = int_parameter(&parameters, api::RECEIVER_LENGTH)?;
        let handle = handle_parameter(&parameters, api::HANDLE)?;
        let count = int_parameter(&parameters, api::NUMBER_OF_RECORDS)?;
        let start = int_parameter(&parameters, api::STARTING_RECORD)?;
        if receiver_len < 0 {
            return Err(vec![parameter_error(api::RECEIVER_LENGTH)]);
        }

        let (info, receiver) = {
            let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
            let list = lists
                .get_mut(&handle)
                .ok_or_else(|| vec![handle_error(handle.as_bytes())])?;
            list.polls = list.polls.saturating_add(1);
            list.page(handle, receiver_len as usize, count, start)
        };
        log::debug!(
            "List {} in status {}: returning {} records from {}",
            handle,
            info.status,
            info.records_returned,
            start
        );
        fill(&mut parameters, api::RECEIVER, receiver)?;
        fill(
            &mut parameters,
            api::LIST_INFORMATION,
            list_information_bytes(&info)?,
        )?;
        Ok(parameters)
    }

    fn close_list(
        &self,
        parameters: Vec<ProgramParameter>,
    ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>> {
        expect_count(&parameters, 2, api::CLOSE_LIST)?;
        let handle = handle_parameter(&parameters, 0)?;
        let removed = self
            .lists
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
        match removed {
            Some(_) => {
                log::info!("Closed list {}", handle);
                Ok(parameters)
            }
            None => Err(vec![handle_error(handle.as_bytes())]),
        }
    }
}

impl HostServer for ListHost {
    fn call_program(
        &self,
        library: &str,
        program: &str,
        parameters: Vec<ProgramParameter>,
    ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>> {
        match (library, program) {
            (MOCK_LIBRARY, OPEN_LIST) => self.open_list(parameters),
            (api::LIBRARY, api::GET_LIST_ENTRIES) => self.get_list_entries(parameters),
            (api::LIBRARY, api::CLOSE_LIST) => self.close_list(parameters),
            _ => Err(vec![HostMessage::new(
                "CPF9811",
                format!("Program {} in library {} not found.", program, library),
                40,
            )]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn open(host: &ListHost, total: i32, count: i32, build_steps: i32) -> Vec<ProgramParameter> {
        host.call_program(
            MOCK_LIBRARY,
            OPEN_LIST,
            vec![
                ProgramParameter::output(1024),
                ProgramParameter::input_i32(1024),
                ProgramParameter::output(LIST_INFORMATION_LEN as u32),
                ProgramParameter::input_i32(count),
                ProgramParameter::input_i32(total),
                ProgramParameter::input_i32(16),
                ProgramParameter::input_i32(build_steps),
                ProgramParameter::input_output(vec![0; 8], 8),
            ],
        )
        .unwrap()
    }

    fn get_entries(
        host: &ListHost,
        handle: ListHandle,
        receiver_len: i32,
        count: i32,
        start: i32,
    ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>> {
        host.call_program(
            api::LIBRARY,
            api::GET_LIST_ENTRIES,
            vec![
                ProgramParameter::output(receiver_len as u32),
                ProgramParameter::input_i32(receiver_len),
                ProgramParameter::input(handle.as_bytes().to_vec()),
                ProgramParameter::output(LIST_INFORMATION_LEN as u32),
                ProgramParameter::input_i32(count),
                ProgramParameter::input_i32(start),
                ProgramParameter::input_output(vec![0; 8], 8),
            ],
        )
    }

    fn info_of(parameters: &[ProgramParameter], index: usize) -> ListInformation {
        ListInformation::parse(&parameters[index].data).unwrap()
    }

    #[test]
    fn complete_list_returns_first_records() {
        let host = ListHost::new();
        let parameters = open(&host, 10, 4, 0);
        let info = info_of(&parameters, open_list::LIST_INFORMATION);
        assert_eq!(info.status, ListStatus::Complete);
        assert_eq!(info.info_complete, InfoComplete::Complete);
        assert_eq!(info.total_records, 10);
        assert_eq!(info.records_returned, 4);
        assert_eq!(info.first_record, 1);
        assert_eq!(info.created, CREATED);
        let receiver = &parameters[open_list::RECEIVER].data;
        assert_eq!(receiver.len(), 64);
        assert_eq!(&receiver[16..20], &[0, 0, 0, 2]);
        assert_eq!(receiver[20], 0x40);
    }

    #[test]
    fn list_builds_in_steps() {
        let host = ListHost::new();
        let info = info_of(&open(&host, 100, 10, 3), open_list::LIST_INFORMATION);
        assert_eq!(info.status, ListStatus::Pending);
        assert_eq!(info.records_returned, 0);

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let parameters = get_entries(&host, info.handle, 0, 0, 0).unwrap();
            statuses.push(info_of(&parameters, api::LIST_INFORMATION).status);
        }
        assert_eq!(
            statuses,
            vec![
                ListStatus::BeingBuilt,
                ListStatus::BeingBuilt,
                ListStatus::Complete
            ]
        );
    }

    #[test]
    fn entries_limited_by_receiver() {
        let host = ListHost::new();
        let info = info_of(&open(&host, 100, 0, 0), open_list::LIST_INFORMATION);
        let parameters = get_entries(&host, info.handle, 40, 10, 21).unwrap();
        let page = info_of(&parameters, api::LIST_INFORMATION);
        assert_eq!(page.records_returned, 2);
        assert_eq!(page.first_record, 21);
        assert_eq!(&parameters[api::RECEIVER].data[..4], &[0, 0, 0, 21]);
    }

    #[test]
    fn close_then_use_handle() {
        let host = ListHost::new();
        let info = info_of(&open(&host, 5, 0, 0), open_list::LIST_INFORMATION);
        assert_eq!(host.open_lists(), 1);
        let close = |host: &ListHost| {
            host.call_program(
                api::LIBRARY,
                api::CLOSE_LIST,
                vec![
                    ProgramParameter::input(info.handle.as_bytes().to_vec()),
                    ProgramParameter::input_output(vec![0; 8], 8),
                ],
            )
        };
        assert!(close(&host).is_ok());
        assert_eq!(host.open_lists(), 0);
        let messages = close(&host).unwrap_err();
        assert_eq!(messages[0].id, "GUI0002");
        assert!(get_entries(&host, info.handle, 0, 0, 0).is_err());
    }

    #[test]
    fn invalid_parameters() {
        let host = ListHost::new();
        let messages = host
            .call_program(MOCK_LIBRARY, OPEN_LIST, vec![ProgramParameter::input_i32(1)])
            .unwrap_err();
        assert_eq!(messages[0].id, "CPD0172");
        let messages = host
            .call_program("QSYS", "QGYOLJBL", Vec::new())
            .unwrap_err();
        assert_eq!(messages[0].id, "CPF9811");
    }
}
