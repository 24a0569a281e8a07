//! The open list protocol.
//!
//! List APIs on the host return a handle and an 80-byte list information block while the list
//! is still being built in the background. The functions here wait for such a list to complete,
//! page through its entries and close it again. They work against any [`ListRpc`]; a
//! [`HostClient`] implements it with the `QGYGTLE` and `QGYCLST` APIs.
use std::time::{Duration, Instant};

use hostserver_protocol::list_info::{
    InfoComplete, LIST_INFORMATION_LEN, ListHandle, ListInformation, ListStatus, api,
};
use hostserver_protocol::program::ProgramParameter;
use tokio_util::sync::CancellationToken;

use crate::client::HostClient;
use crate::config::Config;
use crate::error::HostError;
use crate::transport::Transport;

/// The calls the list protocol needs from the host.
pub trait ListRpc {
    /// Fetches a fresh list information block without any entries.
    fn refresh_list_information(&mut self, handle: &ListHandle)
    -> Result<ListInformation, HostError>;

    /// Fetches up to `count` entries starting at the 1-based `starting_record` into a receiver
    /// of `receiver_len` bytes.
    fn get_list_entries(
        &mut self,
        handle: &ListHandle,
        receiver_len: usize,
        count: i32,
        starting_record: i32,
    ) -> Result<ListPage, HostError>;

    fn close_list(&mut self, handle: ListHandle) -> Result<(), HostError>;
}

/// Entries returned by one [`ListRpc::get_list_entries`] call.
#[derive(Clone, Debug)]
pub struct ListPage {
    pub info: ListInformation,
    pub receiver: Vec<u8>,
}

impl ListPage {
    /// The returned records, each `record_length` bytes long.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        let len = usize::try_from(self.info.record_length).unwrap_or(0);
        let count = match len {
            0 => 0,
            _ => usize::try_from(self.info.records_returned).unwrap_or(0),
        };
        self.receiver.chunks_exact(len.max(1)).take(count)
    }
}

/// Waits between two polls of a list that is still being built.
pub trait Pause {
    /// Blocks for `interval`. Returns `false` if the wait was cancelled.
    fn pause(&mut self, interval: Duration) -> bool;
}

/// Sleeps on the calling thread and wakes up early once the token is cancelled.
#[derive(Clone, Debug, Default)]
pub struct ThreadPause {
    token: CancellationToken,
}

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

impl ThreadPause {
    pub fn new(token: CancellationToken) -> ThreadPause {
        ThreadPause { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Pause for ThreadPause {
    fn pause(&mut self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        loop {
            if self.token.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// Zero waits without limit.
    pub max_wait: Duration,
}

impl From<&Config> for WaitOptions {
    fn from(config: &Config) -> Self {
        WaitOptions {
            poll_interval: config.list_poll_interval,
            max_wait: config.list_wait_timeout,
        }
    }
}

/// Bounds for growing the receiver of a page request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GrowthLimits {
    pub max_attempts: u32,
    pub max_receiver_length: usize,
}

impl From<&Config> for GrowthLimits {
    fn from(config: &Config) -> Self {
        GrowthLimits {
            max_attempts: config.max_buffer_growth_attempts,
            max_receiver_length: config.max_receiver_length,
        }
    }
}

/// Polls the list until the host reports it complete and returns the last information block.
///
/// An interrupted list fails even when its status reads complete. A status that moves back
/// towards pending is a protocol violation and fails as well.
pub fn wait_for_list_to_complete<R: ListRpc + ?Sized>(
    rpc: &mut R,
    handle: &ListHandle,
    info: ListInformation,
    options: &WaitOptions,
    pause: &mut dyn Pause,
) -> Result<ListInformation, HostError> {
    let mut info = info;
    let mut waited = Duration::ZERO;
    loop {
        if info.info_complete == InfoComplete::Interrupted {
            return Err(HostError::ListInterrupted { handle: *handle });
        }
        match info.status {
            ListStatus::Complete => return Ok(info),
            ListStatus::Pending | ListStatus::BeingBuilt => {
                if !options.max_wait.is_zero() && waited >= options.max_wait {
                    return Err(HostError::ListTimeout {
                        handle: *handle,
                        waited,
                    });
                }
                if !pause.pause(options.poll_interval) {
                    return Err(HostError::Cancelled { handle: *handle });
                }
                waited += options.poll_interval;
                let next = rpc.refresh_list_information(handle)?;
                if let (Some(before), Some(after)) = (info.status.progress(), next.status.progress())
                    && after < before
                {
                    return Err(HostError::ListRegressed {
                        handle: *handle,
                        from: info.status,
                        to: next.status,
                    });
                }
                log::debug!(
                    "List {} status {} after {:?}, {} records so far",
                    handle,
                    next.status,
                    waited,
                    next.total_records
                );
                info = next;
            }
            status => {
                log::warn!(
                    "List {} in unexpected status {}: total records {}, records returned {}, info complete '{}'",
                    handle,
                    status,
                    info.total_records,
                    info.records_returned,
                    info.info_complete.as_char()
                );
                return Err(HostError::ListStatus {
                    handle: *handle,
                    status,
                    total_records: info.total_records,
                    records_returned: info.records_returned,
                });
            }
        }
    }
}

/// Retrieves `count` entries starting at the 0-based `offset`.
///
/// When fewer entries come back than requested and the list has more, the receiver was too
/// small. It then grows by `1 + count / (returned + 1)` and the request is repeated, within
/// `limits`. A negative offset, or one past the last possible record, is rejected before
/// anything is sent.
pub fn retrieve_list_entries<R: ListRpc + ?Sized>(
    rpc: &mut R,
    handle: &ListHandle,
    offset: i32,
    count: i32,
    initial_len: usize,
    limits: &GrowthLimits,
) -> Result<ListPage, HostError> {
    let starting_record = match offset.checked_add(1) {
        Some(record) if offset >= 0 => record,
        _ => return Err(HostError::InvalidOffset { offset }),
    };
    let mut receiver_len = initial_len.clamp(1, limits.max_receiver_length.max(1));
    let mut attempts = 0;
    loop {
        let page = rpc.get_list_entries(handle, receiver_len, count, starting_record)?;
        let returned = page.info.records_returned.max(0);
        if returned >= count || offset.saturating_add(returned) >= page.info.total_records {
            return Ok(page);
        }
        if attempts >= limits.max_attempts || receiver_len >= limits.max_receiver_length {
            return Err(HostError::BufferGrowthExhausted {
                handle: *handle,
                requested: count,
                returned,
                attempts,
                receiver_len,
            });
        }
        let factor = 1 + (count / (returned + 1)) as usize;
        let grown = receiver_len
            .saturating_mul(factor)
            .min(limits.max_receiver_length);
        log::debug!(
            "List {}: {} of {} entries fit into {} bytes, retrying with {}",
            handle,
            returned,
            count,
            receiver_len,
            grown
        );
        receiver_len = grown;
        attempts += 1;
    }
}

/// Closes the list and clears `handle`. Does nothing if there is no handle.
pub fn close_list<R: ListRpc + ?Sized>(
    rpc: &mut R,
    handle: &mut Option<ListHandle>,
) -> Result<(), HostError> {
    match handle.take() {
        Some(handle) => {
            log::debug!("Closing list {}", handle);
            rpc.close_list(handle)
        }
        None => Ok(()),
    }
}

fn error_code_parameter() -> ProgramParameter {
    ProgramParameter::input_output(vec![0; api::ERROR_CODE_LEN as usize], api::ERROR_CODE_LEN)
}

impl<T: Transport> HostClient<T> {
    fn call_get_list_entries(
        &mut self,
        handle: &ListHandle,
        receiver_len: usize,
        count: i32,
        starting_record: i32,
    ) -> Result<ListPage, HostError> {
        let length = i32::try_from(receiver_len).map_err(|_| {
            HostError::Protocol(format!("Receiver length {} out of range", receiver_len))
        })?;
        let parameters = vec![
            ProgramParameter::output(length as u32),
            ProgramParameter::input_i32(length),
            ProgramParameter::input(handle.as_bytes().to_vec()),
            ProgramParameter::output(LIST_INFORMATION_LEN as u32),
            ProgramParameter::input_i32(count),
            ProgramParameter::input_i32(starting_record),
            error_code_parameter(),
        ];
        let output = self.call_program(api::LIBRARY, api::GET_LIST_ENTRIES, parameters)?;
        let info = ListInformation::parse(&output.parameter(api::LIST_INFORMATION)?.data)?;
        let receiver = output.parameter(api::RECEIVER)?.data.clone();
        Ok(ListPage { info, receiver })
    }
}

impl<T: Transport> ListRpc for HostClient<T> {
    fn refresh_list_information(
        &mut self,
        handle: &ListHandle,
    ) -> Result<ListInformation, HostError> {
        Ok(self.call_get_list_entries(handle, 0, 0, 0)?.info)
    }

    fn get_list_entries(
        &mut self,
        handle: &ListHandle,
        receiver_len: usize,
        count: i32,
        starting_record: i32,
    ) -> Result<ListPage, HostError> {
        self.call_get_list_entries(handle, receiver_len, count, starting_record)
    }

    fn close_list(&mut self, handle: ListHandle) -> Result<(), HostError> {
        let parameters = vec![
            ProgramParameter::input(handle.as_bytes().to_vec()),
            error_code_parameter(),
        ];
        self.call_program(api::LIBRARY, api::CLOSE_LIST, parameters)?;
        Ok(())
    }
}
