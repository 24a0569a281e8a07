//! # IBM i Host Server Client
//!
//! A blocking client for the IBM i host servers, built on the datastreams of the
//! [`hostserver_protocol`] crate.
//!
//! ## Overview
//!
//! This crate handles the request/reply exchange with a host server and the asynchronous
//! list protocol on top of it:
//!
//! - **[`transport::Transport`]**: sends datastreams and matches replies by correlation id
//! - **[`client::HostClient`]**: classifies replies by return code and calls host programs
//! - **[`list`]**: waits for lists built in the background, pages through their entries with a
//!   self-tuning receiver size and closes them
//!
//! ## Basic Usage
//!
//! ### Calling a Program
//!
//! ```ignore
//! use hostserver_client::{HostClient, config::Config};
//! use hostserver_protocol::program::ProgramParameter;
//!
//! let mut client = HostClient::connect("myhost:8475", Config::from_env())?;
//! let output = client.call_program("MYLIB", "MYPGM", vec![ProgramParameter::output(64)])?;
//! println!("Returned {:02x?}", output.parameter(0)?.data);
//! ```
//!
//! ### Reading a List
//!
//! ```ignore
//! use hostserver_client::list::{self, GrowthLimits, ThreadPause, WaitOptions};
//!
//! // `info` is the list information returned by the API that opened the list
//! let options = WaitOptions::from(client.config());
//! let limits = GrowthLimits::from(client.config());
//! let handle = info.handle;
//! let mut pause = ThreadPause::default();
//! list::wait_for_list_to_complete(&mut client, &handle, info, &options, &mut pause)?;
//! let page = list::retrieve_list_entries(&mut client, &handle, 0, 100, 4096, &limits)?;
//! for record in page.records() {
//!     // decode the record
//! }
//! list::close_list(&mut client, &mut Some(handle))?;
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::HostError`]. Return codes that the host uses for expected
//! conditions (end of file, empty list, function not supported, no message) are not errors;
//! they are reported as [`client::ReplyStatus::Benign`].
//!
//! ## Configuration
//!
//! See [`config::Config`]. The list wait timeout can be set with the
//! `HOSTSERVER_LIST_WAIT_TIMEOUT` environment variable, in seconds; `0` waits without limit.
//!
//! ## Thread Model
//!
//! A client serves one exchange at a time. The only waiting besides socket I/O is the pause
//! between two polls of a list, which can be cancelled through a
//! [`tokio_util::sync::CancellationToken`].
pub mod client;
pub mod config;
pub mod error;
pub mod list;
pub mod transport;

pub use client::HostClient;
pub use error::HostError;
