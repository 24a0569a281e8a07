//! # IBM i Host Server Protocol Library
//!
//! This crate implements the binary datastreams spoken by the IBM i host servers
//! (remote command, database, network print and friends) together with the data formats
//! carried inside them.
//!
//! ## Overview
//!
//! Every request and reply is a *datastream*: a fixed 20-byte header, a template whose layout
//! depends on the request, and a sequence of *code points* (length/id/payload triples).
//! This library allows you to:
//!
//! - Serialize and deserialize datastreams, driven by an explicit [`registry::DatastreamRegistry`]
//! - Build and decode program calls and the host messages returned with them
//! - Decode the list information block of the asynchronous list APIs
//! - Locate column names in the super extended data format of the database server
//! - Frame datastreams on a tokio byte stream (feature `tokio`)
//!
//! ## Basic Usage
//!
//! ### Writing a Datastream
//!
//! ```
//! use hostserver_protocol::datastream::{Datastream, server};
//!
//! let mut ds = Datastream::new(server::REMOTE_COMMAND, 0x8003, vec![0x00, 0x00]);
//! ds.add(0x1100, vec![0xAA, 0xBB]);
//! ds.add(0x1102, Vec::new()); // empty code points are not written
//!
//! let bytes = ds.to_bytes().expect("Template and length fit their fields");
//! assert_eq!(bytes.len(), 20 + 2 + 6 + 2);
//! assert_eq!(&bytes[22..], b"\x00\x00\x00\x08\x11\x00\xAA\xBB");
//! ```
//!
//! ### Reading a Datastream
//!
//! ```
//! use hostserver_protocol::datastream::{Datastream, server};
//! use hostserver_protocol::registry::DatastreamRegistry;
//! use std::io::Cursor;
//!
//! let registry = DatastreamRegistry::with_defaults();
//! let mut out = Vec::new();
//! Datastream::new(server::REMOTE_COMMAND, 0x8003, vec![0x00, 0x06])
//!     .write_to(&mut out)
//!     .expect("Writing to vector shouldn't fail");
//!
//! let reply = Datastream::read_from(&mut Cursor::new(out), &registry, 1024)
//!     .expect("Reply should parse");
//! let kind = registry.lookup(reply.server_id(), reply.request_id()).unwrap();
//! assert_eq!(kind.return_code(&reply).unwrap(), Some(6));
//! ```
//!
//! ## Datastream Format
//!
//! All integers are big endian.
//!
//! - **Header**: `total length: u32 | header id: u16 | server id: u16 | CS instance: u32 |
//!   correlation id: u32 | template length: u16 | request id: u16`
//! - **Code point**: `length: u32 | id: u16 | payload`, where the length includes its own six bytes
//!
//! ## Error Handling
//!
//! This library uses the [`error::ReadError`] type for every decoding error.
//! Malformed input never panics and never makes a scan loop forever.
//!
//! ## Thread Safety
//!
//! The types in this library are thread-safe and can be safely shared across threads.
//! The character converters are stateless and shared as `&'static` references.

pub mod binary;
pub mod ccsid;
pub mod codec;
pub mod codepoint;
pub mod database;
pub mod datastream;
pub mod error;
pub mod format;
pub mod list_info;
pub mod message;
pub mod program;
pub mod registry;
pub mod template;

pub use codepoint::CodePoint;
pub use datastream::Datastream;
pub use error::ReadError;
pub use list_info::{ListHandle, ListInformation, ListStatus};
pub use registry::DatastreamRegistry;
