//! # IBM i Host Server Emulation Library
//!
//! This crate provides a foundation for emulating the remote command host server of IBM i,
//! so that host clients can be exercised without a real system.
//!
//! ## Overview
//!
//! The remote command server runs programs on behalf of a client and returns their output
//! parameters. This library handles the datastream exchange and hands every program call to
//! a backend.
//!
//! ## Architecture
//!
//! - **[`HostServer`] Trait**: Defines the interface a backend implements to run programs
//! - **[`server::Server`]**: A generic server that reads datastreams, dispatches program calls
//!   to the backend and writes the replies
//! - **[`lists::ListHost`]**: A backend serving synthetic lists through the open list APIs
//!   (`QGYGTLE`, `QGYCLST`)
//!
//! ## How It Works
//!
//! 1. A backend implements the [`HostServer`] trait
//! 2. The backend is wrapped in a [`server::Server`] instance
//! 3. The server listens for TCP connections and decodes each request
//! 4. Program calls are dispatched to the backend
//! 5. Output parameters, or the messages of a failed call, are sent back to the client
//!
//! Requests the server does not serve are answered with return code 8, function not
//! supported, on the request id with the reply bit set.
//!
//! ## Basic Usage
//!
//! ### Implementing a Backend
//!
//! ```
//! use hostserver_protocol::message::HostMessage;
//! use hostserver_protocol::program::ProgramParameter;
//! use hostserver_server::HostServer;
//!
//! struct Echo;
//!
//! impl HostServer for Echo {
//!     fn call_program(
//!         &self,
//!         library: &str,
//!         program: &str,
//!         parameters: Vec<ProgramParameter>,
//!     ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>> {
//!         match (library, program) {
//!             ("MYLIB", "ECHO") => Ok(parameters),
//!             _ => Err(vec![HostMessage::new("CPF9811", "Program not found.", 40)]),
//!         }
//!     }
//! }
//! ```
//!
//! ### Starting the Server
//!
//! ```ignore
//! use hostserver_server::lists::ListHost;
//! use hostserver_server::server::{Config, Server};
//!
//! let server = Server::new(ListHost::new(), Config::default());
//! server.listen("127.0.0.1:8475")?;
//! ```
//!
//! ## Configuration
//!
//! Server behavior can be customized via [`server::Config`]:
//!
//! - **max_datastream_len**: Largest accepted request (default: 16 MiB)
//! - **read_write_timeout**: Socket I/O timeout duration (default: 30 seconds)
//! - **host_ccsid**: Character set of object names and message texts (default: 37)
//!
//! ## Logging
//!
//! This crate uses the `log` crate for diagnostics: connections, dispatched program calls,
//! list state changes and raw datastreams at trace level.
//!
//! ## Thread Model
//!
//! The server processes each client connection sequentially in a single thread.
//! Backends take `&self` and keep their state behind locks, so one backend can be shared by
//! several servers.
use hostserver_protocol::message::HostMessage;
use hostserver_protocol::program::ProgramParameter;

pub mod lists;
pub mod server;

/// Interface between the datastream server and the programs it emulates.
pub trait HostServer {
    /// Run `library/program` with the parameters of a program call.
    ///
    /// On success the returned parameters are sent back in request order; output data longer
    /// than a parameter's maximum length is the backend's error. On failure the messages are
    /// returned to the client together with the program error return code.
    fn call_program(
        &self,
        library: &str,
        program: &str,
        parameters: Vec<ProgramParameter>,
    ) -> Result<Vec<ProgramParameter>, Vec<HostMessage>>;
}
