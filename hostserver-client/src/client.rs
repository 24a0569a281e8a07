use std::{net::ToSocketAddrs, sync::Arc};

use hostserver_protocol::ccsid::{CharConverter, converter_for};
use hostserver_protocol::datastream::Datastream;
use hostserver_protocol::message::decode_message_list;
use hostserver_protocol::program::{ProgramCall, ProgramParameter};
use hostserver_protocol::registry::{DatastreamRegistry, ReturnCodeClass, return_code};

use crate::config::Config;
use crate::error::HostError;
use crate::transport::{TcpTransport, Transport};

/// Outcome of a reply that was not raised as an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyStatus {
    Ok,
    /// Non-zero code the host uses for expected conditions such as an empty list.
    Benign(i32),
}

#[derive(Clone, Debug)]
pub struct Reply {
    pub datastream: Datastream,
    pub return_code: i32,
    pub status: ReplyStatus,
}

/// Parameters returned by a program call, in call order.
#[derive(Clone, Debug)]
pub struct ProgramOutput {
    pub status: ReplyStatus,
    pub parameters: Vec<ProgramParameter>,
}

impl ProgramOutput {
    pub fn parameter(&self, index: usize) -> Result<&ProgramParameter, HostError> {
        self.parameters.get(index).ok_or_else(|| {
            HostError::Protocol(format!(
                "Program call reply has no parameter {} ({} returned)",
                index,
                self.parameters.len()
            ))
        })
    }
}

/// Client for one host server connection.
pub struct HostClient<T: Transport> {
    transport: T,
    registry: Arc<DatastreamRegistry>,
    converter: &'static dyn CharConverter,
    config: Config,
}

impl HostClient<TcpTransport> {
    /// Connects to the remote command server at `addr` with the default registry.
    pub fn connect(addr: impl ToSocketAddrs, config: Config) -> Result<Self, HostError> {
        let registry = Arc::new(DatastreamRegistry::with_defaults());
        let transport = TcpTransport::connect(addr, registry.clone(), &config)?;
        log::info!("Connected to host server");
        HostClient::new(transport, registry, config)
    }
}

impl<T: Transport> HostClient<T> {
    pub fn new(
        transport: T,
        registry: Arc<DatastreamRegistry>,
        config: Config,
    ) -> Result<Self, HostError> {
        let converter = converter_for(config.host_ccsid)?;
        Ok(HostClient {
            transport,
            registry,
            converter,
            config,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn converter(&self) -> &'static dyn CharConverter {
        self.converter
    }

    /// Sends `request` and classifies the reply by its return code.
    ///
    /// Codes the reply kind declares benign come back as [`ReplyStatus::Benign`]. Every other
    /// non-zero code is raised as [`HostError::Server`] with the messages of the reply.
    pub fn request(&mut self, mut request: Datastream) -> Result<Reply, HostError> {
        let datastream = self.transport.send_and_receive(&mut request)?;
        let kind = self
            .registry
            .lookup(datastream.server_id(), datastream.request_id())?;
        let code = kind.return_code(&datastream)?.unwrap_or(return_code::OK);
        let status = match kind.classify(code) {
            ReturnCodeClass::Ok => ReplyStatus::Ok,
            ReturnCodeClass::Benign(code) => {
                log::debug!("{} returned benign code 0x{:04X}", kind.name, code);
                ReplyStatus::Benign(code)
            }
            ReturnCodeClass::Fatal(code) => {
                let messages = kind
                    .message_code_point
                    .and_then(|id| datastream.code_point(id))
                    .map(|list| decode_message_list(list, self.converter))
                    .transpose()?
                    .unwrap_or_default();
                return Err(HostError::Server {
                    return_code: code,
                    messages,
                });
            }
        };
        Ok(Reply {
            datastream,
            return_code: code,
            status,
        })
    }

    /// Calls `library/program` through the remote command server.
    pub fn call_program(
        &mut self,
        library: &str,
        program: &str,
        parameters: Vec<ProgramParameter>,
    ) -> Result<ProgramOutput, HostError> {
        log::debug!(
            "Calling {}/{} with {} parameters",
            library,
            program,
            parameters.len()
        );
        let request = ProgramCall::new(library, program, parameters).to_request(self.converter)?;
        let reply = self.request(request)?;
        Ok(ProgramOutput {
            status: reply.status,
            parameters: hostserver_protocol::program::parameters(&reply.datastream)?,
        })
    }
}
