use std::{
    io::{ErrorKind, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    time::Duration,
};

use hostserver_protocol::binary::get_u32;
use hostserver_protocol::ccsid::{CCSID_EBCDIC_37, CharConverter, converter_for};
use hostserver_protocol::codec::{DEFAULT_MAX_DATASTREAM_LEN, read_frame};
use hostserver_protocol::datastream::{Datastream, server};
use hostserver_protocol::error::ReadError;
use hostserver_protocol::program::{ProgramCall, call_reply};
use hostserver_protocol::registry::{DatastreamRegistry, return_code};
use hostserver_protocol::template::CALL_PROGRAM_REQUEST;

use crate::HostServer;

/// Bit that turns a request id into the id of its reply.
const REPLY_BIT: u16 = 0x8000;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_datastream_len: usize,
    pub read_write_timeout: Duration,
    /// CCSID of object names and message texts.
    pub host_ccsid: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_datastream_len: DEFAULT_MAX_DATASTREAM_LEN,
            read_write_timeout: Duration::from_secs(30),
            host_ccsid: CCSID_EBCDIC_37,
        }
    }
}

#[derive(Debug)]
pub struct Server<T: HostServer> {
    server: T,
    config: Config,
    registry: DatastreamRegistry,
}

/// Builder to create a [Server] instance and modify configuration options
///
/// # Example
///
/// ```
/// use hostserver_server::lists::ListHost;
/// use hostserver_server::server::Builder;
/// use std::time::Duration;
///
/// let server = Builder::new()
///     .max_datastream_len(64 * 1024)
///     .rw_timeout(Duration::from_secs(20))
///     .build(ListHost::new());
/// assert_eq!(server.config().max_datastream_len, 64 * 1024);
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the largest datastream that this server is expected to receive.
    pub fn max_datastream_len(mut self, len: usize) -> Self {
        self.config.max_datastream_len = len;
        self
    }

    /// Set the TCP read and write timeout
    pub fn rw_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_write_timeout = timeout;
        self
    }

    pub fn host_ccsid(mut self, ccsid: u16) -> Self {
        self.config.host_ccsid = ccsid;
        self
    }

    /// Build and return the server
    pub fn build<T: HostServer>(self, server: T) -> Server<T> {
        Server::new(server, self.config)
    }
}

impl<T: HostServer> Server<T> {
    pub fn new(server: T, config: Config) -> Server<T> {
        Server {
            server,
            config,
            registry: DatastreamRegistry::with_defaults(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn listen(&self, addr: impl ToSocketAddrs) -> Result<(), Box<dyn std::error::Error>> {
        self.listen_on(TcpListener::bind(addr)?)
    }

    /// Serves the clients of an already bound listener, one connection at a time.
    pub fn listen_on(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        let converter = converter_for(self.config.host_ccsid)?;
        log::info!("Server listening for connections on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            match stream {
                Ok(tcp) => {
                    let peer_addr = tcp.peer_addr().ok();
                    if let Some(addr) = peer_addr {
                        log::info!("New client connection from {}", addr);
                    }
                    if let Err(e) = self.handle_client(tcp, converter) {
                        log::error!("Client error: {}", e);
                    }
                }
                Err(e) => log::error!("Connection error: {}", e),
            }
        }
        Ok(())
    }

    fn handle_client(
        &self,
        mut tcp: TcpStream,
        converter: &dyn CharConverter,
    ) -> Result<(), ReadError> {
        tcp.set_read_timeout(Some(self.config.read_write_timeout))?;
        tcp.set_write_timeout(Some(self.config.read_write_timeout))?;

        loop {
            match read_frame(&mut tcp, self.config.max_datastream_len) {
                Ok(frame) => {
                    let reply = self.process_frame(&frame, converter)?;
                    log::trace!("Reply data: {:02x?}", &reply[..]);
                    tcp.write_all(&reply)?;
                }
                Err(ReadError::IoError(err))
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    log::error!("Client read timeout, closing connection");
                    break;
                }
                Err(ReadError::IoError(err))
                    if err.kind() == ErrorKind::UnexpectedEof
                        || err.kind() == ErrorKind::ConnectionAborted
                        || err.kind() == ErrorKind::ConnectionReset =>
                {
                    log::info!("Client disconnected");
                    break;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Decodes one request and returns the encoded reply.
    fn process_frame(
        &self,
        frame: &[u8],
        converter: &dyn CharConverter,
    ) -> Result<Vec<u8>, ReadError> {
        log::trace!("Request data: {:02x?}", frame);
        let request = match Datastream::parse(frame, &self.registry) {
            Ok(request) => request,
            Err(ReadError::UnknownDatastream {
                server_id,
                request_id,
            }) => {
                log::debug!(
                    "Received unknown request 0x{:04X} for server 0x{:04X}",
                    request_id,
                    server_id
                );
                let correlation_id = get_u32(frame, 12);
                return not_supported(server_id, request_id, correlation_id).to_bytes();
            }
            Err(other) => return Err(other),
        };

        match (request.server_id(), request.request_id()) {
            (server::REMOTE_COMMAND, CALL_PROGRAM_REQUEST) => {
                let call = ProgramCall::from_request(&request, converter)?;
                log::debug!(
                    "Received program call {}/{} with {} parameters",
                    call.library,
                    call.program,
                    call.parameters.len()
                );
                let reply = match self
                    .server
                    .call_program(&call.library, &call.program, call.parameters)
                {
                    Ok(parameters) => {
                        call_reply(request.correlation_id(), 0, &parameters, &[], converter)?
                    }
                    Err(messages) => {
                        for message in &messages {
                            log::debug!("{}/{} failed: {}", call.library, call.program, message);
                        }
                        call_reply(
                            request.correlation_id(),
                            return_code::PROGRAM_ERROR as u16,
                            &[],
                            &messages,
                            converter,
                        )?
                    }
                };
                reply.to_bytes()
            }
            (server_id, request_id) => {
                log::debug!(
                    "Request 0x{:04X} for server 0x{:04X} is not served here",
                    request_id,
                    server_id
                );
                not_supported(server_id, request_id, request.correlation_id()).to_bytes()
            }
        }
    }
}

/// Reply with a 2-byte function-not-supported return code.
fn not_supported(server_id: u16, request_id: u16, correlation_id: u32) -> Datastream {
    let code = return_code::FUNCTION_NOT_SUPPORTED as u16;
    let mut reply = Datastream::new(server_id, request_id | REPLY_BIT, code.to_be_bytes().to_vec());
    reply.set_correlation_id(correlation_id);
    reply
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lists::ListHost;
    use hostserver_protocol::ccsid::Ebcdic37;
    use hostserver_protocol::message::decode_message_list;
    use hostserver_protocol::program::{ProgramParameter, parameters};
    use hostserver_protocol::template::{CALL_PROGRAM_REPLY, CP_MESSAGE_LIST};

    fn reply_to(request: &Datastream) -> Datastream {
        let server = Server::new(ListHost::new(), Config::default());
        let reply = server.process_frame(&request.to_bytes().unwrap(), &Ebcdic37).unwrap();
        Datastream::parse(&reply, &DatastreamRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn unknown_request_is_not_supported() {
        let mut request = Datastream::new(server::REMOTE_COMMAND, 0x1099, vec![0; 4]);
        request.set_correlation_id(5);
        let bytes = request.to_bytes().unwrap();
        let server = Server::new(ListHost::new(), Config::default());
        let reply = server.process_frame(&bytes, &Ebcdic37).unwrap();
        // Reply id 0x9099 carrying return code 8
        assert_eq!(&reply[18..20], &[0x90, 0x99]);
        assert_eq!(get_u32(&reply, 12), 5);
        assert_eq!(&reply[20..22], &[0x00, 0x08]);
    }

    #[test]
    fn program_failure_returns_messages() {
        let mut request = ProgramCall::new("QSYS", "NOSUCH", Vec::new())
            .to_request(&Ebcdic37)
            .unwrap();
        request.set_correlation_id(3);
        let reply = reply_to(&request);
        assert_eq!(reply.request_id(), CALL_PROGRAM_REPLY);
        assert_eq!(reply.correlation_id(), 3);
        assert_eq!(reply.template(), &[0x05, 0x00]);
        let messages =
            decode_message_list(reply.code_point(CP_MESSAGE_LIST).unwrap(), &Ebcdic37).unwrap();
        assert_eq!(messages[0].id, "CPF9811");
    }

    #[test]
    fn program_call_is_answered() {
        let request = ProgramCall::new(
            "QGYMOCK",
            "OPNLST",
            vec![
                ProgramParameter::output(64),
                ProgramParameter::input_i32(64),
                ProgramParameter::output(80),
                ProgramParameter::input_i32(4),
                ProgramParameter::input_i32(10),
                ProgramParameter::input_i32(16),
                ProgramParameter::input_i32(0),
                ProgramParameter::input_output(vec![0; 8], 8),
            ],
        )
        .to_request(&Ebcdic37)
        .unwrap();
        let reply = reply_to(&request);
        assert_eq!(reply.template(), &[0, 0]);
        assert_eq!(parameters(&reply).unwrap().len(), 8);
    }

    #[test]
    fn database_request_is_not_supported() {
        let request = hostserver_protocol::database::PrepareDescribe {
            statement_name: "S1".to_string(),
            statement_text: "SELECT 1 FROM SYSIBM.SYSDUMMY1".to_string(),
            ..Default::default()
        }
        .to_request(&Ebcdic37)
        .unwrap();
        let server = Server::new(ListHost::new(), Config::default());
        let reply = server.process_frame(&request.to_bytes().unwrap(), &Ebcdic37).unwrap();
        assert_eq!(&reply[18..22], &[0x98, 0x03, 0x00, 0x08]);
    }
}
