use std::{
    collections::{HashMap, HashSet},
    io::Write,
    net::{TcpStream, ToSocketAddrs},
    sync::Arc,
};

use hostserver_protocol::codec::DEFAULT_MAX_DATASTREAM_LEN;
use hostserver_protocol::datastream::Datastream;
use hostserver_protocol::registry::DatastreamRegistry;

use crate::config::Config;
use crate::error::HostError;

/// A request/reply channel to one host server.
pub trait Transport {
    /// Assigns the next correlation id to `request` and sends it. Returns the id.
    fn send(&mut self, request: &mut Datastream) -> Result<u32, HostError>;

    /// Waits for the reply carrying `correlation_id`.
    fn receive(&mut self, correlation_id: u32) -> Result<Datastream, HostError>;

    fn send_and_receive(&mut self, request: &mut Datastream) -> Result<Datastream, HostError> {
        let correlation_id = self.send(request)?;
        self.receive(correlation_id)
    }
}

/// Blocking transport over a TCP connection.
///
/// Replies that arrive for another outstanding correlation id than the one asked for are kept
/// until they are received. Replies for ids that are not outstanding are dropped.
pub struct TcpTransport {
    tcp: TcpStream,
    registry: Arc<DatastreamRegistry>,
    max_len: usize,
    last_correlation_id: u32,
    /// Sent requests whose reply has not been received yet.
    outstanding: HashSet<u32>,
    pending: HashMap<u32, Datastream>,
}

impl TcpTransport {
    pub fn connect(
        addr: impl ToSocketAddrs,
        registry: Arc<DatastreamRegistry>,
        config: &Config,
    ) -> Result<TcpTransport, HostError> {
        let tcp = TcpStream::connect(addr)?;
        tcp.set_read_timeout(Some(config.read_write_timeout))?;
        tcp.set_write_timeout(Some(config.read_write_timeout))?;
        tcp.set_nodelay(true)?;
        Ok(TcpTransport::new(tcp, registry))
    }

    pub fn new(tcp: TcpStream, registry: Arc<DatastreamRegistry>) -> TcpTransport {
        TcpTransport {
            tcp,
            registry,
            max_len: DEFAULT_MAX_DATASTREAM_LEN,
            last_correlation_id: 0,
            outstanding: HashSet::new(),
            pending: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<DatastreamRegistry> {
        &self.registry
    }

    fn next_correlation_id(&mut self) -> u32 {
        // Zero is never used so that an unset id stands out
        self.last_correlation_id = self.last_correlation_id.checked_add(1).unwrap_or(1);
        self.last_correlation_id
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, request: &mut Datastream) -> Result<u32, HostError> {
        let correlation_id = self.next_correlation_id();
        request.set_correlation_id(correlation_id);
        log::debug!(
            "Sending request 0x{:04X} to server 0x{:04X} with correlation id {}",
            request.request_id(),
            request.server_id(),
            correlation_id
        );
        let bytes = request.to_bytes()?;
        log::trace!("Request data: {:02x?}", &bytes[..]);
        self.tcp.write_all(&bytes)?;
        self.outstanding.insert(correlation_id);
        Ok(correlation_id)
    }

    fn receive(&mut self, correlation_id: u32) -> Result<Datastream, HostError> {
        if let Some(reply) = self.pending.remove(&correlation_id) {
            self.outstanding.remove(&correlation_id);
            return Ok(reply);
        }
        loop {
            let reply = match Datastream::read_from(&mut self.tcp, &self.registry, self.max_len) {
                Ok(reply) => reply,
                Err(e) => {
                    // A late reply for this id is dropped once it shows up
                    self.outstanding.remove(&correlation_id);
                    return Err(e.into());
                }
            };
            log::debug!(
                "Received reply 0x{:04X} with correlation id {}",
                reply.request_id(),
                reply.correlation_id()
            );
            if reply.correlation_id() == correlation_id {
                self.outstanding.remove(&correlation_id);
                return Ok(reply);
            }
            if self.outstanding.contains(&reply.correlation_id()) {
                self.pending.insert(reply.correlation_id(), reply);
            } else {
                log::warn!(
                    "Dropping reply 0x{:04X} for correlation id {} that is not outstanding",
                    reply.request_id(),
                    reply.correlation_id()
                );
            }
        }
    }
}
