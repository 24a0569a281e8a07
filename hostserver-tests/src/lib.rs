//! Shared fixtures for the end-to-end tests of the host server crates.
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;

use hostserver_client::config::{Builder, Config};
use hostserver_server::{HostServer, lists::ListHost, server};

/// Starts a server for `host` on an ephemeral local port and returns its address.
///
/// The server thread runs until the test process exits.
pub fn spawn_server<T: HostServer + Send + 'static>(host: T) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Binding a local port should work");
    let addr = listener.local_addr().expect("Bound listener has an address");
    let server = server::Builder::new()
        .rw_timeout(Duration::from_secs(5))
        .build(host);
    thread::spawn(move || {
        if let Err(e) = server.listen_on(listener) {
            panic!("Server failed: {}", e);
        }
    });
    addr
}

pub fn spawn_list_server() -> SocketAddr {
    spawn_server(ListHost::new())
}

/// Client configuration that polls quickly and gives up after a few seconds.
pub fn fast_config() -> Config {
    Builder::new()
        .rw_timeout(Duration::from_secs(5))
        .list_poll_interval(Duration::from_millis(10))
        .list_wait_timeout(Duration::from_secs(5))
        .build()
}
