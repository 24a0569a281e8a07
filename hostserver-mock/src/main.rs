//! # Emulated IBM i Remote Command Server
//!
//! Stand-alone server answering program calls the way the remote command host server does,
//! backed by [`hostserver_server::lists::ListHost`]. Clients open synthetic lists with
//! `QGYMOCK/OPNLST` and read them through the regular open list APIs.
use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use hostserver_protocol::ccsid::{CCSID_EBCDIC_37, converter_for};
use hostserver_protocol::codec::DEFAULT_MAX_DATASTREAM_LEN;
use hostserver_server::{lists::ListHost, server::Builder};

#[derive(Parser)]
#[command(about = "Emulated IBM i remote command server serving synthetic lists", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "8475")]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[arg(long, help = "CCSID of object names and message texts", default_value_t = CCSID_EBCDIC_37)]
    host_ccsid: u16,

    #[arg(
        short,
        long,
        help = "The socket read and write timeout in seconds",
        default_value = "30"
    )]
    timeout_secs: u64,

    #[arg(long, help = "Largest accepted request in bytes", default_value_t = DEFAULT_MAX_DATASTREAM_LEN)]
    max_datastream_len: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting emulated host server");

    let args = Args::parse();
    log::debug!("Parsed arguments: ip={}, port={}", args.ip, args.port);

    if let Err(e) = converter_for(args.host_ccsid) {
        println!("CCSID {} is not supported: {}", args.host_ccsid, e);
        return Ok(());
    }

    let server = Builder::new()
        .host_ccsid(args.host_ccsid)
        .rw_timeout(Duration::from_secs(args.timeout_secs))
        .max_datastream_len(args.max_datastream_len)
        .build(ListHost::new());
    log::debug!(
        "Server config: max_datastream_len={}, host_ccsid={}",
        server.config().max_datastream_len,
        server.config().host_ccsid
    );

    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);
    server.listen(addr)?;
    Ok(())
}
