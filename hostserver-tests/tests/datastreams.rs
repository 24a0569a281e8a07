use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use hostserver_client::HostClient;
use hostserver_client::client::ReplyStatus;
use hostserver_client::transport::TcpTransport;
use hostserver_protocol::ccsid::Ebcdic37;
use hostserver_protocol::codec::{DEFAULT_MAX_DATASTREAM_LEN, DatastreamCodec};
use hostserver_protocol::datastream::{Datastream, server};
use hostserver_protocol::message::decode_message_list;
use hostserver_protocol::program::{ProgramCall, ProgramParameter, parameters};
use hostserver_protocol::registry::{DatastreamKind, DatastreamRegistry, ReturnCodeField};
use hostserver_protocol::template::{CALL_PROGRAM_REPLY, CP_MESSAGE_LIST};
use hostserver_tests::{fast_config, spawn_list_server};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

const CUSTOM_REQUEST: u16 = 0x1099;
const CUSTOM_REPLY: u16 = 0x9099;

#[test]
fn unserved_request_is_benign() {
    let addr = spawn_list_server();
    let mut registry = DatastreamRegistry::with_defaults();
    registry.register(
        server::REMOTE_COMMAND,
        CUSTOM_REPLY,
        DatastreamKind::reply("custom reply", 2, &[], ReturnCodeField::U16At(0)),
    );
    let registry = Arc::new(registry);
    let config = fast_config();
    let transport = TcpTransport::connect(addr, registry.clone(), &config).unwrap();
    let mut client = HostClient::new(transport, registry, config).unwrap();

    let reply = client
        .request(Datastream::new(
            server::REMOTE_COMMAND,
            CUSTOM_REQUEST,
            vec![0; 4],
        ))
        .unwrap();
    assert_eq!(reply.status, ReplyStatus::Benign(8));
    assert_eq!(reply.datastream.request_id(), CUSTOM_REPLY);
}

#[tokio::test(flavor = "multi_thread")]
async fn framed_program_calls() {
    let addr = spawn_list_server();
    let tcp = TcpStream::connect(addr).await.unwrap();
    let codec = DatastreamCodec::new(
        Arc::new(DatastreamRegistry::with_defaults()),
        DEFAULT_MAX_DATASTREAM_LEN,
    );
    let mut framed = Framed::new(tcp, codec);

    let mut failing = ProgramCall::new("QSYS", "NOSUCH", Vec::new())
        .to_request(&Ebcdic37)
        .unwrap();
    failing.set_correlation_id(7);
    let mut opening = ProgramCall::new(
        "QGYMOCK",
        "OPNLST",
        vec![
            ProgramParameter::output(32),
            ProgramParameter::input_i32(32),
            ProgramParameter::output(80),
            ProgramParameter::input_i32(2),
            ProgramParameter::input_i32(3),
            ProgramParameter::input_i32(16),
            ProgramParameter::input_i32(0),
            ProgramParameter::input_output(vec![0; 8], 8),
        ],
    )
    .to_request(&Ebcdic37)
    .unwrap();
    opening.set_correlation_id(8);

    framed.send(failing).await.unwrap();
    framed.send(opening).await.unwrap();

    let first = framed.next().await.unwrap().unwrap();
    assert_eq!(first.request_id(), CALL_PROGRAM_REPLY);
    assert_eq!(first.correlation_id(), 7);
    assert_eq!(first.template(), &[0x05, 0x00]);
    let messages =
        decode_message_list(first.code_point(CP_MESSAGE_LIST).unwrap(), &Ebcdic37).unwrap();
    assert_eq!(messages[0].id, "CPF9811");

    let second = framed.next().await.unwrap().unwrap();
    assert_eq!(second.correlation_id(), 8);
    assert_eq!(second.template(), &[0, 0]);
    let returned = parameters(&second).unwrap();
    assert_eq!(returned.len(), 8);
    assert_eq!(returned[0].data.len(), 32);
}
