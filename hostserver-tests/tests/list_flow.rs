use hostserver_client::HostClient;
use hostserver_client::client::ReplyStatus;
use hostserver_client::error::HostError;
use hostserver_client::list::{self, GrowthLimits, ListRpc, ThreadPause, WaitOptions};
use hostserver_protocol::binary::get_u32;
use hostserver_protocol::list_info::{LIST_INFORMATION_LEN, ListInformation, ListStatus};
use hostserver_protocol::program::ProgramParameter;
use hostserver_server::lists::{MOCK_LIBRARY, OPEN_LIST, open_list};
use hostserver_tests::{fast_config, spawn_list_server};

const RECORD_LENGTH: i32 = 16;

fn open(
    client: &mut HostClient<hostserver_client::transport::TcpTransport>,
    total: i32,
    build_steps: i32,
) -> ListInformation {
    let output = client
        .call_program(
            MOCK_LIBRARY,
            OPEN_LIST,
            vec![
                ProgramParameter::output(0),
                ProgramParameter::input_i32(0),
                ProgramParameter::output(LIST_INFORMATION_LEN as u32),
                ProgramParameter::input_i32(0),
                ProgramParameter::input_i32(total),
                ProgramParameter::input_i32(RECORD_LENGTH),
                ProgramParameter::input_i32(build_steps),
                ProgramParameter::input_output(vec![0; 8], 8),
            ],
        )
        .unwrap();
    assert_eq!(output.status, ReplyStatus::Ok);
    ListInformation::parse(&output.parameter(open_list::LIST_INFORMATION).unwrap().data).unwrap()
}

#[test]
fn open_wait_retrieve_close() {
    let addr = spawn_list_server();
    let mut client = HostClient::connect(addr, fast_config()).unwrap();

    let info = open(&mut client, 50, 3);
    assert_eq!(info.status, ListStatus::Pending);
    let handle = info.handle;

    let options = WaitOptions::from(client.config());
    let mut pause = ThreadPause::default();
    let info = list::wait_for_list_to_complete(&mut client, &handle, info, &options, &mut pause)
        .unwrap();
    assert_eq!(info.status, ListStatus::Complete);
    assert_eq!(info.total_records, 50);

    // Four records fit at first, the receiver has to grow twice
    let limits = GrowthLimits::from(client.config());
    let page = list::retrieve_list_entries(&mut client, &handle, 0, 50, 64, &limits).unwrap();
    assert_eq!(page.info.records_returned, 50);
    let numbers: Vec<u32> = page.records().map(|r| get_u32(r, 0)).collect();
    assert_eq!(numbers, (1..=50).collect::<Vec<u32>>());

    let mut open_handle = Some(handle);
    list::close_list(&mut client, &mut open_handle).unwrap();
    assert!(open_handle.is_none());
    list::close_list(&mut client, &mut open_handle).unwrap();

    match client.refresh_list_information(&handle) {
        Err(HostError::Server {
            return_code,
            messages,
        }) => {
            assert_eq!(return_code, 0x0500);
            assert_eq!(messages[0].id, "GUI0002");
        }
        other => panic!("expected a server error, got {:?}", other.map(|i| i.status)),
    }
}

#[test]
fn page_through_list() {
    let addr = spawn_list_server();
    let mut client = HostClient::connect(addr, fast_config()).unwrap();
    let info = open(&mut client, 25, 0);
    assert_eq!(info.status, ListStatus::Complete);
    let limits = GrowthLimits::from(client.config());

    let mut seen = Vec::new();
    let mut offset = 0;
    while offset < info.total_records {
        let page =
            list::retrieve_list_entries(&mut client, &info.handle, offset, 10, 160, &limits)
                .unwrap();
        assert_eq!(page.info.first_record, offset + 1);
        seen.extend(page.records().map(|r| get_u32(r, 0)));
        offset += page.info.records_returned;
    }
    assert_eq!(seen.len(), 25);
    assert_eq!(seen.last(), Some(&25));
    list::close_list(&mut client, &mut Some(info.handle)).unwrap();
}

#[test]
fn unknown_program_carries_messages() {
    let addr = spawn_list_server();
    let mut client = HostClient::connect(addr, fast_config()).unwrap();
    match client.call_program("QSYS", "NOSUCH", Vec::new()) {
        Err(HostError::Server { messages, .. }) => {
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].id, "CPF9811");
            assert!(messages[0].text.contains("NOSUCH"));
        }
        other => panic!("expected a server error, got {:?}", other.map(|o| o.status)),
    }
    // The connection stays usable after a failed call
    let info = open(&mut client, 1, 0);
    assert_eq!(info.total_records, 1);
}
