//! Datastream encoding and decoding benchmarks

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hostserver_protocol::ccsid::{CCSID_EBCDIC_37, CharConverter, Ebcdic37};
use hostserver_protocol::datastream::Datastream;
use hostserver_protocol::format::{CP_FIELD_NAME, FormatBuilder, find_code_point, name_entry};
use hostserver_protocol::program::{ProgramCall, ProgramParameter};
use hostserver_protocol::registry::DatastreamRegistry;
use std::hint::black_box;

fn program_call(receiver_len: u32) -> Datastream {
    ProgramCall::new(
        "QSYS",
        "QGYGTLE",
        vec![
            ProgramParameter::output(receiver_len),
            ProgramParameter::input_i32(receiver_len as i32),
            ProgramParameter::input(vec![0, 0, 0, 1]),
            ProgramParameter::output(80),
            ProgramParameter::input_i32(100),
            ProgramParameter::input_i32(1),
            ProgramParameter::input_output(vec![0; 8], 8),
        ],
    )
    .to_request(&Ebcdic37)
    .expect("request should encode")
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("datastream_encode");
    for receiver_len in [64u32, 4096, 65536] {
        let ds = program_call(receiver_len);
        group.bench_with_input(
            BenchmarkId::new("program_call", receiver_len),
            &ds,
            |b, ds| b.iter(|| black_box(ds.to_bytes())),
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let registry = DatastreamRegistry::with_defaults();
    let bytes = program_call(4096)
        .to_bytes()
        .expect("request should serialize");
    c.bench_function("datastream_decode/program_call", |b| {
        b.iter(|| Datastream::parse(black_box(&bytes), &registry))
    });
}

fn bench_find_code_point(c: &mut Criterion) {
    let mut builder = FormatBuilder::new(1);
    for column in 0..64 {
        let bytes = Ebcdic37
            .to_bytes(&format!("COLUMN{:02}", column))
            .expect("column name should encode");
        builder = builder.field(
            452,
            10,
            10,
            0,
            CCSID_EBCDIC_37,
            vec![name_entry(CP_FIELD_NAME, CCSID_EBCDIC_37, &bytes)],
        );
    }
    let format = builder.build();
    // Scan all variable areas for a label none of them has
    let areas = 16 + 64 * 48;
    c.bench_function("find_code_point/64_columns", |b| {
        b.iter(|| find_code_point(black_box(&format), areas, format.len() - areas, 0x3844))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_find_code_point);
criterion_main!(benches);
