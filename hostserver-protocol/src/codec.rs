/// Read and write implementations for datastreams
use std::io::{Read, Write};

use crate::binary::get_u32;
use crate::datastream::{Datastream, HEADER_LEN};
use crate::error::ReadError;
use crate::registry::DatastreamRegistry;

/// Upper bound for a single datastream unless configured otherwise.
pub const DEFAULT_MAX_DATASTREAM_LEN: usize = 16 * 1024 * 1024;

/// Checks the total length announced by a header before any payload is read.
fn announced_len(header: &[u8], max_len: usize) -> Result<usize, ReadError> {
    let total = get_u32(header, 0) as usize;
    if total < HEADER_LEN {
        return Err(ReadError::InvalidLength {
            what: "datastream",
            declared: total,
            offset: 0,
            remaining: HEADER_LEN,
        });
    }
    if total > max_len {
        return Err(ReadError::TooLarge {
            max: max_len,
            got: total,
        });
    }
    Ok(total)
}

impl Datastream {
    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), ReadError> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Reads exactly one datastream. Nothing beyond its announced length is consumed.
    pub fn read_from(
        reader: &mut impl Read,
        registry: &DatastreamRegistry,
        max_len: usize,
    ) -> Result<Datastream, ReadError> {
        Datastream::parse(&read_frame(reader, max_len)?, registry)
    }
}

/// Reads the raw bytes of one datastream without decoding them.
pub fn read_frame(reader: &mut impl Read, max_len: usize) -> Result<Vec<u8>, ReadError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let total = announced_len(&header, max_len)?;
    let mut buf = vec![0u8; total];
    buf[..HEADER_LEN].copy_from_slice(&header);
    reader.read_exact(&mut buf[HEADER_LEN..])?;
    Ok(buf)
}

#[cfg(feature = "tokio")]
pub use framed::DatastreamCodec;

#[cfg(feature = "tokio")]
mod framed {
    use std::sync::Arc;

    use bytes::{Buf, BufMut, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::announced_len;
    use crate::datastream::{Datastream, HEADER_LEN};
    use crate::error::ReadError;
    use crate::registry::DatastreamRegistry;

    /// Frames datastreams on an async byte stream.
    #[derive(Clone, Debug)]
    pub struct DatastreamCodec {
        registry: Arc<DatastreamRegistry>,
        max_len: usize,
    }

    impl DatastreamCodec {
        pub fn new(registry: Arc<DatastreamRegistry>, max_len: usize) -> DatastreamCodec {
            DatastreamCodec { registry, max_len }
        }
    }

    impl Decoder for DatastreamCodec {
        type Item = Datastream;
        type Error = ReadError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Datastream>, ReadError> {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let total = announced_len(&src[..HEADER_LEN], self.max_len)?;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }
            let frame = src.split_to(total);
            Datastream::parse(frame.chunk(), &self.registry).map(Some)
        }
    }

    impl Encoder<Datastream> for DatastreamCodec {
        type Error = ReadError;

        fn encode(&mut self, item: Datastream, dst: &mut BytesMut) -> Result<(), ReadError> {
            let len = item.len();
            if len > self.max_len {
                return Err(ReadError::TooLarge {
                    max: self.max_len,
                    got: len,
                });
            }
            dst.reserve(len);
            dst.put_slice(&item.to_bytes()?);
            Ok(())
        }
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datastream::server;
    use crate::template::{CALL_PROGRAM_REPLY, CP_MESSAGE_LIST};
    use std::io::Cursor;

    #[test]
    fn read_consecutive_datastreams() {
        let registry = DatastreamRegistry::with_defaults();
        let mut first = Datastream::new(server::REMOTE_COMMAND, CALL_PROGRAM_REPLY, vec![0, 0]);
        first.set_correlation_id(1);
        let mut second = Datastream::new(server::REMOTE_COMMAND, CALL_PROGRAM_REPLY, vec![0, 6]);
        second.set_correlation_id(2);
        second.add(CP_MESSAGE_LIST, vec![0xAB; 3]);

        let mut out = Vec::new();
        first.write_to(&mut out).unwrap();
        second.write_to(&mut out).unwrap();

        let mut cursor = Cursor::new(out);
        let a = Datastream::read_from(&mut cursor, &registry, DEFAULT_MAX_DATASTREAM_LEN).unwrap();
        let b = Datastream::read_from(&mut cursor, &registry, DEFAULT_MAX_DATASTREAM_LEN).unwrap();
        assert_eq!(a.correlation_id(), 1);
        assert_eq!(b.correlation_id(), 2);
        assert_eq!(b.code_point(CP_MESSAGE_LIST).unwrap().data(), &[0xAB; 3]);
    }

    #[test]
    fn announced_length_too_large() {
        let ds = Datastream::new(server::REMOTE_COMMAND, CALL_PROGRAM_REPLY, vec![0, 0]);
        let mut cursor = Cursor::new(ds.to_bytes().unwrap());
        match Datastream::read_from(&mut cursor, &DatastreamRegistry::with_defaults(), 21) {
            Err(ReadError::TooLarge { max, got }) => {
                assert_eq!(max, 21);
                assert_eq!(got, 22);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn announced_length_below_header() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[3] = 12;
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            Datastream::read_from(&mut cursor, &DatastreamRegistry::with_defaults(), 1024),
            Err(ReadError::InvalidLength { declared: 12, .. })
        ));
    }

    #[test]
    fn truncated_stream() {
        let ds = Datastream::new(server::REMOTE_COMMAND, CALL_PROGRAM_REPLY, vec![0, 0]);
        let bytes = ds.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes[..bytes.len() - 1].to_vec());
        assert!(matches!(
            Datastream::read_from(&mut cursor, &DatastreamRegistry::with_defaults(), 1024),
            Err(ReadError::IoError(_))
        ));
    }
}
