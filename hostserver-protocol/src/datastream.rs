use std::collections::BTreeMap;

use crate::binary::{ensure, get_u16, get_u32, put_u16, put_u32};
use crate::codepoint::{CodePoint, CodePointChain};
use crate::error::ReadError;
use crate::registry::DatastreamRegistry;

/// Length of the header in front of every datastream.
pub const HEADER_LEN: usize = 20;

/// Server ids of the host servers.
pub mod server {
    pub const CENTRAL: u16 = 0xE000;
    pub const FILE: u16 = 0xE002;
    pub const NETWORK_PRINT: u16 = 0xE003;
    pub const DATABASE: u16 = 0xE004;
    pub const DATA_QUEUE: u16 = 0xE007;
    pub const REMOTE_COMMAND: u16 = 0xE008;
    pub const SIGNON: u16 = 0xE009;
}

/// Fixed header fields of a datastream.
/// The total length and the template length are derived from the content and therefore absent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    pub header_id: u16,
    pub server_id: u16,
    pub cs_instance: u32,
    pub correlation_id: u32,
    pub request_id: u16,
}

/// A request or reply: header, fixed template and a set of code points.
///
/// Code points are keyed by id. Serialization emits them in ascending id order and leaves out
/// the ones without payload, so a code point set with empty data is absent after a round trip.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Datastream {
    header: Header,
    template: Vec<u8>,
    code_points: BTreeMap<u16, CodePoint>,
    unknown: Vec<CodePoint>,
}

impl Datastream {
    pub fn new(server_id: u16, request_id: u16, template: impl Into<Vec<u8>>) -> Datastream {
        Datastream {
            header: Header {
                server_id,
                request_id,
                ..Header::default()
            },
            template: template.into(),
            code_points: BTreeMap::new(),
            unknown: Vec::new(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn server_id(&self) -> u16 {
        self.header.server_id
    }

    pub fn request_id(&self) -> u16 {
        self.header.request_id
    }

    pub fn correlation_id(&self) -> u32 {
        self.header.correlation_id
    }

    pub fn set_correlation_id(&mut self, correlation_id: u32) {
        self.header.correlation_id = correlation_id;
    }

    pub fn template(&self) -> &[u8] {
        &self.template
    }

    pub fn template_mut(&mut self) -> &mut [u8] {
        &mut self.template
    }

    /// Adds a code point, replacing one with the same id.
    pub fn set_code_point(&mut self, code_point: CodePoint) {
        self.code_points.insert(code_point.id(), code_point);
    }

    pub fn add(&mut self, id: u16, data: impl Into<Vec<u8>>) {
        self.set_code_point(CodePoint::new(id, data));
    }

    pub fn code_point(&self, id: u16) -> Option<&CodePoint> {
        self.code_points.get(&id)
    }

    pub fn remove_code_point(&mut self, id: u16) -> Option<CodePoint> {
        self.code_points.remove(&id)
    }

    /// Registered code points in ascending id order.
    pub fn code_points(&self) -> impl Iterator<Item = &CodePoint> {
        self.code_points.values()
    }

    /// Code points that were read but are not registered for this datastream kind.
    pub fn unknown_code_points(&self) -> &[CodePoint] {
        &self.unknown
    }

    /// Serialized length: header, template and every code point that has a payload.
    pub fn len(&self) -> usize {
        HEADER_LEN
            + self.template.len()
            + self
                .code_points
                .values()
                .filter(|cp| !cp.is_empty())
                .map(CodePoint::length)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty() && self.code_points.values().all(CodePoint::is_empty)
    }

    /// Serializes header, template and code points.
    ///
    /// Fails if the template does not fit the 16-bit template length or the datastream does not
    /// fit the 32-bit total length.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReadError> {
        let template_len = u16::try_from(self.template.len()).map_err(|_| {
            ReadError::InvalidFormat(format!(
                "Template of {} bytes exceeds the maximum of {}",
                self.template.len(),
                u16::MAX
            ))
        })?;
        let len = self.len();
        let total = u32::try_from(len).map_err(|_| ReadError::TooLarge {
            max: u32::MAX as usize,
            got: len,
        })?;
        let mut buf = vec![0u8; len];
        put_u32(&mut buf, 0, total);
        put_u16(&mut buf, 4, self.header.header_id);
        put_u16(&mut buf, 6, self.header.server_id);
        put_u32(&mut buf, 8, self.header.cs_instance);
        put_u32(&mut buf, 12, self.header.correlation_id);
        put_u16(&mut buf, 16, template_len);
        put_u16(&mut buf, 18, self.header.request_id);
        buf[HEADER_LEN..HEADER_LEN + self.template.len()].copy_from_slice(&self.template);

        let mut offset = HEADER_LEN + self.template.len();
        for cp in self.code_points.values().filter(|cp| !cp.is_empty()) {
            offset = cp.write_into(&mut buf, offset);
        }
        Ok(buf)
    }

    /// Decodes a complete datastream. `buf` must hold exactly the declared total length.
    pub fn parse(buf: &[u8], registry: &DatastreamRegistry) -> Result<Datastream, ReadError> {
        ensure(buf, 0, HEADER_LEN, "datastream header")?;
        let total = get_u32(buf, 0) as usize;
        if total != buf.len() {
            return Err(ReadError::InvalidLength {
                what: "datastream",
                declared: total,
                offset: 0,
                remaining: buf.len(),
            });
        }
        let header = Header {
            header_id: get_u16(buf, 4),
            server_id: get_u16(buf, 6),
            cs_instance: get_u32(buf, 8),
            correlation_id: get_u32(buf, 12),
            request_id: get_u16(buf, 18),
        };
        let template_len = get_u16(buf, 16) as usize;
        let kind = registry.lookup(header.server_id, header.request_id)?;
        if template_len < kind.template_len || HEADER_LEN + template_len > total {
            return Err(ReadError::InvalidLength {
                what: "template",
                declared: template_len,
                offset: 16,
                remaining: total - HEADER_LEN,
            });
        }

        let body = HEADER_LEN + template_len;
        let mut ds = Datastream {
            header,
            template: buf[HEADER_LEN..body].to_vec(),
            code_points: BTreeMap::new(),
            unknown: Vec::new(),
        };
        for cp in CodePointChain::within(buf, body, total - body) {
            let cp = cp?.to_code_point();
            if kind.knows(cp.id()) {
                if let Some(previous) = ds.code_points.insert(cp.id(), cp) {
                    log::debug!(
                        "Code point 0x{:04X} repeated in {}, keeping the last one",
                        previous.id(),
                        kind.name
                    );
                }
            } else {
                log::debug!(
                    "Unknown code point 0x{:04X} ({} bytes) in {}",
                    cp.id(),
                    cp.length(),
                    kind.name
                );
                ds.unknown.push(cp);
            }
        }
        Ok(ds)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::DatastreamKind;

    const TEST_SERVER: u16 = 0xE0FF;
    const TEST_REQUEST: u16 = 0x0042;

    fn registry() -> DatastreamRegistry {
        let mut registry = DatastreamRegistry::new();
        registry.register(
            TEST_SERVER,
            TEST_REQUEST,
            DatastreamKind::request("test", 4, &[0x0001, 0x0002, 0x0003]),
        );
        registry
    }

    #[test]
    fn empty_code_point_is_omitted() {
        let mut ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0xAA, 0xBB, 0xCC, 0xDD]);
        ds.add(0x0001, vec![1, 2, 3, 4]);
        ds.add(0x0002, Vec::new());
        ds.add(0x0003, vec![9; 10]);

        let bytes = ds.to_bytes().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 4 + (6 + 4) + (6 + 10));
        assert_eq!(get_u32(&bytes, 0) as usize, bytes.len());
        assert_eq!(get_u16(&bytes, 16), 4);
        // Only two code points follow the template
        let ids: Vec<u16> = CodePointChain::within(&bytes, 24, bytes.len() - 24)
            .map(|cp| cp.unwrap().id)
            .collect();
        assert_eq!(ids, vec![0x0001, 0x0003]);
    }

    #[test]
    fn written_in_ascending_id_order() {
        let mut ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; 4]);
        ds.add(0x0003, vec![3]);
        ds.add(0x0001, vec![1]);
        ds.add(0x0002, vec![2]);
        let bytes = ds.to_bytes().unwrap();
        assert_eq!(&bytes[24..31], &[0, 0, 0, 7, 0x00, 0x01, 1]);
        assert_eq!(&bytes[31..38], &[0, 0, 0, 7, 0x00, 0x02, 2]);
        assert_eq!(&bytes[38..45], &[0, 0, 0, 7, 0x00, 0x03, 3]);
    }

    #[test]
    fn parse_restores_header_and_code_points() {
        let mut ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![1, 2, 3, 4]);
        ds.set_correlation_id(77);
        ds.header_mut().cs_instance = 5;
        ds.add(0x0002, b"payload".to_vec());
        ds.add(0x0001, Vec::new());

        let parsed = Datastream::parse(&ds.to_bytes().unwrap(), &registry()).unwrap();
        assert_eq!(parsed.correlation_id(), 77);
        assert_eq!(parsed.header().cs_instance, 5);
        assert_eq!(parsed.template(), &[1, 2, 3, 4]);
        assert_eq!(parsed.code_point(0x0002).unwrap().data(), b"payload");
        assert!(parsed.code_point(0x0001).is_none());
        assert!(parsed.unknown_code_points().is_empty());
    }

    #[test]
    fn no_code_points() {
        let ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; 4]);
        let parsed = Datastream::parse(&ds.to_bytes().unwrap(), &registry()).unwrap();
        assert_eq!(parsed, ds);
        assert_eq!(parsed.code_points().count(), 0);
    }

    #[test]
    fn unknown_code_points_are_kept_aside() {
        let mut ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; 4]);
        ds.add(0x0001, vec![1]);
        ds.add(0x7777, vec![7, 7]);
        let parsed = Datastream::parse(&ds.to_bytes().unwrap(), &registry()).unwrap();
        assert_eq!(parsed.code_points().count(), 1);
        assert_eq!(
            parsed.unknown_code_points(),
            &[CodePoint::new(0x7777, vec![7, 7])]
        );
    }

    #[test]
    fn short_code_point_is_fatal() {
        let mut ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; 4]);
        ds.add(0x0001, vec![1, 2, 3]);
        let mut bytes = ds.to_bytes().unwrap();
        // Claim more payload than the datastream holds
        put_u32(&mut bytes, 24, 12);
        assert!(matches!(
            Datastream::parse(&bytes, &registry()),
            Err(ReadError::InvalidLength {
                what: "code point",
                declared: 12,
                ..
            })
        ));
    }

    #[test]
    fn declared_length_must_match_buffer() {
        let ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; 4]);
        let mut bytes = ds.to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            Datastream::parse(&bytes, &registry()),
            Err(ReadError::InvalidLength {
                what: "datastream",
                ..
            })
        ));
    }

    #[test]
    fn unregistered_kind_is_rejected() {
        let ds = Datastream::new(TEST_SERVER, 0x0043, vec![0; 4]);
        assert!(matches!(
            Datastream::parse(&ds.to_bytes().unwrap(), &registry()),
            Err(ReadError::UnknownDatastream {
                request_id: 0x0043,
                ..
            })
        ));
    }

    #[test]
    fn template_shorter_than_registered() {
        let ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; 2]);
        assert!(matches!(
            Datastream::parse(&ds.to_bytes().unwrap(), &registry()),
            Err(ReadError::InvalidLength {
                what: "template",
                ..
            })
        ));
    }

    #[test]
    fn oversized_template_is_rejected() {
        let ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; u16::MAX as usize + 1]);
        assert!(matches!(ds.to_bytes(), Err(ReadError::InvalidFormat(_))));
        let ds = Datastream::new(TEST_SERVER, TEST_REQUEST, vec![0; u16::MAX as usize]);
        let bytes = ds.to_bytes().unwrap();
        assert_eq!(get_u16(&bytes, 16), u16::MAX);
    }
}
