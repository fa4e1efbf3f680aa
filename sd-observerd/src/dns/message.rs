use std::net::{Ipv4Addr, Ipv6Addr};
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use crate::error::DecodeError;

/// A decoded DNS message, detached from the packet buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsMessage {
    pub is_response: bool,
    pub questions: Vec<Question>,

    /// Answer, additional and authority records, in that order. DNS-SD
    /// (RFC 6763 section 12) puts useful records in all three.
    pub records: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub is_ptr: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Owner name
    pub name: String,
    pub data: RecordData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    Ptr(String),
    Srv { target: String, port: u16 },
    Txt(Vec<String>),
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    /// Any other record type
    Other,
}

impl RecordData {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordData::Ptr(_) => "PTR",
            RecordData::Srv { .. } => "SRV",
            RecordData::Txt(_) => "TXT",
            RecordData::A(_) => "A",
            RecordData::Aaaa(_) => "AAAA",
            RecordData::Other => "other",
        }
    }
}

/// Decode a UDP payload into a DNS message. Only structural validity is
/// checked: labels may carry any bytes and unknown record types decode to
/// [`RecordData::Other`].
pub fn decode(payload: &[u8]) -> Result<DnsMessage, DecodeError> {
    let message = Message::from_vec(payload)?;

    let questions = message
        .queries()
        .iter()
        .map(|q| Question {
            name: name_to_string(q.name()),
            is_ptr: q.query_type() == RecordType::PTR,
        })
        .collect();

    let records = message
        .answers()
        .iter()
        .chain(message.additionals())
        .chain(message.name_servers())
        .map(convert_record)
        .collect();

    Ok(DnsMessage {
        is_response: message.message_type() == MessageType::Response,
        questions,
        records,
    })
}

/// Labels joined with '.', without the root. Non UTF-8 bytes are replaced.
fn name_to_string(name: &Name) -> String {
    name.iter()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(".")
}

fn convert_record(record: &Record) -> ResourceRecord {
    let data = match record.data() {
        Some(RData::PTR(ptr)) => RecordData::Ptr(name_to_string(&ptr.0)),
        Some(RData::SRV(srv)) => RecordData::Srv {
            target: name_to_string(srv.target()),
            port: srv.port(),
        },
        Some(RData::TXT(txt)) => RecordData::Txt(
            txt.txt_data()
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
        ),
        Some(RData::A(a)) => RecordData::A(a.0),
        Some(RData::AAAA(aaaa)) => RecordData::Aaaa(aaaa.0),
        _ => RecordData::Other,
    };

    ResourceRecord {
        name: name_to_string(record.name()),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::PacketBuilder;

    #[test]
    fn test_decode_all_sections() {
        let payload = PacketBuilder::response()
            .ptr("_airplay._tcp.local", "Living Room._airplay._tcp.local")
            .additional_srv("Living Room._airplay._tcp.local", "livingroom.local", 7000)
            .authority_a("livingroom.local", Ipv4Addr::new(10, 0, 0, 5))
            .build();

        let msg = decode(&payload).unwrap();
        assert!(msg.is_response);
        assert_eq!(msg.records.len(), 3);
        assert_eq!(
            msg.records[0],
            ResourceRecord {
                name: "_airplay._tcp.local".to_string(),
                data: RecordData::Ptr("Living Room._airplay._tcp.local".to_string()),
            }
        );
        assert_eq!(
            msg.records[1].data,
            RecordData::Srv { target: "livingroom.local".to_string(), port: 7000 }
        );
        assert_eq!(msg.records[2].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 5)));
    }

    #[test]
    fn test_decode_txt_and_aaaa() {
        let addr: Ipv6Addr = "fe80::1".parse().unwrap();
        let payload = PacketBuilder::response()
            .txt("tv._googlecast._tcp.local", &["id=abc", "md=Chromecast"])
            .aaaa("tv.local", addr)
            .build();

        let msg = decode(&payload).unwrap();
        assert_eq!(
            msg.records[0].data,
            RecordData::Txt(vec!["id=abc".to_string(), "md=Chromecast".to_string()])
        );
        assert_eq!(msg.records[1].data, RecordData::Aaaa(addr));
    }

    #[test]
    fn test_decode_question() {
        let payload = PacketBuilder::query()
            .question_ptr("_googlecast._tcp.local")
            .build();

        let msg = decode(&payload).unwrap();
        assert!(!msg.is_response);
        assert_eq!(
            msg.questions,
            vec![Question { name: "_googlecast._tcp.local".to_string(), is_ptr: true }]
        );
        assert!(msg.records.is_empty());
    }

    #[test]
    fn test_decode_utf8_labels() {
        let payload = PacketBuilder::response()
            .ptr("_airplay._tcp.local", "Sam\u{2019}s iPhone._airplay._tcp.local")
            .srv("Sam\u{2019}s iPhone._airplay._tcp.local", "Sams-iPhone.local", 7000)
            .build();

        let msg = decode(&payload).unwrap();
        assert_eq!(
            msg.records[0].data,
            RecordData::Ptr("Sam\u{2019}s iPhone._airplay._tcp.local".to_string())
        );
        assert_eq!(msg.records[1].name, "Sam\u{2019}s iPhone._airplay._tcp.local");
    }

    #[test]
    fn test_decode_unknown_type_is_other() {
        let payload = PacketBuilder::response()
            .record("nas.local", 65280, &[0xde, 0xad, 0xbe, 0xef])
            .a("nas.local", Ipv4Addr::new(10, 0, 0, 2))
            .build();

        let msg = decode(&payload).unwrap();
        assert_eq!(msg.records.len(), 2);
        assert_eq!(msg.records[0].data, RecordData::Other);
        assert_eq!(msg.records[1].data, RecordData::A(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_decode_https_record_is_other() {
        // SvcPriority 1, TargetName "."
        let payload = PacketBuilder::response()
            .record("nas.local", 65, &[0x00, 0x01, 0x00])
            .build();

        let msg = decode(&payload).unwrap();
        assert_eq!(msg.records[0].data, RecordData::Other);
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let payload = PacketBuilder::response()
            .ptr("_airplay._tcp.local", "Living Room._airplay._tcp.local")
            .build();

        assert!(decode(&payload[..payload.len() - 4]).is_err());
        assert!(decode(&[0x00, 0x01, 0x02]).is_err());
    }
}
