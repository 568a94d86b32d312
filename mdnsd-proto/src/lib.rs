pub mod buffer;
pub mod packet;

#[cfg(test)]
mod tests {
    use crate::buffer::BytePacketBuffer;
    use crate::packet::header::Header;
    use crate::packet::question::{Class, Question};
    use crate::packet::record::{Record, TxtData};
    use crate::packet::{DnsPacket, OutgoingMessage, RecordType};
    use similar_asserts::assert_eq;
    use std::net::Ipv4Addr;

    #[test]
    fn should_round_trip_a_full_query_message() {
        let mut message = OutgoingMessage::query(0);
        message.add_question(
            Question::new("_http._tcp.local".to_string(), RecordType::Ptr).unicast(),
        );

        let mut packet = message.packet();
        let buffer = packet.create_buffer().unwrap();

        let decoded = DnsPacket::try_from(buffer).unwrap();
        assert!(decoded.is_query());
        assert_eq!(decoded.questions.len(), 1);
        assert_eq!(decoded.questions[0].name, "_http._tcp.local");
        assert_eq!(decoded.questions[0].qtype, RecordType::Ptr);
        assert!(decoded.questions[0].qclass.unicast_requested());
    }

    #[test]
    fn should_round_trip_a_full_response_message_with_mixed_record_types() {
        let mut message = OutgoingMessage::response();
        message
            .add_answer(Record::Ptr {
                domain: "_http._tcp.local".to_string(),
                class: Class::IN,
                target: "My Printer._http._tcp.local".to_string(),
                ttl: 4500,
            })
            .add_additional_answer(Record::Srv {
                domain: "My Printer._http._tcp.local".to_string(),
                class: Class::IN.flagged(),
                priority: 0,
                weight: 0,
                port: 8080,
                target: "host.local".to_string(),
                ttl: 120,
            })
            .add_additional_answer(Record::Txt {
                domain: "My Printer._http._tcp.local".to_string(),
                class: Class::IN.flagged(),
                data: TxtData::from_pairs([("path", "/")]),
                ttl: 4500,
            })
            .add_additional_answer(Record::A {
                domain: "host.local".to_string(),
                class: Class::IN.flagged(),
                addr: Ipv4Addr::new(192, 168, 1, 42),
                ttl: 120,
            });

        let mut packet = message.packet();
        let buffer = packet.create_buffer().unwrap();

        let decoded = DnsPacket::try_from(buffer).unwrap();
        assert!(decoded.is_response());
        assert_eq!(decoded.answers.len(), 1);
        assert_eq!(decoded.resources.len(), 3);
        assert!(matches!(decoded.answers[0], Record::Ptr { .. }));
        assert!(matches!(decoded.resources[0], Record::Srv { .. }));
        assert!(matches!(decoded.resources[1], Record::Txt { .. }));
        assert!(matches!(decoded.resources[2], Record::A { .. }));
    }

    #[test]
    fn should_compress_repeated_names_across_records() {
        // Two SRV-less PTR answers sharing the same target suffix should
        // compress down well under sending the names twice in full.
        let mut message = OutgoingMessage::response();
        message
            .add_answer(Record::Ptr {
                domain: "_http._tcp.local".to_string(),
                class: Class::IN,
                target: "One._http._tcp.local".to_string(),
                ttl: 4500,
            })
            .add_answer(Record::Ptr {
                domain: "_http._tcp.local".to_string(),
                class: Class::IN,
                target: "Two._http._tcp.local".to_string(),
                ttl: 4500,
            });

        let mut packet = message.packet();
        let buffer = packet.create_buffer().unwrap();
        // Spelling out "_http._tcp.local" and both full target names in full
        // four times over (twice as an owner name, twice inside a target)
        // with no sharing at all would take well over 100 bytes; compression
        // should keep the encoded message under that.
        assert!(buffer.pos() < 100);

        let decoded = DnsPacket::try_from(buffer).unwrap();
        assert_eq!(decoded.answers.len(), 2);
        assert_eq!(decoded.answers[0].domain(), "_http._tcp.local");
        assert_eq!(decoded.answers[1].domain(), "_http._tcp.local");
    }

    #[test]
    fn should_not_fail_on_an_unknown_record_type() {
        // AAAA (28) is out of scope for this implementation; the record must
        // still be consumed off the wire so the rest of the message parses,
        // but it is recognised and skipped rather than handed to callers.
        let mut buffer = BytePacketBuffer::default();
        let header = Header {
            answers: 1,
            ..Header::response()
        };
        header.write(&mut buffer).unwrap();
        buffer.write_qname("host.local").unwrap();
        buffer.write_u16(28).unwrap(); // AAAA
        buffer.write_u16(1).unwrap(); // class IN
        buffer.write_u32(120).unwrap();
        buffer.write_u16(16).unwrap();
        for _ in 0..16 {
            buffer.write_u8(0).unwrap();
        }
        buffer.pos = 0;

        let decoded = DnsPacket::try_from(buffer).unwrap();
        assert!(decoded.answers.is_empty());
    }

    #[test]
    fn should_reject_a_truncated_message() {
        let mut buffer = BytePacketBuffer::default();
        let header = Header {
            questions: 1,
            ..Header::query()
        };
        header.write(&mut buffer).unwrap();
        // Claims one question but the buffer ends right after the header.
        buffer.pos = 0;
        let zeroed = BytePacketBuffer::from_bytes(&buffer.buf[..12]);
        assert!(DnsPacket::try_from(zeroed).is_err());
    }
}
