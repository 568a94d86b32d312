use super::header::Header;
use super::question::Question;
use super::record::Record;
use super::DnsPacket;

/// Builds an outgoing query or response one section at a time. Keeping this
/// separate from `DnsPacket` lets callers assemble a message without juggling
/// header counts by hand; `packet()` fills them in from the section lengths.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    id: u16,
    response: bool,
    authoritative: bool,
    questions: Vec<Question>,
    answers: Vec<Record>,
    authorities: Vec<Record>,
    additionals: Vec<Record>,
}

impl OutgoingMessage {
    pub fn query(id: u16) -> Self {
        Self {
            id,
            response: false,
            authoritative: false,
            ..Default::default()
        }
    }

    /// mDNS responses always carry id 0 and the authoritative-answer bit
    /// (RFC 6762 §18.1, §18.4).
    pub fn response() -> Self {
        Self {
            id: 0,
            response: true,
            authoritative: true,
            ..Default::default()
        }
    }

    pub fn add_question(&mut self, question: Question) -> &mut Self {
        self.questions.push(question);
        self
    }

    pub fn add_answer(&mut self, record: Record) -> &mut Self {
        self.answers.push(record);
        self
    }

    pub fn add_authoritative_answer(&mut self, record: Record) -> &mut Self {
        self.authorities.push(record);
        self
    }

    pub fn add_additional_answer(&mut self, record: Record) -> &mut Self {
        self.additionals.push(record);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
            && self.answers.is_empty()
            && self.authorities.is_empty()
            && self.additionals.is_empty()
    }

    pub fn packet(&self) -> DnsPacket {
        let header = if self.response {
            Header {
                id: self.id,
                authoritative_answer: self.authoritative,
                ..Header::response()
            }
        } else {
            Header {
                id: self.id,
                ..Header::query()
            }
        };

        DnsPacket {
            header,
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            authorities: self.authorities.clone(),
            resources: self.additionals.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::question::Class;
    use crate::packet::RecordType;
    use std::net::Ipv4Addr;

    #[test]
    fn should_build_a_query_with_one_question() {
        let mut message = OutgoingMessage::query(0);
        message.add_question(Question::new("_http._tcp.local".to_string(), RecordType::Ptr));
        let packet = message.packet();
        assert!(packet.is_query());
        assert_eq!(packet.questions.len(), 1);
        assert_eq!(packet.header.questions, 1);
    }

    #[test]
    fn should_build_a_response_with_answers() {
        let mut message = OutgoingMessage::response();
        message.add_answer(Record::A {
            domain: "host.local".to_string(),
            class: Class::IN.flagged(),
            addr: Ipv4Addr::new(10, 0, 0, 1),
            ttl: 120,
        });
        let packet = message.packet();
        assert!(packet.is_response());
        assert!(packet.header.authoritative_answer);
        assert_eq!(packet.answers.len(), 1);
    }
}
