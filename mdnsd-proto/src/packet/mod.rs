pub mod header;
pub mod message;
pub mod question;
pub mod record;

pub use message::OutgoingMessage;

use crate::buffer::{BytePacketBuffer, ReaderError, WriterError};

/// The record types this implementation understands on the wire. Anything
/// else still decodes (as `Unknown`) but is never surfaced as an answer.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    Unknown(u16),
    /// a host address
    A, // 1
    /// a domain name pointer, used for service instance enumeration
    Ptr, // 12
    /// host information
    Hinfo, // 13
    /// text strings, used for service metadata
    Txt, // 16
    /// service location
    Srv, // 33
}

impl RecordType {
    pub fn into_num(self) -> u16 {
        match self {
            RecordType::Unknown(x) => x,
            RecordType::A => 1,
            RecordType::Ptr => 12,
            RecordType::Hinfo => 13,
            RecordType::Txt => 16,
            RecordType::Srv => 33,
        }
    }

    pub fn from_num(num: u16) -> RecordType {
        match num {
            1 => RecordType::A,
            12 => RecordType::Ptr,
            13 => RecordType::Hinfo,
            16 => RecordType::Txt,
            33 => RecordType::Srv,
            _ => RecordType::Unknown(num),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DnsPacket {
    pub header: header::Header,
    pub questions: Vec<question::Question>,
    pub answers: Vec<record::Record>,
    pub authorities: Vec<record::Record>,
    pub resources: Vec<record::Record>,
}

impl TryFrom<BytePacketBuffer> for DnsPacket {
    type Error = ReaderError;

    fn try_from(mut buffer: BytePacketBuffer) -> Result<Self, Self::Error> {
        let header = header::Header::read(&mut buffer)?;

        let mut questions = Vec::with_capacity(header.questions as usize);
        for _ in 0..header.questions {
            questions.push(question::Question::read(&mut buffer)?);
        }

        let mut answers = Vec::with_capacity(header.answers as usize);
        for _ in 0..header.answers {
            let record = record::Record::read(&mut buffer)?;
            if !matches!(record, record::Record::Unknown { .. }) {
                answers.push(record);
            }
        }

        let mut authorities = Vec::with_capacity(header.authoritative_entries as usize);
        for _ in 0..header.authoritative_entries {
            let record = record::Record::read(&mut buffer)?;
            if !matches!(record, record::Record::Unknown { .. }) {
                authorities.push(record);
            }
        }

        let mut resources = Vec::with_capacity(header.resource_entries as usize);
        for _ in 0..header.resource_entries {
            let record = record::Record::read(&mut buffer)?;
            if !matches!(record, record::Record::Unknown { .. }) {
                resources.push(record);
            }
        }

        Ok(DnsPacket {
            header,
            questions,
            answers,
            authorities,
            resources,
        })
    }
}

impl DnsPacket {
    pub fn is_query(&self) -> bool {
        !self.header.response
    }

    pub fn is_response(&self) -> bool {
        self.header.response
    }

    /// All records carried by this message, in the order a question-answering
    /// responder would check them for a known-answer match: answers first,
    /// then additionals packed into `resources`.
    pub fn all_records(&self) -> impl Iterator<Item = &record::Record> {
        self.answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.resources.iter())
    }

    pub fn create_buffer(&mut self) -> Result<BytePacketBuffer, WriterError> {
        let mut buffer = BytePacketBuffer::default();
        self.header.questions = self.questions.len() as u16;
        self.header.answers = self.answers.len() as u16;
        self.header.authoritative_entries = self.authorities.len() as u16;
        self.header.resource_entries = self.resources.len() as u16;

        self.header.write(&mut buffer)?;

        for question in &self.questions {
            question.write(&mut buffer)?;
        }
        for rec in &self.answers {
            rec.write(&mut buffer)?;
        }
        for rec in &self.authorities {
            rec.write(&mut buffer)?;
        }
        for rec in &self.resources {
            rec.write(&mut buffer)?;
        }

        Ok(buffer)
    }
}
