use crate::buffer::reader::ReaderError;
use crate::buffer::writer::WriterError;
use crate::buffer::BytePacketBuffer;
use crate::packet::RecordType;

/// CLASS fields appear in questions and resource records. mDNS only ever puts
/// `Internet` on the wire, but the other historical codes still decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum ClassCode {
    /// IN - the Internet
    Internet = 1,
    /// CS - the CSNET class (Obsolete - used only for examples in some obsolete RFCs)
    Csnet = 2,
    /// CH - the CHAOS class
    Chaos = 3,
    /// HS - Hesiod [Dyer 87]
    Hesiod = 4,
}

impl Default for ClassCode {
    fn default() -> Self {
        Self::Internet
    }
}

impl TryFrom<u16> for ClassCode {
    type Error = ReaderError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Internet),
            2 => Ok(Self::Csnet),
            3 => Ok(Self::Chaos),
            4 => Ok(Self::Hesiod),
            other => Err(ReaderError::InvalidClass(other)),
        }
    }
}

/// The two-octet CLASS on the wire, split into a 15 bit class code and a high
/// bit reused by mDNS for two different purposes depending on context: on a
/// question it asks for a unicast response (QU), on a resource record it
/// marks the record as the unique owner of the name (cache-flush bit).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Class {
    pub code: ClassCode,
    pub flag: bool,
}

impl Default for Class {
    fn default() -> Self {
        Self::IN
    }
}

impl Class {
    pub const IN: Self = Self {
        code: ClassCode::Internet,
        flag: false,
    };

    /// Same class, with the high bit set (QU / cache-flush depending on context).
    pub fn flagged(mut self) -> Self {
        self.flag = true;
        self
    }

    pub fn unicast_requested(&self) -> bool {
        self.flag
    }

    pub fn cache_flush(&self) -> bool {
        self.flag
    }

    pub fn to_num(self) -> u16 {
        (self.code as u16) | if self.flag { 0x8000 } else { 0 }
    }

    pub fn from_num(value: u16) -> Result<Self, ReaderError> {
        let flag = (value & 0x8000) != 0;
        let code = ClassCode::try_from(value & 0x7FFF)?;
        Ok(Self { code, flag })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// QNAME a domain name represented as a sequence of labels,
    /// where each label consists of a length octet followed by that number of octets.
    /// The domain name terminates with the zero length octet for the null label of the root.
    pub name: String,
    /// QTYPE a two octet code which specifies the type of the query.
    pub qtype: RecordType,
    /// QCLASS a two octet code that specifies the class of the query, with the
    /// high bit carrying the unicast-response-requested flag.
    pub qclass: Class,
}

impl Default for Question {
    fn default() -> Self {
        Self {
            name: String::default(),
            qtype: RecordType::Unknown(0),
            qclass: Class::IN,
        }
    }
}

impl Question {
    pub fn new(name: String, qtype: RecordType) -> Self {
        Self {
            name,
            qtype,
            qclass: Class::IN,
        }
    }

    pub fn unicast(mut self) -> Self {
        self.qclass = self.qclass.flagged();
        self
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let name = buffer.read_qname()?;
        let qtype = RecordType::from_num(buffer.read_u16()?);
        let qclass = Class::from_num(buffer.read_u16()?)?;

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_qname(&self.name)?;
        buffer.write_u16(self.qtype.into_num())?;
        buffer.write_u16(self.qclass.to_num())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_round_trip_question() {
        let question = Question::new("_http._tcp.local".to_string(), RecordType::Ptr).unicast();
        let mut buffer = BytePacketBuffer::default();
        question.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Question::read(&mut buffer).unwrap();
        assert_eq!(read, question);
        assert!(read.qclass.unicast_requested());
    }

    #[test]
    fn should_reject_unknown_class() {
        let error = Class::from_num(7).unwrap_err();
        assert_eq!(error, ReaderError::InvalidClass(7));
    }
}
