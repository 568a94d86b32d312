use crate::buffer::{BytePacketBuffer, ReaderError, WriterError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// A 16 bit identifier. Queries and their matching responses share an id,
    /// but unsolicited mDNS responses (the common case) typically carry 0.
    pub id: u16,
    /// QR: whether this message is a query (false) or a response (true).
    pub response: bool,
    /// OPCODE is always 0 (standard query) on the wire for mDNS.
    pub opcode: u8,
    /// AA: set on responses sent by a host that owns the queried record.
    pub authoritative_answer: bool,
    /// TC: the message was truncated, additional messages with further
    /// records follow (known-answer suppression across multiple queries).
    pub truncated_message: bool,
    /// RD is legal on the wire but ignored by mDNS; kept for round-trip fidelity.
    pub recursion_desired: bool,
    /// RA is legal on the wire but ignored by mDNS; kept for round-trip fidelity.
    pub recursion_available: bool,
    pub z: bool,
    pub authed_data: bool,
    pub checking_disabled: bool,
    /// RCODE; mDNS responders always send 0, but incoming messages are parsed as-is.
    pub response_code: u8,

    pub questions: u16,
    pub answers: u16,
    pub authoritative_entries: u16,
    pub resource_entries: u16,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            id: 0,
            response: false,
            opcode: 0,
            authoritative_answer: false,
            truncated_message: false,
            recursion_desired: false,
            recursion_available: false,
            z: false,
            authed_data: false,
            checking_disabled: false,
            response_code: 0,
            questions: 0,
            answers: 0,
            authoritative_entries: 0,
            resource_entries: 0,
        }
    }
}

impl Header {
    pub fn query() -> Self {
        Self::default()
    }

    pub fn response() -> Self {
        Self {
            response: true,
            authoritative_answer: true,
            ..Default::default()
        }
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let head = (flags >> 8) as u8;
        let tail = (flags & 0xFF) as u8;

        let questions = buffer.read_u16()?;
        let answers = buffer.read_u16()?;
        let authoritative_entries = buffer.read_u16()?;
        let resource_entries = buffer.read_u16()?;

        Ok(Self {
            id,
            recursion_desired: (head & (1 << 0)) > 0,
            truncated_message: (head & (1 << 1)) > 0,
            authoritative_answer: (head & (1 << 2)) > 0,
            opcode: (head >> 3) & 0x0F,
            response: (head & (1 << 7)) > 0,
            response_code: tail & 0x0F,
            checking_disabled: (tail & (1 << 4)) > 0,
            authed_data: (tail & (1 << 5)) > 0,
            z: (tail & (1 << 6)) > 0,
            recursion_available: (tail & (1 << 7)) > 0,
            questions,
            answers,
            authoritative_entries,
            resource_entries,
        })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | (self.opcode << 3)
                | ((self.response as u8) << 7),
        )?;

        buffer.write_u8(
            (self.response_code & 0x0F)
                | ((self.checking_disabled as u8) << 4)
                | ((self.authed_data as u8) << 5)
                | ((self.z as u8) << 6)
                | ((self.recursion_available as u8) << 7),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_round_trip_query_header() {
        let header = Header {
            id: 0,
            questions: 1,
            ..Header::query()
        };
        let mut buffer = BytePacketBuffer::default();
        header.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Header::read(&mut buffer).unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn should_round_trip_response_header() {
        let header = Header {
            id: 0,
            answers: 2,
            ..Header::response()
        };
        let mut buffer = BytePacketBuffer::default();
        header.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Header::read(&mut buffer).unwrap();
        assert!(read.response);
        assert!(read.authoritative_answer);
        assert_eq!(read.answers, 2);
    }
}
