use std::net::Ipv4Addr;

use crate::buffer::reader::ReaderError;
use crate::buffer::writer::WriterError;
use crate::buffer::BytePacketBuffer;
use crate::packet::question::Class;
use crate::packet::RecordType;

/// A single key from a TXT record, decoded per RFC 6763 §6.4: a bare key
/// (no `=`) is present-as-boolean, `key=` is present with an empty value,
/// and an absent key is distinct from both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxtValue {
    Absent,
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl TxtValue {
    pub fn as_str(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Self::Bytes(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }
}

/// Raw TXT record payload: a concatenation of length-prefixed strings, each
/// at most 255 bytes, per RFC 1035 `<character-string>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxtData(pub Vec<u8>);

impl TxtData {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut data = Vec::new();
        for (key, value) in pairs {
            let mut segment = Vec::with_capacity(key.len() + 1 + value.len());
            segment.extend_from_slice(key.as_bytes());
            if !value.is_empty() {
                segment.push(b'=');
                segment.extend_from_slice(value.as_bytes());
            }
            let len = segment.len().min(255) as u8;
            data.push(len);
            data.extend_from_slice(&segment[..len as usize]);
        }
        if data.is_empty() {
            // RFC 6763 §6.1: a TXT record SHOULD have at least one string,
            // an empty string if there is no other data to put there.
            data.push(0);
        }
        Self(data)
    }

    /// Iterate the key/value segments in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (String, TxtValue)> + '_ {
        let bytes = &self.0;
        let mut pos = 0usize;
        std::iter::from_fn(move || loop {
            if pos >= bytes.len() {
                return None;
            }
            let len = bytes[pos] as usize;
            pos += 1;
            if pos + len > bytes.len() {
                return None;
            }
            let segment = &bytes[pos..pos + len];
            pos += len;
            if segment.is_empty() {
                continue;
            }
            return Some(match segment.iter().position(|&b| b == b'=') {
                Some(eq) => {
                    let key = String::from_utf8_lossy(&segment[..eq]).to_string();
                    (key, TxtValue::Bytes(segment[eq + 1..].to_vec()))
                }
                None => {
                    let key = String::from_utf8_lossy(segment).to_string();
                    (key, TxtValue::Boolean(true))
                }
            });
        })
    }

    pub fn get(&self, key: &str) -> TxtValue {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
            .unwrap_or(TxtValue::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Record {
    Unknown {
        domain: String,
        qtype: u16,
        class: Class,
        data: Vec<u8>,
        ttl: u32,
    },
    A {
        domain: String,
        class: Class,
        addr: Ipv4Addr,
        ttl: u32,
    },
    Ptr {
        domain: String,
        class: Class,
        target: String,
        ttl: u32,
    },
    Hinfo {
        domain: String,
        class: Class,
        cpu: String,
        os: String,
        ttl: u32,
    },
    Txt {
        domain: String,
        class: Class,
        data: TxtData,
        ttl: u32,
    },
    Srv {
        domain: String,
        class: Class,
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
        ttl: u32,
    },
}

impl Record {
    pub fn domain(&self) -> &str {
        match self {
            Self::Unknown { domain, .. }
            | Self::A { domain, .. }
            | Self::Ptr { domain, .. }
            | Self::Hinfo { domain, .. }
            | Self::Txt { domain, .. }
            | Self::Srv { domain, .. } => domain,
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Unknown { qtype, .. } => RecordType::Unknown(*qtype),
            Self::A { .. } => RecordType::A,
            Self::Ptr { .. } => RecordType::Ptr,
            Self::Hinfo { .. } => RecordType::Hinfo,
            Self::Txt { .. } => RecordType::Txt,
            Self::Srv { .. } => RecordType::Srv,
        }
    }

    pub fn class(&self) -> Class {
        match self {
            Self::Unknown { class, .. }
            | Self::A { class, .. }
            | Self::Ptr { class, .. }
            | Self::Hinfo { class, .. }
            | Self::Txt { class, .. }
            | Self::Srv { class, .. } => *class,
        }
    }

    pub fn ttl(&self) -> u32 {
        match self {
            Self::Unknown { ttl, .. }
            | Self::A { ttl, .. }
            | Self::Ptr { ttl, .. }
            | Self::Hinfo { ttl, .. }
            | Self::Txt { ttl, .. }
            | Self::Srv { ttl, .. } => *ttl,
        }
    }

    /// Same record with a different TTL. Used when re-announcing or refreshing
    /// an entry already held in the cache.
    pub fn with_ttl(&self, ttl: u32) -> Self {
        match self {
            Self::Unknown {
                domain,
                qtype,
                class,
                data,
                ..
            } => Self::Unknown {
                domain: domain.clone(),
                qtype: *qtype,
                class: *class,
                data: data.clone(),
                ttl,
            },
            Self::A {
                domain,
                class,
                addr,
                ..
            } => Self::A {
                domain: domain.clone(),
                class: *class,
                addr: *addr,
                ttl,
            },
            Self::Ptr {
                domain,
                class,
                target,
                ..
            } => Self::Ptr {
                domain: domain.clone(),
                class: *class,
                target: target.clone(),
                ttl,
            },
            Self::Hinfo {
                domain,
                class,
                cpu,
                os,
                ..
            } => Self::Hinfo {
                domain: domain.clone(),
                class: *class,
                cpu: cpu.clone(),
                os: os.clone(),
                ttl,
            },
            Self::Txt {
                domain,
                class,
                data,
                ..
            } => Self::Txt {
                domain: domain.clone(),
                class: *class,
                data: data.clone(),
                ttl,
            },
            Self::Srv {
                domain,
                class,
                priority,
                weight,
                port,
                target,
                ..
            } => Self::Srv {
                domain: domain.clone(),
                class: *class,
                priority: *priority,
                weight: *weight,
                port: *port,
                target: target.clone(),
                ttl,
            },
        }
    }

    /// Identity comparison used for known-answer suppression and cache
    /// deduplication: name, type, class and payload must match, but the TTL
    /// (which counts down every second) is deliberately ignored.
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Unknown {
                    domain: d1,
                    qtype: q1,
                    class: c1,
                    data: dt1,
                    ..
                },
                Self::Unknown {
                    domain: d2,
                    qtype: q2,
                    class: c2,
                    data: dt2,
                    ..
                },
            ) => d1.eq_ignore_ascii_case(d2) && q1 == q2 && c1 == c2 && dt1 == dt2,
            (
                Self::A {
                    domain: d1,
                    class: c1,
                    addr: a1,
                    ..
                },
                Self::A {
                    domain: d2,
                    class: c2,
                    addr: a2,
                    ..
                },
            ) => d1.eq_ignore_ascii_case(d2) && c1 == c2 && a1 == a2,
            (
                Self::Ptr {
                    domain: d1,
                    class: c1,
                    target: t1,
                    ..
                },
                Self::Ptr {
                    domain: d2,
                    class: c2,
                    target: t2,
                    ..
                },
            ) => {
                d1.eq_ignore_ascii_case(d2) && c1 == c2 && t1.eq_ignore_ascii_case(t2)
            }
            (
                Self::Hinfo {
                    domain: d1,
                    class: c1,
                    cpu: cpu1,
                    os: os1,
                    ..
                },
                Self::Hinfo {
                    domain: d2,
                    class: c2,
                    cpu: cpu2,
                    os: os2,
                    ..
                },
            ) => d1.eq_ignore_ascii_case(d2) && c1 == c2 && cpu1 == cpu2 && os1 == os2,
            (
                Self::Txt {
                    domain: d1,
                    class: c1,
                    data: dt1,
                    ..
                },
                Self::Txt {
                    domain: d2,
                    class: c2,
                    data: dt2,
                    ..
                },
            ) => d1.eq_ignore_ascii_case(d2) && c1 == c2 && dt1 == dt2,
            (
                Self::Srv {
                    domain: d1,
                    class: c1,
                    priority: p1,
                    weight: w1,
                    port: port1,
                    target: t1,
                    ..
                },
                Self::Srv {
                    domain: d2,
                    class: c2,
                    priority: p2,
                    weight: w2,
                    port: port2,
                    target: t2,
                    ..
                },
            ) => {
                d1.eq_ignore_ascii_case(d2)
                    && c1 == c2
                    && p1 == p2
                    && w1 == w2
                    && port1 == port2
                    && t1.eq_ignore_ascii_case(t2)
            }
            _ => false,
        }
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Record, ReaderError> {
        let domain = buffer.read_qname()?;
        let qtype_num = buffer.read_u16()?;
        let qtype = RecordType::from_num(qtype_num);
        let class = Class::from_num(buffer.read_u16()?)?;
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()? as usize;
        let rdata_start = buffer.pos();

        let record = match qtype {
            RecordType::A => {
                let raw_addr = buffer.read_u32()?;
                let addr = Ipv4Addr::new(
                    ((raw_addr >> 24) & 0xFF) as u8,
                    ((raw_addr >> 16) & 0xFF) as u8,
                    ((raw_addr >> 8) & 0xFF) as u8,
                    (raw_addr & 0xFF) as u8,
                );

                Record::A {
                    domain,
                    class,
                    addr,
                    ttl,
                }
            }
            RecordType::Ptr => {
                let target = buffer.read_qname()?;

                Record::Ptr {
                    domain,
                    class,
                    target,
                    ttl,
                }
            }
            RecordType::Hinfo => {
                let cpu_len = buffer.read()? as usize;
                let cpu = String::from_utf8_lossy(&buffer.read_bytes(cpu_len)?).to_string();
                let os_len = buffer.read()? as usize;
                let os = String::from_utf8_lossy(&buffer.read_bytes(os_len)?).to_string();

                Record::Hinfo {
                    domain,
                    class,
                    cpu,
                    os,
                    ttl,
                }
            }
            RecordType::Txt => {
                let data = buffer.read_bytes(data_len)?;

                Record::Txt {
                    domain,
                    class,
                    data: TxtData(data),
                    ttl,
                }
            }
            RecordType::Srv => {
                let priority = buffer.read_u16()?;
                let weight = buffer.read_u16()?;
                let port = buffer.read_u16()?;
                let target = buffer.read_qname()?;

                Record::Srv {
                    domain,
                    class,
                    priority,
                    weight,
                    port,
                    target,
                    ttl,
                }
            }
            RecordType::Unknown(_) => {
                let data = buffer.read_bytes(data_len)?;

                Record::Unknown {
                    domain,
                    qtype: qtype_num,
                    class,
                    data,
                    ttl,
                }
            }
        };

        // Some wire types (HINFO, TXT) have no name compression inside their
        // RDATA and so their on-wire length always matches `data_len`, but
        // types using qnames (PTR, SRV) can compress and read fewer bytes
        // than `data_len` announced; trust the explicit RDLENGTH and seek
        // past it so a malformed length can't desynchronize the rest of the
        // message.
        let consumed = buffer.pos() - rdata_start;
        if consumed < data_len {
            buffer.step(data_len - consumed)?;
        }

        Ok(record)
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<usize, WriterError> {
        let start_pos = buffer.pos();

        match self {
            Record::A {
                domain,
                class,
                addr,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(RecordType::A.into_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(*ttl)?;
                buffer.write_u16(4)?;
                buffer.write_bytes(&addr.octets())?;
            }
            Record::Ptr {
                domain,
                class,
                target,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(RecordType::Ptr.into_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(*ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;
                buffer.write_qname(target)?;
                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            Record::Hinfo {
                domain,
                class,
                cpu,
                os,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(RecordType::Hinfo.into_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(*ttl)?;
                buffer.write_u16((1 + cpu.len() + 1 + os.len()) as u16)?;
                buffer.write_u8(cpu.len() as u8)?;
                buffer.write_bytes(cpu.as_bytes())?;
                buffer.write_u8(os.len() as u8)?;
                buffer.write_bytes(os.as_bytes())?;
            }
            Record::Txt {
                domain,
                class,
                data,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(RecordType::Txt.into_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(*ttl)?;
                buffer.write_u16(data.0.len() as u16)?;
                buffer.write_bytes(&data.0)?;
            }
            Record::Srv {
                domain,
                class,
                priority,
                weight,
                port,
                target,
                ttl,
            } => {
                buffer.write_qname(domain)?;
                buffer.write_u16(RecordType::Srv.into_num())?;
                buffer.write_u16(class.to_num())?;
                buffer.write_u32(*ttl)?;

                let pos = buffer.pos();
                buffer.write_u16(0)?;
                buffer.write_u16(*priority)?;
                buffer.write_u16(*weight)?;
                buffer.write_u16(*port)?;
                buffer.write_qname(target)?;
                let size = buffer.pos() - (pos + 2);
                buffer.set_u16(pos, size as u16)?;
            }
            Record::Unknown { .. } => {
                // Records we don't understand are never re-emitted; they're
                // decoded only so the rest of the message stays parseable.
            }
        }

        Ok(buffer.pos() - start_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn should_round_trip_a_record() {
        let record = Record::A {
            domain: "host.local".to_string(),
            class: Class::IN.flagged(),
            addr: Ipv4Addr::new(192, 168, 1, 5),
            ttl: 120,
        };
        let mut buffer = BytePacketBuffer::default();
        record.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Record::read(&mut buffer).unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn should_round_trip_ptr_record() {
        let record = Record::Ptr {
            domain: "_http._tcp.local".to_string(),
            class: Class::IN,
            target: "My Printer._http._tcp.local".to_string(),
            ttl: 4500,
        };
        let mut buffer = BytePacketBuffer::default();
        record.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Record::read(&mut buffer).unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn should_round_trip_srv_record() {
        let record = Record::Srv {
            domain: "My Printer._http._tcp.local".to_string(),
            class: Class::IN.flagged(),
            priority: 0,
            weight: 0,
            port: 8080,
            target: "host.local".to_string(),
            ttl: 120,
        };
        let mut buffer = BytePacketBuffer::default();
        record.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Record::read(&mut buffer).unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn should_round_trip_hinfo_record() {
        let record = Record::Hinfo {
            domain: "host.local".to_string(),
            class: Class::IN,
            cpu: "ARM64".to_string(),
            os: "LINUX".to_string(),
            ttl: 4500,
        };
        let mut buffer = BytePacketBuffer::default();
        record.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let read = Record::read(&mut buffer).unwrap();
        assert_eq!(read, record);
    }

    #[test]
    fn should_decode_txt_key_value_pairs() {
        let data = TxtData::from_pairs([("path", "/index.html"), ("secure", "")]);
        let pairs: Vec<_> = data.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("path".to_string(), TxtValue::Bytes(b"/index.html".to_vec())),
                ("secure".to_string(), TxtValue::Boolean(true)),
            ]
        );
    }

    #[test]
    fn should_report_absent_txt_key() {
        let data = TxtData::from_pairs([("path", "/")]);
        assert_eq!(data.get("missing"), TxtValue::Absent);
    }

    #[test]
    fn should_ignore_ttl_in_same_identity() {
        let a = Record::A {
            domain: "host.local".to_string(),
            class: Class::IN,
            addr: Ipv4Addr::new(10, 0, 0, 1),
            ttl: 120,
        };
        let b = a.with_ttl(60);
        assert!(a.same_identity(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn should_trust_rdlength_over_parsed_qname_length() {
        // A PTR record whose RDLENGTH is padded one byte beyond its target
        // qname's actual encoded size must still leave the buffer position at
        // the end of the announced RDATA, not wherever the qname reader
        // stopped, so the rest of the message stays in sync.
        let mut buffer = BytePacketBuffer::default();
        buffer.buf[0] = 1;
        buffer.buf[1] = b'a';
        buffer.buf[2] = 0; // domain "a"
        buffer.buf[3] = 0;
        buffer.buf[4] = 12; // TYPE = PTR
        buffer.buf[5] = 0;
        buffer.buf[6] = 1; // CLASS = IN
        buffer.buf[7] = 0;
        buffer.buf[8] = 0;
        buffer.buf[9] = 0;
        buffer.buf[10] = 120; // TTL
        buffer.buf[11] = 0;
        buffer.buf[12] = 4; // RDLENGTH, one byte padded beyond the qname below
        buffer.buf[13] = 1;
        buffer.buf[14] = b'b';
        buffer.buf[15] = 0; // target "b", 3 bytes
        buffer.buf[16] = 0xAA; // padding counted in RDLENGTH but not parsed
        buffer.buf[17] = 0xBB; // next record's first byte

        let record = Record::read(&mut buffer).unwrap();
        assert_eq!(
            record,
            Record::Ptr {
                domain: "a".to_string(),
                class: Class::IN,
                target: "b".to_string(),
                ttl: 120,
            }
        );
        assert_eq!(buffer.pos(), 17);
    }
}
