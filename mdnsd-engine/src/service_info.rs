use std::net::Ipv4Addr;

use mdnsd_proto::packet::question::Class;
use mdnsd_proto::packet::record::{Record, TxtData};

use crate::name::{parse_service_type_name, BadTypeInName, ServiceTypeName};

/// The registrar's view of a local (or discovered) service instance:
/// `{type, name, address, port, priority, weight, properties, server}` as
/// specified. Cheap to clone; records are derived from it on demand rather
/// than stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service_type: ServiceTypeName,
    /// The instance label, e.g. `xxxyyy` in `xxxyyy._http._tcp.local.`.
    pub instance_name: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
    pub properties: TxtData,
    /// The target host name records (SRV/A) point at, e.g. `xxxyyy.local.`.
    pub server: String,
}

impl ServiceInfo {
    /// Fully qualified instance name: `<instance>.<base-type>`, e.g.
    /// `xxxyyy._http._tcp.local.`. Always rooted at the bare service type,
    /// even when `service_type` carries a subtype qualifier — a subtype PTR
    /// points at this same name, it never renames the instance.
    pub fn instance_fqdn(&self) -> String {
        format!("{}.{}", self.instance_name, self.service_type.base())
    }

    /// The PTR record advertising this instance under its bare service type.
    pub fn ptr_record(&self, ttl: u32) -> Record {
        Record::Ptr {
            domain: self.service_type.base(),
            class: Class::IN,
            target: self.instance_fqdn(),
            ttl,
        }
    }

    /// A PTR record advertising this instance under a subtype's fully
    /// qualified name, used when registering `<subtype>._sub.<type>`.
    pub fn subtype_ptr_record(&self, subtype: &str, ttl: u32) -> Record {
        Record::Ptr {
            domain: format!("{subtype}._sub.{}", self.service_type.base()),
            class: Class::IN,
            target: self.instance_fqdn(),
            ttl,
        }
    }

    pub fn srv_record(&self, ttl: u32) -> Record {
        Record::Srv {
            domain: self.instance_fqdn(),
            class: Class::IN,
            priority: self.priority,
            weight: self.weight,
            port: self.port,
            target: self.server.clone(),
            ttl,
        }
    }

    pub fn txt_record(&self, ttl: u32) -> Record {
        Record::Txt {
            domain: self.instance_fqdn(),
            class: Class::IN,
            data: self.properties.clone(),
            ttl,
        }
    }

    pub fn a_record(&self, ttl: u32) -> Record {
        Record::A {
            domain: self.server.clone(),
            class: Class::IN,
            addr: self.address,
            ttl,
        }
    }

    /// The full record set a responder announces or retracts for this
    /// instance: PTR (plus subtype PTR, if any), SRV, TXT, A.
    pub fn records(&self, ttl: u32) -> Vec<Record> {
        let mut records = vec![self.ptr_record(ttl)];
        if let Some(subtype) = &self.service_type.subtype {
            records.push(self.subtype_ptr_record(subtype, ttl));
        }
        records.push(self.srv_record(ttl));
        records.push(self.txt_record(ttl));
        records.push(self.a_record(ttl));
        records
    }

    /// Assembles a `ServiceInfo` from a PTR target's cached SRV/TXT/A
    /// records, as `Browser::get_service_info` does once all three have
    /// arrived. Returns `None` if any of them is still missing.
    pub fn from_records(
        service_type: ServiceTypeName,
        instance_fqdn: &str,
        records: &[Record],
    ) -> Option<Self> {
        let instance_name = instance_fqdn
            .strip_suffix(&format!(".{}", service_type.base()))
            .unwrap_or(instance_fqdn)
            .to_string();

        let srv = records.iter().find_map(|record| match record {
            Record::Srv {
                priority,
                weight,
                port,
                target,
                ..
            } => Some((*priority, *weight, *port, target.clone())),
            _ => None,
        })?;
        let txt = records
            .iter()
            .find_map(|record| match record {
                Record::Txt { data, .. } => Some(data.clone()),
                _ => None,
            })
            .unwrap_or_else(|| TxtData::from_pairs(std::iter::empty()));
        let address = records.iter().find_map(|record| match record {
            Record::A { addr, .. } => Some(*addr),
            _ => None,
        })?;

        let (priority, weight, port, server) = srv;
        Some(Self {
            service_type,
            instance_name,
            address,
            port,
            priority,
            weight,
            properties: txt,
            server,
        })
    }
}

/// A host-friendly builder that defaults `server` from `instance_fqdn` and
/// `properties` from a plain key/value map, so callers outside the codec
/// never have to construct `TxtData`/`Record` variants by hand. Lives
/// alongside `ServiceInfo` rather than only in the CLI crate so library
/// consumers of `mdnsd-engine` get it too.
#[derive(Debug, Default, Clone)]
pub struct ServiceInfoBuilder {
    service_type: Option<String>,
    instance_name: Option<String>,
    address: Option<Ipv4Addr>,
    port: Option<u16>,
    priority: u16,
    weight: u16,
    properties: Vec<(String, String)>,
    server: Option<String>,
}

impl ServiceInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn instance_name(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    pub fn address(mut self, address: Ipv4Addr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server);
        self
    }

    pub fn build(self) -> Result<ServiceInfo, BadTypeInName> {
        let service_type_str = self.service_type.unwrap_or_default();
        let service_type = parse_service_type_name(&service_type_str)?;
        let instance_name = self.instance_name.unwrap_or_default();
        let address = self.address.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let port = self.port.unwrap_or(0);
        let server = self
            .server
            .unwrap_or_else(|| format!("{instance_name}.local."));
        let pairs: Vec<(&str, &str)> = self
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let properties = TxtData::from_pairs(pairs);

        Ok(ServiceInfo {
            service_type,
            instance_name,
            address,
            port,
            priority: self.priority,
            weight: self.weight,
            properties,
            server,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdnsd_proto::packet::record::TxtValue;
    use mdnsd_proto::packet::RecordType;
    use similar_asserts::assert_eq;

    fn sample() -> ServiceInfo {
        ServiceInfoBuilder::new()
            .service_type("_http._tcp.local.")
            .instance_name("xxxyyy")
            .address(Ipv4Addr::new(10, 0, 1, 2))
            .port(80)
            .property("path", "/")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_an_instance_fqdn() {
        assert_eq!(sample().instance_fqdn(), "xxxyyy._http._tcp.local.");
    }

    #[test]
    fn should_default_the_server_name_from_the_instance() {
        let info = sample();
        assert_eq!(info.server, "xxxyyy.local.");
    }

    #[test]
    fn should_produce_a_ptr_record_pointing_at_the_instance() {
        let info = sample();
        let record = info.ptr_record(120);
        assert_eq!(record.domain(), "_http._tcp.local.");
        assert_eq!(record.record_type(), RecordType::Ptr);
    }

    #[test]
    fn should_include_a_subtype_ptr_when_subtyped() {
        let info = ServiceInfoBuilder::new()
            .service_type("printer._sub._http._tcp.local.")
            .instance_name("xxxyyy")
            .address(Ipv4Addr::new(10, 0, 1, 2))
            .port(80)
            .build()
            .unwrap();
        let records = info.records(120);
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].domain(), "_http._tcp.local.");
        assert_eq!(records[1].domain(), "printer._sub._http._tcp.local.");
        assert_eq!(records[0].record_type(), RecordType::Ptr);
        assert_eq!(records[1].record_type(), RecordType::Ptr);
        if let Record::Ptr { target, .. } = &records[0] {
            assert_eq!(target, "xxxyyy._http._tcp.local.");
        } else {
            panic!("expected a PTR record");
        }
        if let Record::Ptr { target, .. } = &records[1] {
            assert_eq!(target, "xxxyyy._http._tcp.local.");
        } else {
            panic!("expected a PTR record");
        }
    }

    #[test]
    fn should_reassemble_from_records() {
        let info = sample();
        let records = info.records(120);
        let rebuilt = ServiceInfo::from_records(
            info.service_type.clone(),
            &info.instance_fqdn(),
            &records,
        )
        .unwrap();
        assert_eq!(rebuilt.address, info.address);
        assert_eq!(rebuilt.port, info.port);
        assert_eq!(rebuilt.properties.get("path"), TxtValue::Bytes(b"/".to_vec()));
    }

    #[test]
    fn should_reject_an_invalid_service_type_at_build_time() {
        let result = ServiceInfoBuilder::new()
            .service_type("not-a-valid-type")
            .instance_name("xxxyyy")
            .build();
        assert!(result.is_err());
    }
}
