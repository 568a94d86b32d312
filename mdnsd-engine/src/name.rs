use std::fmt::Display;

const LOCAL_SUFFIX: &str = ".local.";

/// A parsed `_service._proto.local.` (optionally `<subtype>._sub._service._proto.local.`)
/// service type name, per DNS-SD (RFC 6763 §4.1, §7.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTypeName {
    pub service: String,
    pub protocol: Protocol,
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "_tcp"),
            Self::Udp => write!(f, "_udp"),
        }
    }
}

impl ServiceTypeName {
    /// The bare `_service._proto.local.` form, dropping any subtype
    /// qualifier. Instance names are always rooted here: a subtype is a
    /// second PTR pointing at the same instance, never a rename of it.
    pub fn base(&self) -> String {
        format!("_{}.{}.local.", self.service, self.protocol)
    }
}

impl Display for ServiceTypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subtype {
            Some(subtype) => write!(
                f,
                "{subtype}._sub._{}.{}.local.",
                self.service, self.protocol
            ),
            None => write!(f, "_{}.{}.local.", self.service, self.protocol),
        }
    }
}

/// The single failure raised by the validator, matching the one error kind
/// the rest of the engine needs to distinguish registration/lookup inputs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadTypeInName(pub String);

impl Display for BadTypeInName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not a valid DNS-SD service type name: {:?}", self.0)
    }
}

impl std::error::Error for BadTypeInName {}

fn reject(name: &str) -> BadTypeInName {
    BadTypeInName(name.to_string())
}

/// `_<letter-or-digit>(<letter-digit-hyphen>*<letter-or-digit>)?` grammar for
/// the service label, applied to the label INCLUDING its leading underscore:
/// total length 2-16 bytes, no leading/trailing/doubled hyphen, at least one
/// ASCII letter present (so purely numeric labels are rejected).
fn validate_service_label(label: &str) -> bool {
    if label.len() < 2 || label.len() > 16 {
        return false;
    }
    let Some(rest) = label.strip_prefix('_') else {
        return false;
    };
    if rest.starts_with('-') || rest.ends_with('-') {
        return false;
    }
    if rest.contains("--") {
        return false;
    }
    if !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return false;
    }
    rest.chars().any(|c| c.is_ascii_alphabetic())
}

fn parse_protocol(label: &str) -> Option<Protocol> {
    match label.to_ascii_lowercase().as_str() {
        "_tcp" => Some(Protocol::Tcp),
        "_udp" => Some(Protocol::Udp),
        _ => None,
    }
}

/// Parses and validates a DNS-SD service type name such as `_http._tcp.local.`
/// or `x._sub._http._tcp.local.`. Raises `BadTypeInName` on any grammar
/// violation, matching the single error kind the validator is specified to
/// surface.
pub fn parse_service_type_name(name: &str) -> Result<ServiceTypeName, BadTypeInName> {
    if name.is_empty() {
        return Err(reject(name));
    }

    let rest = name.strip_suffix(LOCAL_SUFFIX).ok_or_else(|| reject(name))?;
    let labels: Vec<&str> = rest.split('.').collect();

    match labels.as_slice() {
        [service_label, protocol_label] => {
            let protocol = parse_protocol(protocol_label).ok_or_else(|| reject(name))?;
            if !validate_service_label(service_label) {
                return Err(reject(name));
            }
            Ok(ServiceTypeName {
                service: service_label.trim_start_matches('_').to_string(),
                protocol,
                subtype: None,
            })
        }
        [instance, sub_label, service_label, protocol_label] => {
            if !sub_label.eq_ignore_ascii_case("_sub") {
                return Err(reject(name));
            }
            if instance.is_empty() || instance.len() > 63 {
                return Err(reject(name));
            }
            let protocol = parse_protocol(protocol_label).ok_or_else(|| reject(name))?;
            if !validate_service_label(service_label) {
                return Err(reject(name));
            }
            Ok(ServiceTypeName {
                service: service_label.trim_start_matches('_').to_string(),
                protocol,
                subtype: Some(instance.to_string()),
            })
        }
        _ => Err(reject(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_single_letter_service_labels() {
        assert!(parse_service_type_name("_x._tcp.local.").is_ok());
        assert!(parse_service_type_name("_x._udp.local.").is_ok());
    }

    #[test]
    fn should_accept_hyphenated_alphanumeric_service_label() {
        let parsed = parse_service_type_name("_12345-67890-abc._udp.local.").unwrap();
        assert_eq!(parsed.service, "12345-67890-abc");
        assert_eq!(parsed.protocol, Protocol::Udp);
    }

    #[test]
    fn should_accept_a_subtype_qualified_name() {
        let parsed = parse_service_type_name("x._sub._http._tcp.local.").unwrap();
        assert_eq!(parsed.subtype.as_deref(), Some("x"));
        assert_eq!(parsed.service, "http");
        assert_eq!(parsed.protocol, Protocol::Tcp);
    }

    #[test]
    fn should_accept_a_63_byte_subtype_instance() {
        let instance = "a".repeat(63);
        let name = format!("{instance}._sub._http._tcp.local.");
        assert!(parse_service_type_name(&name).is_ok());
    }

    #[test]
    fn should_reject_an_empty_name() {
        assert!(parse_service_type_name("").is_err());
    }

    #[test]
    fn should_reject_a_name_missing_the_local_suffix() {
        assert!(parse_service_type_name("local").is_err());
    }

    #[test]
    fn should_reject_a_name_missing_the_service_label() {
        assert!(parse_service_type_name("_tcp.local.").is_err());
    }

    #[test]
    fn should_reject_an_invalid_character_in_the_service_label() {
        assert!(parse_service_type_name("_@._tcp.local.").is_err());
    }

    #[test]
    fn should_reject_consecutive_hyphens() {
        assert!(parse_service_type_name("_x--x._tcp.local.").is_err());
    }

    #[test]
    fn should_reject_a_leading_hyphen() {
        assert!(parse_service_type_name("_-x._udp.local.").is_err());
    }

    #[test]
    fn should_reject_a_trailing_hyphen() {
        assert!(parse_service_type_name("_x-._tcp.local.").is_err());
    }

    #[test]
    fn should_reject_a_purely_numeric_label() {
        assert!(parse_service_type_name("_22._udp.local.").is_err());
    }

    #[test]
    fn should_reject_a_label_exceeding_16_bytes_including_the_underscore() {
        assert!(parse_service_type_name("_1234567890-abcde._udp.local.").is_err());
    }

    #[test]
    fn should_reject_a_64_byte_subtype_instance() {
        let instance = "a".repeat(64);
        let name = format!("{instance}._sub._http._tcp.local.");
        assert!(parse_service_type_name(&name).is_err());
    }

    #[test]
    fn should_round_trip_display_for_a_plain_service_type() {
        let parsed = parse_service_type_name("_http._tcp.local.").unwrap();
        assert_eq!(parsed.to_string(), "_http._tcp.local.");
    }

    #[test]
    fn should_drop_the_subtype_qualifier_in_base() {
        let parsed = parse_service_type_name("x._sub._http._tcp.local.").unwrap();
        assert_eq!(parsed.base(), "_http._tcp.local.");
        assert_eq!(parsed.to_string(), "x._sub._http._tcp.local.");
    }
}
