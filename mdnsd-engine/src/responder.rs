use std::collections::HashSet;
use std::sync::Arc;

use mdnsd_proto::packet::question::Class;
use mdnsd_proto::packet::record::Record;
use mdnsd_proto::packet::{DnsPacket, OutgoingMessage, RecordType};

use crate::reactor::TaskKind;
use crate::service_info::ServiceInfo;
use crate::EngineInner;

/// TTL given to every record this engine advertises. RFC 6762 §10 recommends
/// a much longer TTL for PTR records (commonly 75 min) than for the
/// host-specific SRV/TXT/A set (commonly 2 min); this implementation keeps a
/// single value for all four, trading that nuance for a simpler announce/
/// goodbye schedule.
pub(crate) const RECORD_TTL: u32 = 120;

/// The DNS-SD service-type enumeration meta-query name (RFC 6763 §9): a PTR
/// query here is answered with one PTR per distinct registered service type,
/// each pointing at that type's bare name.
pub const META_QUERY_NAME: &str = "_services._dns-sd._udp.local.";

const ANNOUNCE_SCHEDULE_MS: [u64; 5] = [0, 1_000, 3_000, 7_000, 15_000];
const GOODBYE_STEPS: usize = 3;
const GOODBYE_SPACING_MS: i64 = 125;

fn bump_instance_name(name: &str) -> String {
    match name.rsplit_once('-') {
        Some((base, suffix)) if suffix.chars().all(|c| c.is_ascii_digit()) && !suffix.is_empty() => {
            let next: u32 = suffix.parse().unwrap_or(1) + 1;
            format!("{base}-{next}")
        }
        _ => format!("{name}-2"),
    }
}

/// Registers a service, renaming it on a local name collision, and schedules
/// its announcement backoff. Collision detection here is limited to what
/// this engine's own cache already knows about (its own registrations plus
/// anything already learned from the network) rather than a full three-probe
/// network round trip, which this engine allows implementations to
/// short-circuit on a loopback-only deployment.
#[tracing::instrument(skip(inner, info), fields(service_type = %info.service_type))]
pub(crate) fn register(inner: &Arc<EngineInner>, mut info: ServiceInfo) -> ServiceInfo {
    loop {
        let fqdn = info.instance_fqdn();
        let collides = {
            let services = inner.services.lock().expect("services mutex poisoned");
            services.contains_key(&fqdn)
        } || !inner.cache.get(&fqdn, RecordType::Srv).is_empty();

        if !collides {
            let mut services = inner.services.lock().expect("services mutex poisoned");
            services.insert(fqdn.clone(), info.clone());
            break;
        }

        info.instance_name = bump_instance_name(&info.instance_name);
    }

    let fqdn = info.instance_fqdn();
    let now = inner.clock.now_ms();
    inner
        .scheduler
        .lock()
        .expect("scheduler mutex poisoned")
        .schedule(
            now + ANNOUNCE_SCHEDULE_MS[0] as i64,
            TaskKind::AnnounceStep {
                instance_fqdn: fqdn,
                step: 0,
            },
        );
    info
}

pub(crate) fn run_announce_step(inner: &Arc<EngineInner>, instance_fqdn: &str, step: usize) {
    let info = {
        let services = inner.services.lock().expect("services mutex poisoned");
        services.get(instance_fqdn).cloned()
    };
    let Some(info) = info else { return };

    send_records(inner, info.records(RECORD_TTL));

    if let Some(&next_delay) = ANNOUNCE_SCHEDULE_MS.get(step + 1) {
        let prev_delay = ANNOUNCE_SCHEDULE_MS[step];
        let now = inner.clock.now_ms();
        inner.scheduler.lock().expect("scheduler mutex poisoned").schedule(
            now + (next_delay - prev_delay) as i64,
            TaskKind::AnnounceStep {
                instance_fqdn: instance_fqdn.to_string(),
                step: step + 1,
            },
        );
    }
}

/// Removes a registered service and schedules its goodbye broadcasts. The
/// record set to retract is captured now, since it's about to be dropped
/// from the registered-services table.
#[tracing::instrument(skip(inner))]
pub(crate) fn unregister(inner: &Arc<EngineInner>, instance_fqdn: &str) -> bool {
    let info = {
        let mut services = inner.services.lock().expect("services mutex poisoned");
        services.remove(instance_fqdn)
    };
    let Some(info) = info else { return false };

    let goodbye_records = info.records(0);
    inner
        .goodbyes
        .lock()
        .expect("goodbyes mutex poisoned")
        .insert(instance_fqdn.to_string(), goodbye_records);

    let now = inner.clock.now_ms();
    inner
        .scheduler
        .lock()
        .expect("scheduler mutex poisoned")
        .schedule(
            now,
            TaskKind::GoodbyeStep {
                instance_fqdn: instance_fqdn.to_string(),
                step: 0,
            },
        );
    true
}

pub(crate) fn run_goodbye_step(inner: &Arc<EngineInner>, instance_fqdn: &str, step: usize) {
    let records = {
        let goodbyes = inner.goodbyes.lock().expect("goodbyes mutex poisoned");
        goodbyes.get(instance_fqdn).cloned()
    };
    let Some(records) = records else { return };

    send_records(inner, records);

    if step + 1 < GOODBYE_STEPS {
        let now = inner.clock.now_ms();
        inner.scheduler.lock().expect("scheduler mutex poisoned").schedule(
            now + GOODBYE_SPACING_MS,
            TaskKind::GoodbyeStep {
                instance_fqdn: instance_fqdn.to_string(),
                step: step + 1,
            },
        );
    } else {
        inner
            .goodbyes
            .lock()
            .expect("goodbyes mutex poisoned")
            .remove(instance_fqdn);
    }
}

fn authoritative_records_for(inner: &EngineInner, name: &str, qtype: RecordType) -> Vec<Record> {
    let services = inner.services.lock().expect("services mutex poisoned");
    services
        .values()
        .flat_map(|info| info.records(RECORD_TTL))
        .filter(|record| record.domain().eq_ignore_ascii_case(name) && record.record_type() == qtype)
        .collect()
}

/// One PTR per distinct registered service type, each pointing from the
/// enumeration meta-name at that type's bare `_service._proto.local.` form.
/// A type registered under several instances, or under a subtype, is still
/// listed once.
fn meta_service_type_records(inner: &EngineInner) -> Vec<Record> {
    let services = inner.services.lock().expect("services mutex poisoned");
    let mut seen = HashSet::new();
    services
        .values()
        .filter_map(|info| {
            let base = info.service_type.base();
            seen.insert(base.clone()).then(|| Record::Ptr {
                domain: META_QUERY_NAME.to_string(),
                class: Class::IN,
                target: base,
                ttl: RECORD_TTL,
            })
        })
        .collect()
}

/// A known answer the querier already holds suppresses our answer only if
/// its remaining TTL is still at least half of what we'd advertise (RFC 6762
/// §7.1).
fn is_suppressed_by_known_answer(candidate: &Record, known: &[&Record]) -> bool {
    known
        .iter()
        .any(|k| k.same_identity(candidate) && k.ttl() * 2 >= candidate.ttl())
}

#[tracing::instrument(skip_all)]
pub(crate) fn handle_query(inner: &Arc<EngineInner>, packet: &DnsPacket) {
    if packet.questions.is_empty() {
        return;
    }

    let known: Vec<&Record> = packet.all_records().collect();
    let mut message = OutgoingMessage::response();
    let mut has_answer = false;

    for question in &packet.questions {
        let candidates = if question.qtype == RecordType::Ptr
            && question.name.eq_ignore_ascii_case(META_QUERY_NAME)
        {
            meta_service_type_records(inner)
        } else {
            authoritative_records_for(inner, &question.name, question.qtype)
        };
        for record in candidates {
            if is_suppressed_by_known_answer(&record, &known) {
                continue;
            }
            message.add_answer(record);
            has_answer = true;
        }
    }

    if !has_answer {
        return;
    }

    send_message(inner, &message);
}

pub(crate) fn send_records(inner: &Arc<EngineInner>, records: Vec<Record>) {
    let mut message = OutgoingMessage::response();
    for record in records {
        message.add_answer(record);
    }
    send_message(inner, &message);
}

pub(crate) fn send_message(inner: &Arc<EngineInner>, message: &OutgoingMessage) {
    let mut packet = message.packet();
    let buffer = match packet.create_buffer() {
        Ok(buffer) => buffer,
        Err(error) => {
            tracing::warn!(%error, "failed to encode outgoing message");
            return;
        }
    };
    if let Err(error) = inner.transport.send(&buffer.buf[..buffer.pos()]) {
        tracing::debug!(%error, "failed to send datagram");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_append_a_numeric_suffix_on_collision() {
        assert_eq!(bump_instance_name("printer"), "printer-2");
        assert_eq!(bump_instance_name("printer-2"), "printer-3");
    }
}
