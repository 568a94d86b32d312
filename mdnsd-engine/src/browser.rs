use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mdnsd_proto::packet::question::Question;
use mdnsd_proto::packet::record::Record;
use mdnsd_proto::packet::{DnsPacket, OutgoingMessage, RecordType};

use crate::listener::{ServiceEvent, ServiceListener};
use crate::name::ServiceTypeName;
use crate::reactor::TaskKind;
use crate::responder::{send_message, META_QUERY_NAME};
use crate::service_info::ServiceInfo;
use crate::EngineInner;

const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 60 * 60 * 1_000;

pub(crate) struct BrowserEntry {
    pub(crate) service_type: ServiceTypeName,
    listener: Arc<dyn ServiceListener>,
    seen: Mutex<HashSet<String>>,
    cancelled: Arc<AtomicBool>,
}

/// A handle to an active browse operation. Dropping it does not cancel the
/// browse; call `cancel()` explicitly, matching the engine's cooperative
/// shutdown style elsewhere.
#[derive(Clone)]
pub struct BrowserHandle {
    cancelled: Arc<AtomicBool>,
}

impl BrowserHandle {
    /// Idempotent: deschedules future queries for this browser before its
    /// next scheduled query fires. Any callback already in flight still
    /// completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[tracing::instrument(skip(inner, listener), fields(service_type = %service_type))]
pub(crate) fn start(
    inner: &Arc<EngineInner>,
    service_type: ServiceTypeName,
    listener: Arc<dyn ServiceListener>,
) -> BrowserHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let entry = BrowserEntry {
        service_type: service_type.clone(),
        listener,
        seen: Mutex::new(HashSet::new()),
        cancelled: cancelled.clone(),
    };
    inner
        .browsers
        .lock()
        .expect("browsers mutex poisoned")
        .push(entry);

    let now = inner.clock.now_ms();
    inner.scheduler.lock().expect("scheduler mutex poisoned").schedule(
        now,
        TaskKind::BrowserQuery {
            service_type: service_type.to_string(),
            backoff_ms: INITIAL_BACKOFF_MS,
        },
    );

    BrowserHandle { cancelled }
}

pub(crate) fn run_query_tick(inner: &Arc<EngineInner>, service_type: &str, backoff_ms: u64) {
    let still_active = inner
        .browsers
        .lock()
        .expect("browsers mutex poisoned")
        .iter()
        .any(|b| !b.cancelled.load(Ordering::SeqCst) && matches_type(&b.service_type, service_type));
    if !still_active {
        return;
    }

    let mut message = OutgoingMessage::query(0);
    message.add_question(Question::new(service_type.to_string(), RecordType::Ptr));
    send_message(inner, &message);

    let next_backoff = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
    let now = inner.clock.now_ms();
    inner.scheduler.lock().expect("scheduler mutex poisoned").schedule(
        now + next_backoff as i64,
        TaskKind::BrowserQuery {
            service_type: service_type.to_string(),
            backoff_ms: next_backoff,
        },
    );
}

fn matches_type(service_type: &ServiceTypeName, candidate: &str) -> bool {
    service_type.base().eq_ignore_ascii_case(candidate)
        || service_type.to_string().eq_ignore_ascii_case(candidate)
}

#[tracing::instrument(skip_all)]
pub(crate) fn handle_response(inner: &Arc<EngineInner>, packet: &DnsPacket) {
    for record in packet.all_records() {
        inner.cache.add(record.clone());
    }
    if packet.all_records().next().is_some() {
        // Wake any call blocked in `get_service_info`/`find_service_types`
        // waiting on exactly these cache writes; the mutex only exists to
        // satisfy `Condvar::wait`, so briefly locking it here is enough.
        drop(inner.cache_gate.lock().expect("cache gate mutex poisoned"));
        inner.cache_cond.notify_all();
    }

    let browsers = inner.browsers.lock().expect("browsers mutex poisoned");
    for browser in browsers.iter() {
        if browser.cancelled.load(Ordering::SeqCst) {
            continue;
        }
        process_ptr_transitions(inner, browser, packet);
        process_instance_completions(inner, browser, packet);
    }
}

fn process_ptr_transitions(inner: &Arc<EngineInner>, browser: &BrowserEntry, packet: &DnsPacket) {
    for record in packet.all_records() {
        let Record::Ptr { domain, target, ttl, .. } = record else {
            continue;
        };
        if !matches_type(&browser.service_type, domain) {
            continue;
        }

        if *ttl == 0 {
            let removed = browser.seen.lock().expect("seen mutex poisoned").remove(target);
            if removed {
                browser
                    .listener
                    .service_event(ServiceEvent::Removed { instance_name: target.clone() });
            }
            continue;
        }

        try_assemble_and_emit(inner, browser, target);
    }
}

fn process_instance_completions(inner: &Arc<EngineInner>, browser: &BrowserEntry, packet: &DnsPacket) {
    for record in packet.all_records() {
        let domain = match record {
            Record::Srv { domain, .. } | Record::Txt { domain, .. } | Record::A { domain, .. } => domain,
            _ => continue,
        };
        try_assemble_and_emit(inner, browser, domain);
    }
}

fn try_assemble_and_emit(inner: &Arc<EngineInner>, browser: &BrowserEntry, instance_fqdn: &str) {
    {
        let seen = browser.seen.lock().expect("seen mutex poisoned");
        if seen.contains(instance_fqdn) {
            return;
        }
    }

    let records = inner.cache.entries_with_name(instance_fqdn);
    let Some(info) = ServiceInfo::from_records(browser.service_type.clone(), instance_fqdn, &records) else {
        return;
    };

    let mut seen = browser.seen.lock().expect("seen mutex poisoned");
    if !seen.insert(instance_fqdn.to_string()) {
        return;
    }
    drop(seen);

    browser.listener.service_event(ServiceEvent::Added(Arc::new(info)));
}

/// Active-expiry sweep: anything the cache drops for having fully expired is
/// treated the same as an explicit goodbye for any browser watching its type.
pub(crate) fn run_expire_tick(inner: &Arc<EngineInner>) {
    let expired = inner.cache.expire();
    if expired.is_empty() {
        return;
    }

    let browsers = inner.browsers.lock().expect("browsers mutex poisoned");
    for record in &expired {
        let Record::Ptr { domain, target, .. } = record else {
            continue;
        };
        for browser in browsers.iter() {
            if browser.cancelled.load(Ordering::SeqCst) || !matches_type(&browser.service_type, domain) {
                continue;
            }
            let removed = browser.seen.lock().expect("seen mutex poisoned").remove(target);
            if removed {
                browser
                    .listener
                    .service_event(ServiceEvent::Removed { instance_name: target.clone() });
            }
        }
    }
}

/// Blocking point lookup for one service instance: issues SRV/TXT queries,
/// then waits on the cache's write condvar until both (plus an A record)
/// have arrived or `timeout` elapses, re-checking the cache each time it
/// wakes rather than on a fixed poll interval. Used outside the reactor
/// thread, so it waits on real wall-clock time rather than the engine's
/// injected clock.
pub(crate) fn get_service_info(
    inner: &Arc<EngineInner>,
    service_type: ServiceTypeName,
    instance_name: &str,
    timeout: Duration,
) -> Option<ServiceInfo> {
    let fqdn = format!("{instance_name}.{}", service_type.base());

    let mut message = OutgoingMessage::query(0);
    message.add_question(Question::new(fqdn.clone(), RecordType::Srv));
    message.add_question(Question::new(fqdn.clone(), RecordType::Txt));
    send_message(inner, &message);

    let deadline = Instant::now() + timeout;
    loop {
        let records = inner.cache.entries_with_name(&fqdn);
        if let Some(info) = ServiceInfo::from_records(service_type.clone(), &fqdn, &records) {
            return Some(info);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        let guard = inner.cache_gate.lock().expect("cache gate mutex poisoned");
        let _ = inner.cache_cond.wait_timeout(guard, deadline - now);
    }
}

/// Blocking enumeration of distinct service types currently advertised on
/// the link: queries the enumeration meta-name and waits out the full
/// `timeout` window (new types can keep arriving throughout it), waking on
/// the cache's write condvar instead of polling.
pub(crate) fn find_service_types(inner: &Arc<EngineInner>, timeout: Duration) -> HashSet<String> {
    let mut message = OutgoingMessage::query(0);
    message.add_question(Question::new(META_QUERY_NAME.to_string(), RecordType::Ptr));
    send_message(inner, &message);

    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let guard = inner.cache_gate.lock().expect("cache gate mutex poisoned");
        let _ = inner.cache_cond.wait_timeout(guard, deadline - now);
    }

    inner
        .cache
        .get(META_QUERY_NAME, RecordType::Ptr)
        .into_iter()
        .filter_map(|record| match record {
            Record::Ptr { target, .. } => Some(target),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_match_both_the_base_and_full_subtype_name() {
        let service_type = crate::name::parse_service_type_name("printer._sub._http._tcp.local.").unwrap();
        assert!(matches_type(&service_type, "_http._tcp.local."));
        assert!(matches_type(&service_type, "printer._sub._http._tcp.local."));
        assert!(!matches_type(&service_type, "_ftp._tcp.local."));
    }
}
