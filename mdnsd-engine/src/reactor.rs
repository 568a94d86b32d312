use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use mdnsd_proto::buffer::{BytePacketBuffer, MAX_MESSAGE_SIZE};
use mdnsd_proto::packet::DnsPacket;

use crate::{browser, responder, EngineInner};

/// Work the reactor re-checks on every tick: announce/goodbye backoff steps,
/// browser query re-asks, and the cache's active-expiry sweep.
#[derive(Debug, Clone)]
pub(crate) enum TaskKind {
    AnnounceStep { instance_fqdn: String, step: usize },
    GoodbyeStep { instance_fqdn: String, step: usize },
    BrowserQuery { service_type: String, backoff_ms: u64 },
    CacheExpire,
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    due_at_ms: i64,
    seq: u64,
    kind: TaskKind,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due_at_ms == other.due_at_ms && self.seq == other.seq
    }
}
impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_at_ms
            .cmp(&other.due_at_ms)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap of due times shared by every browser and the responder's
/// announce/goodbye schedules, rather than one timer thread per task.
#[derive(Default)]
pub(crate) struct Scheduler {
    heap: BinaryHeap<Reverse<ScheduledTask>>,
    next_seq: u64,
}

impl Scheduler {
    pub(crate) fn schedule(&mut self, due_at_ms: i64, kind: TaskKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledTask {
            due_at_ms,
            seq,
            kind,
        }));
    }

    /// Pops every task due at or before `now_ms`.
    pub(crate) fn drain_due(&mut self, now_ms: i64) -> Vec<TaskKind> {
        let mut due = Vec::new();
        while let Some(Reverse(task)) = self.heap.peek() {
            if task.due_at_ms > now_ms {
                break;
            }
            let Reverse(task) = self.heap.pop().unwrap();
            due.push(task.kind);
        }
        due
    }
}

/// How long `recv` blocks before the reactor re-checks its scheduler and
/// stop flag. Short enough that announce/goodbye steps (the tightest
/// schedule, spaced ~125 ms apart) fire on time.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) fn spawn(inner: Arc<EngineInner>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("mdnsd-reactor".to_string())
        .spawn(move || run(inner))
        .expect("failed to spawn reactor thread")
}

fn run(inner: Arc<EngineInner>) {
    if let Err(error) = inner.transport.set_read_timeout(Some(POLL_INTERVAL)) {
        tracing::warn!(%error, "failed to set transport read timeout");
    }

    let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
    loop {
        if inner.stop_rx.try_recv().is_ok() {
            break;
        }

        match inner.transport.recv(&mut buf) {
            Ok(len) => handle_datagram(&inner, &buf[..len]),
            Err(error) if is_timeout(&error) => {}
            Err(error) => tracing::debug!(%error, "transport receive error"),
        }

        if inner.stop_rx.try_recv().is_ok() {
            break;
        }

        run_due_tasks(&inner);
    }
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[tracing::instrument(skip_all)]
fn handle_datagram(inner: &Arc<EngineInner>, bytes: &[u8]) {
    let buffer = BytePacketBuffer::from_bytes(bytes);
    let packet = match DnsPacket::try_from(buffer) {
        Ok(packet) => packet,
        Err(error) => {
            tracing::debug!(%error, "dropping malformed packet");
            return;
        }
    };

    if packet.is_query() {
        responder::handle_query(inner, &packet);
    } else {
        browser::handle_response(inner, &packet);
    }
}

fn run_due_tasks(inner: &Arc<EngineInner>) {
    let now = inner.clock.now_ms();
    let due = {
        let mut scheduler = inner.scheduler.lock().expect("scheduler mutex poisoned");
        scheduler.drain_due(now)
    };

    for task in due {
        match task {
            TaskKind::AnnounceStep { instance_fqdn, step } => {
                responder::run_announce_step(inner, &instance_fqdn, step);
            }
            TaskKind::GoodbyeStep { instance_fqdn, step } => {
                responder::run_goodbye_step(inner, &instance_fqdn, step);
            }
            TaskKind::BrowserQuery {
                service_type,
                backoff_ms,
            } => {
                browser::run_query_tick(inner, &service_type, backoff_ms);
            }
            TaskKind::CacheExpire => {
                browser::run_expire_tick(inner);
                let mut scheduler = inner.scheduler.lock().expect("scheduler mutex poisoned");
                scheduler.schedule(now + 1_000, TaskKind::CacheExpire);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_drain_tasks_due_at_or_before_now() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(100, TaskKind::CacheExpire);
        scheduler.schedule(50, TaskKind::CacheExpire);
        scheduler.schedule(200, TaskKind::CacheExpire);

        let due = scheduler.drain_due(100);
        assert_eq!(due.len(), 2);
        assert!(scheduler.drain_due(100).is_empty());
        assert_eq!(scheduler.drain_due(200).len(), 1);
    }

    #[test]
    fn should_preserve_fifo_order_for_equal_due_times() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(
            10,
            TaskKind::BrowserQuery {
                service_type: "first".to_string(),
                backoff_ms: 1_000,
            },
        );
        scheduler.schedule(
            10,
            TaskKind::BrowserQuery {
                service_type: "second".to_string(),
                backoff_ms: 1_000,
            },
        );

        let due = scheduler.drain_due(10);
        match (&due[0], &due[1]) {
            (
                TaskKind::BrowserQuery { service_type: a, .. },
                TaskKind::BrowserQuery { service_type: b, .. },
            ) => {
                assert_eq!(a, "first");
                assert_eq!(b, "second");
            }
            _ => panic!("expected two browser query tasks"),
        }
    }
}
