pub mod browser;
pub mod listener;
pub mod name;
mod reactor;
pub mod responder;
pub mod service_info;
pub mod transport;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use mdnsd_cache::{CacheService, Clock};
use mdnsd_proto::packet::record::Record;

pub use browser::BrowserHandle;
pub use listener::{ServiceEvent, ServiceListener};
pub use name::{parse_service_type_name, BadTypeInName, Protocol, ServiceTypeName};
pub use service_info::{ServiceInfo, ServiceInfoBuilder};
pub use transport::Transport;

use reactor::Scheduler;

/// State shared between the reactor thread and the public `Engine` handle.
/// Every field here is guarded independently rather than behind one coarse
/// lock, since the reactor and a caller's API call touch disjoint fields
/// most of the time (e.g. a browser registering while a query is answered).
pub(crate) struct EngineInner {
    pub(crate) cache: Arc<dyn CacheService>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) services: Mutex<HashMap<String, ServiceInfo>>,
    pub(crate) browsers: Mutex<Vec<browser::BrowserEntry>>,
    pub(crate) goodbyes: Mutex<HashMap<String, Vec<Record>>>,
    pub(crate) scheduler: Mutex<Scheduler>,
    pub(crate) stop_rx: crossbeam_channel::Receiver<()>,
    /// Signalled every time a response datagram adds records to `cache`, so
    /// a blocking call like `get_service_info` wakes as soon as an answer it
    /// cares about might have arrived instead of polling on a fixed timer.
    pub(crate) cache_gate: Mutex<()>,
    pub(crate) cache_cond: Condvar,
}

/// A running responder/browser engine: one reactor thread, one cache, one
/// registered-service table, a set of live browsers. Each instance is
/// independent — there is no process-global engine state.
pub struct Engine {
    inner: Arc<EngineInner>,
    stop_tx: crossbeam_channel::Sender<()>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Engine {
    pub fn new(cache: Arc<dyn CacheService>, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let inner = Arc::new(EngineInner {
            cache,
            transport,
            clock,
            services: Mutex::new(HashMap::new()),
            browsers: Mutex::new(Vec::new()),
            goodbyes: Mutex::new(HashMap::new()),
            scheduler: Mutex::new(Scheduler::default()),
            stop_rx,
            cache_gate: Mutex::new(()),
            cache_cond: Condvar::new(),
        });

        {
            let now = inner.clock.now_ms();
            inner
                .scheduler
                .lock()
                .expect("scheduler mutex poisoned")
                .schedule(now + 1_000, reactor::TaskKind::CacheExpire);
        }

        let thread = reactor::spawn(inner.clone());
        Self {
            inner,
            stop_tx,
            thread: Some(thread),
        }
    }

    #[tracing::instrument(skip(self, info), fields(service_type = %info.service_type))]
    pub fn register_service(&self, info: ServiceInfo) -> ServiceInfo {
        responder::register(&self.inner, info)
    }

    pub fn unregister_service(&self, instance_fqdn: &str) -> bool {
        responder::unregister(&self.inner, instance_fqdn)
    }

    pub fn browse(&self, service_type: ServiceTypeName, listener: Arc<dyn ServiceListener>) -> BrowserHandle {
        browser::start(&self.inner, service_type, listener)
    }

    pub fn get_service_info(
        &self,
        service_type: ServiceTypeName,
        instance_name: &str,
        timeout: Duration,
    ) -> Option<ServiceInfo> {
        browser::get_service_info(&self.inner, service_type, instance_name, timeout)
    }

    /// Enumerates service types currently announced on the link (RFC 6763
    /// §9): queries the `_services._dns-sd._udp.local.` meta-name and
    /// collects whatever distinct types answer within `timeout`.
    pub fn find_service_types(&self, timeout: Duration) -> HashSet<String> {
        browser::find_service_types(&self.inner, timeout)
    }

    /// The local IPv4 addresses the underlying transport is bound on, for
    /// callers that need to fill in an `A` record for a service registered
    /// without an explicit address.
    pub fn local_addrs(&self) -> Vec<std::net::Ipv4Addr> {
        self.inner.transport.local_addrs()
    }

    /// Unblocks the reactor, joins its thread. Idempotent across repeated
    /// calls (a second `close()` is a no-op once the thread handle is taken).
    pub fn close(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Err(error) = self.inner.transport.wake() {
            tracing::debug!(%error, "failed to wake reactor for shutdown");
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}
