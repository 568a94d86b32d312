use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mdnsd_cache::{MemoryCache, SystemClock};
use mdnsd_engine::{BrowserHandle, Engine, ServiceEvent, ServiceInfo, ServiceListener, ServiceTypeName};
use mdnsd_net::{InterfaceSelector, MulticastTransport};

/// Bundles an `Engine` with a real `MulticastTransport`, so callers outside
/// `mdnsd-engine` never have to wire cache/transport/clock together by hand.
pub struct Zeroconf {
    engine: Engine,
}

impl Zeroconf {
    pub fn new(interfaces: &InterfaceSelector) -> std::io::Result<Self> {
        let transport = Arc::new(MulticastTransport::new(interfaces)?);
        let cache = Arc::new(MemoryCache::new(Arc::new(SystemClock)));
        let engine = Engine::new(cache, transport, Arc::new(SystemClock));
        Ok(Self { engine })
    }

    pub fn register_service(&self, info: ServiceInfo) -> ServiceInfo {
        self.engine.register_service(info)
    }

    pub fn unregister_service(&self, instance_fqdn: &str) -> bool {
        self.engine.unregister_service(instance_fqdn)
    }

    pub fn browse(&self, service_type: ServiceTypeName, listener: Arc<dyn ServiceListener>) -> BrowserHandle {
        self.engine.browse(service_type, listener)
    }

    pub fn get_service_info(
        &self,
        service_type: ServiceTypeName,
        instance_name: &str,
        timeout: Duration,
    ) -> Option<ServiceInfo> {
        self.engine.get_service_info(service_type, instance_name, timeout)
    }

    pub fn find_service_types(&self, timeout: Duration) -> HashSet<String> {
        self.engine.find_service_types(timeout)
    }

    pub fn local_addrs(&self) -> Vec<std::net::Ipv4Addr> {
        self.engine.local_addrs()
    }

    pub fn close(&mut self) {
        self.engine.close();
    }
}

/// Prints discovery transitions to stdout as they arrive.
pub struct PrintingListener;

impl ServiceListener for PrintingListener {
    fn service_event(&self, event: ServiceEvent) {
        match event {
            ServiceEvent::Added(info) => {
                println!(
                    "+ {} at {}:{} ({} propert{})",
                    info.instance_fqdn(),
                    info.address,
                    info.port,
                    info.properties.iter().count(),
                    if info.properties.iter().count() == 1 { "y" } else { "ies" }
                );
                for (key, value) in info.properties.iter() {
                    println!("    {key} = {value:?}");
                }
            }
            ServiceEvent::Removed { instance_name } => {
                println!("- {instance_name}");
            }
        }
    }
}
