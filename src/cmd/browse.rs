use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use mdnsd_engine::parse_service_type_name;
use mdnsd_net::InterfaceSelector;

use crate::zeroconf::{PrintingListener, Zeroconf};

/// Browse for instances of a service type and print additions/removals
#[derive(Args, Debug)]
pub struct Command {
    /// Service type to browse for, e.g. `_http._tcp.local.`
    service_type: String,
    /// How long to browse before exiting, in milliseconds; 0 runs forever
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Command {
    pub fn run(self, config: crate::config::Config) {
        let selector = InterfaceSelector::parse(&config.interfaces);
        let mut zeroconf = Zeroconf::new(&selector).expect("unable to start mdns transport");

        let service_type =
            parse_service_type_name(&self.service_type).expect("invalid service type");

        let listener = Arc::new(PrintingListener);
        let _handle = zeroconf.browse(service_type, listener);

        let timeout_ms = self.timeout_ms.unwrap_or(config.timeout_ms);
        if timeout_ms == 0 {
            loop {
                std::thread::sleep(Duration::from_secs(3600));
            }
        } else {
            std::thread::sleep(Duration::from_millis(timeout_ms));
        }

        zeroconf.close();
    }
}
