use clap::Args;
use std::net::Ipv4Addr;

use mdnsd_engine::ServiceInfoBuilder;
use mdnsd_net::InterfaceSelector;

use crate::zeroconf::Zeroconf;

/// Advertise a local service over mDNS/DNS-SD until interrupted
#[derive(Args, Debug)]
pub struct Command {
    /// Service type, e.g. `_http._tcp.local.`
    service_type: String,
    /// Instance name, e.g. `my-printer`
    instance_name: String,
    port: u16,
    /// Repeatable `key=value` TXT properties
    #[arg(short = 'p', long = "property")]
    properties: Vec<String>,
}

impl Command {
    pub fn run(self, config: crate::config::Config) {
        let selector = InterfaceSelector::parse(&config.interfaces);
        let mut zeroconf = Zeroconf::new(&selector).expect("unable to start mdns transport");

        let mut builder = ServiceInfoBuilder::new()
            .service_type(self.service_type)
            .instance_name(self.instance_name)
            .port(self.port);

        for raw in &self.properties {
            match raw.split_once('=') {
                Some((key, value)) => builder = builder.property(key, value),
                None => builder = builder.property(raw.as_str(), ""),
            }
        }

        let address = zeroconf
            .local_addrs()
            .into_iter()
            .next()
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        builder = builder.address(address);

        let info = builder.build().expect("invalid service type");
        let registered = zeroconf.register_service(info);
        tracing::info!(
            instance = %registered.instance_fqdn(),
            address = %registered.address,
            port = registered.port,
            "registered service, press ctrl-c to stop"
        );

        // Runs until the process is killed. A clean SIGINT handler that sends
        // the goodbye broadcast before exiting is left for a later pass.
        loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        }
    }
}
