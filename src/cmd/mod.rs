pub mod browse;
pub mod register;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Host-side multicast DNS / DNS-SD registrar and browser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long, env = "CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Local interfaces to bind: comma-separated dotted quads, or "all"
    #[arg(long, global = true)]
    interfaces: Option<String>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    inner: Commands,
}

impl Args {
    pub fn run(self) {
        let mut config = crate::config::Config::load(self.config_path.as_deref());
        if let Some(interfaces) = self.interfaces {
            config.interfaces = interfaces;
        }
        config.verbose = config.verbose || self.verbose;

        match self.inner {
            Commands::Register(inner) => inner.run(config),
            Commands::Browse(inner) => inner.run(config),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Register(register::Command),
    Browse(browse::Command),
}
