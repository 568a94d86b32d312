use std::path::Path;

/// Defaults layered under repeated CLI invocations, per an optional TOML file
/// plus environment variables — so `--interfaces`/`--verbose`/`--timeout-ms`
/// need not be repeated on every call.
#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_interfaces")]
    pub interfaces: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "Config::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interfaces: Self::default_interfaces(),
            verbose: false,
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl Config {
    fn default_interfaces() -> String {
        "all".to_string()
    }

    fn default_timeout_ms() -> u64 {
        3_000
    }

    pub fn load(path: Option<&Path>) -> Self {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(::config::Environment::default().separator("_"));
        let conf = builder.build().expect("unable to build configuration");
        conf.try_deserialize()
            .expect("configuration format invalid")
    }
}
