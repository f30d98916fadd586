//! Scanner configuration: an optional YAML file layered under environment
//! overrides (`DSBOOT_*`), with defaults drawn from the host's own resolver
//! configuration where that makes sense.

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ScanError;
use crate::query::QueryContext;
use crate::walker::DEFAULT_MAX_WALK_STEPS;

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Recursive nameservers to use. Empty means "read from the host's
    /// own resolver configuration at startup".
    #[serde(default)]
    pub nameservers: Vec<SocketAddr>,

    /// Mirrors `resolv.conf`'s `rotate` option: shuffle nameservers before
    /// each recursive query rather than always trying them in order.
    #[serde(default)]
    pub rotate: bool,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default = "default_max_walk_steps")]
    pub max_walk_steps: usize,

    /// Bounded concurrency for the job pool; defaults to the number of
    /// available CPUs.
    #[serde(default)]
    pub worker_pool_size: Option<usize>,
}

fn default_query_timeout_ms() -> u64 {
    DEFAULT_QUERY_TIMEOUT_MS
}

fn default_max_walk_steps() -> usize {
    DEFAULT_MAX_WALK_STEPS
}

impl ScannerConfig {
    /// Load configuration from an optional YAML file, overridden by
    /// `DSBOOT_*` environment variables (e.g. `DSBOOT_ROTATE=true`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(false));
        }
        builder = builder.add_source(Environment::with_prefix("DSBOOT").separator("_"));
        builder.build()?.try_deserialize()
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size.unwrap_or_else(num_cpus_or_one)
    }

    /// Build a [`QueryContext`], falling back to the host's system resolver
    /// configuration when no nameservers were explicitly configured.
    pub fn query_context(&self) -> Result<QueryContext, ScanError> {
        let (nameservers, rotate) = if self.nameservers.is_empty() {
            system_resolver_config()?
        } else {
            (self.nameservers.clone(), self.rotate)
        };
        Ok(QueryContext {
            recursive_nameservers: nameservers,
            rotate,
            timeout: self.query_timeout(),
        })
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            nameservers: Vec::new(),
            rotate: false,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            max_walk_steps: DEFAULT_MAX_WALK_STEPS,
            worker_pool_size: None,
        }
    }
}

fn system_resolver_config() -> Result<(Vec<SocketAddr>, bool), ScanError> {
    let (resolver_config, _opts) = hickory_resolver::system_conf::read_system_conf()?;
    let addrs = resolver_config
        .name_servers()
        .iter()
        .map(|ns| ns.socket_addr)
        .collect();
    Ok((addrs, false))
}

fn num_cpus_or_one() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
