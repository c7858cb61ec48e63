//! Server configuration
//!
//! Parsed from command line flags, falling back to environment variables
//! and then to defaults.

use std::time::Duration;

use clap::Parser;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 5000;

/// Interest-matched 1:1 WebSocket chat server
#[derive(Debug, Clone, Parser)]
#[command(name = "pairchat", version, about)]
pub struct ServerConfig {
    /// Host to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "PAIRCHAT_LOG", default_value = "info")]
    pub log_level: String,

    /// Capacity of the server command channel
    #[arg(long, default_value_t = 256)]
    pub command_buffer: usize,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, env = "PAIRCHAT_STATS_INTERVAL", default_value_t = 60)]
    pub stats_interval: u64,
}

impl ServerConfig {
    /// Address to hand to `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default tracing filter directive for this crate
    pub fn log_filter(&self) -> String {
        format!("pairchat={}", self.log_level)
    }

    /// Period of the stats log, if enabled
    pub fn stats_period(&self) -> Option<Duration> {
        (self.stats_interval > 0).then(|| Duration::from_secs(self.stats_interval))
    }
}
