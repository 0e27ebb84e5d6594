use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// LLM response and orchestration gateway.
#[derive(Debug, Parser)]
#[command(name = "gateway", version)]
pub struct Args {
    /// Path to the gateway TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Socket address to listen on, overriding `server.listen_address` from the config file.
    #[arg(short, long, env = "GATEWAY_LISTEN_ADDRESS")]
    pub listen_address: Option<SocketAddr>,

    /// Log filter string, e.g. `info` or `server=debug,llm=debug`.
    #[arg(long, env = "GATEWAY_LOG", default_value = "info")]
    pub log: String,
}

impl Args {
    /// Default listen address used when neither the CLI flag nor the config file set one.
    pub fn default_listen_address() -> SocketAddr {
        "127.0.0.1:8000".parse().expect("valid default listen address")
    }
}
