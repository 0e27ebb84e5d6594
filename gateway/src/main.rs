use std::net::SocketAddr;

use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    config.validate()?;

    let listen_address: SocketAddr = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or_else(Args::default_listen_address);

    let shutdown_signal = CancellationToken::new();
    let shutdown_signal_for_ctrl_c = shutdown_signal.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_signal_for_ctrl_c.cancel();
        }
    });

    server::serve(ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter: args.log,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}
