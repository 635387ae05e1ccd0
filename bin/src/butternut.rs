// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `butternut-dns` binary: loads a configuration, binds the listen
//! address over UDP and TCP, and forwards until stopped.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use butternut_proto::runtime::TokioRuntimeProvider;
use butternut_server::config::Config;
use butternut_server::{bind_tcp, bind_udp, Error, ServerFuture};

/// A zone-routing DNS forwarding proxy
#[derive(Debug, Parser)]
#[command(name = "butternut-dns", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Address to listen on; overrides the configuration file
    #[arg(short = 'l', long = "listen")]
    listen: Option<SocketAddr>,

    /// Turn on debug logging
    #[arg(long = "debug")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::read_config(&cli.config)?;
    let listen = cli
        .listen
        .or(config.listen())
        .ok_or_else(|| Error::Msg("no listen address configured".to_string()))?;
    let forward = config.forward_config()?;

    let mut server = ServerFuture::new(forward, TokioRuntimeProvider::new());

    let udp = bind_udp(listen).await?;
    let tcp = bind_tcp(listen).await?;
    info!(%listen, "butternut-dns forwarding");

    server.register_socket(udp);
    server.register_listener(tcp);
    server.block_until_done().await
}
