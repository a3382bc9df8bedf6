mod component;
mod context;
mod discovery;
mod dispatcher;
mod frame;
mod hub;
mod server;
mod session;
mod signals;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{arg, value_parser, Command};
use quiznet_env::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::context::ApplicationContext;

fn cli() -> Command {
    Command::new("quiznet-server")
        .about("Multiplayer quiz server for the local network.")
        .arg(
            arg!(--config [path] "The path to config file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(--tcp [port] "The TCP game port").value_parser(value_parser!(u16)))
        .arg(arg!(--udp [port] "The UDP discovery port").value_parser(value_parser!(u16)))
        .arg(arg!(--name [name] "The advertised server name"))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let (context, signal_loop) =
        ApplicationContext::try_new_and_start_signal_loop(config).await?;
    let context = Arc::new(context);

    signals::setup_signal_handler(context.signal_sender());

    let discovery = tokio::spawn({
        let context = context.clone();
        async move {
            if let Err(e) = discovery::run_discovery(context).await {
                error!("Discovery responder failed: {}", e);
            }
        }
    });

    server::run_server(context.clone()).await?;

    signal_loop.await?;
    let _ = discovery.await;
    info!("Clean shutdown");
    Ok(())
}

#[tokio::main]
pub async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => match Config::from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(port) = matches.get_one::<u16>("tcp") {
        config.tcp_port = *port;
    }
    if let Some(port) = matches.get_one::<u16>("udp") {
        config.udp_port = *port;
    }
    if let Some(name) = matches.get_one::<String>("name") {
        config.name = name.clone();
    }

    if let Err(e) = run(config).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}
