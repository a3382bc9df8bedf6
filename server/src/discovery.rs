//! UDP discovery responder.
//!
//! Answers the fixed LAN probe with this server's name and TCP port.
//! Anything that is not the exact probe is ignored.

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::context::ApplicationContext;

pub const PROBE: &[u8] = b"looking for quiznet servers";

fn advertisement(name: &str, tcp_port: u16) -> String {
    format!("hello i'm a quiznet server:{}:{}", name, tcp_port)
}

pub async fn run_discovery(context: Arc<ApplicationContext>) -> anyhow::Result<()> {
    let host = format!("0.0.0.0:{}", context.config.udp_port);
    let socket = UdpSocket::bind(&host).await?;
    info!("Discovery responder started at {}", host);

    let reply = advertisement(&context.config.name, context.config.tcp_port);
    serve(socket, reply, context.shutdown_receiver()).await;
    Ok(())
}

async fn serve(socket: UdpSocket, reply: String, mut shutdown_rx: watch::Receiver<bool>) {
    let mut buf = [0u8; 128];
    loop {
        select! {
            _ = shutdown_rx.changed() => {
                info!("Stop discovery responder");
                break;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, peer) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Discovery receive error: {}", e);
                        continue;
                    }
                };
                if &buf[..len] != PROBE {
                    debug!("Ignore datagram from {}", peer);
                    continue;
                }
                if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
                    warn!("Failed to answer probe from {}: {}", peer, e);
                }
            }
        }
    }
}
