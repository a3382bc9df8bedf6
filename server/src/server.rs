//! TCP side of the server: accept loop, per-connection reader and
//! writer tasks, and the bounded line framing of the wire codec.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use quiznet_core::types::{ClientId, MAX_LINE_LEN};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::context::ApplicationContext;
use crate::dispatcher;

/// Accept connections until shutdown.
pub async fn run_server(context: Arc<ApplicationContext>) -> anyhow::Result<()> {
    let host = format!("0.0.0.0:{}", context.config.tcp_port);
    let listener = TcpListener::bind(&host).await?;
    info!("Server started at {}", host);

    let mut shutdown_rx = context.shutdown_receiver();
    loop {
        select! {
            _ = shutdown_rx.changed() => {
                info!("Stop accepting connections");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let context = context.clone();
                        tokio::spawn(async move {
                            handle_connection(context, stream, peer).await;
                        });
                    }
                    Err(e) => warn!("Accept error: {}", e),
                }
            }
        }
    }
    Ok(())
}

async fn handle_connection(
    context: Arc<ApplicationContext>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let Some(registration) = context.hub.register(peer).await else {
        // Table full: close immediately, nothing else to say.
        drop(stream);
        return;
    };
    let client_id = registration.client_id;
    info!("Client {} connected from {}", client_id, peer);

    let (read_half, write_half) = stream.into_split();
    let writer = tokio::spawn(write_loop(registration.outbound_rx, write_half));

    if let Err(e) = read_loop(&context, client_id, read_half, registration.close_rx).await {
        debug!("Client {} read error: {}", client_id, e);
    }

    // Disconnect path: drain out of any session, then drop the table
    // entry; dropping it closes the outbound queue and ends the writer.
    if let Some(session_id) = context.hub.unregister(client_id).await {
        context.sessions.leave(session_id, client_id).await;
    }
    let _ = writer.await;
    info!("Client {} disconnected", client_id);
}

async fn write_loop(mut outbound_rx: mpsc::Receiver<String>, mut write_half: OwnedWriteHalf) {
    while let Some(line) = outbound_rx.recv().await {
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if write_half.write_all(b"\n").await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

async fn read_loop(
    context: &Arc<ApplicationContext>,
    client_id: ClientId,
    read_half: OwnedReadHalf,
    mut close_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut reader = BufReader::new(read_half);

    loop {
        let header = select! {
            _ = close_rx.changed() => break,
            line = read_frame_line(&mut reader) => match line? {
                Some(line) => line,
                None => break,
            }
        };

        // POST carries exactly one JSON body line after the header.
        let body = if header.starts_with("POST ") {
            let body = select! {
                _ = close_rx.changed() => break,
                line = read_frame_line(&mut reader) => match line? {
                    Some(line) => line,
                    None => break,
                }
            };
            Some(body)
        } else {
            None
        };

        let response =
            dispatcher::handle_request(context, client_id, &header, body.as_deref()).await;
        match serde_json::to_string(&response) {
            Ok(line) => context.hub.send_to(client_id, line).await,
            Err(e) => error!("Failed to serialize response: {}", e),
        }
    }
    Ok(())
}

/// Read one LF-terminated line, bounded at the wire limit.  Returns
/// `None` on a clean EOF; an oversized or non-UTF-8 line is an error
/// and disconnects the peer.
async fn read_frame_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line: Vec<u8> = Vec::new();
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-line",
            ));
        }
        match buf.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                line.extend_from_slice(&buf[..pos]);
                reader.consume(pos + 1);
                break;
            }
            None => {
                line.extend_from_slice(buf);
                let n = buf.len();
                reader.consume(n);
            }
        }
        if line.len() > MAX_LINE_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
        }
    }
    if line.len() > MAX_LINE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "line is not UTF-8"))
}
