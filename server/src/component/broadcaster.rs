//! The broadcaster pushes session events to connected clients.
//!
//! It serializes each event once, then fans the line out to the target
//! clients' outbound queues.  Sockets are never touched here, so a
//! slow client can only overflow its own queue.

use std::sync::Arc;

use async_trait::async_trait;
use quiznet_core::types::SessionId;
use tracing::{debug, warn};

use crate::component::common::{CloseReason, Component, ConsumerPorts, Ports};
use crate::frame::OutFrame;
use crate::hub::ClientHub;

pub struct BroadcasterContext {
    session_id: SessionId,
    hub: Arc<ClientHub>,
}

pub struct Broadcaster {}

impl Broadcaster {
    pub fn init(session_id: SessionId, hub: Arc<ClientHub>) -> (Self, BroadcasterContext) {
        (Self {}, BroadcasterContext { session_id, hub })
    }
}

#[async_trait]
impl Component<ConsumerPorts<OutFrame>, BroadcasterContext> for Broadcaster {
    fn name() -> &'static str {
        "Broadcaster"
    }

    async fn run(mut ports: ConsumerPorts<OutFrame>, ctx: BroadcasterContext) {
        while let Some(frame) = ports.recv().await {
            match frame {
                OutFrame::Send { targets, event } => {
                    debug!("[{}] Broadcast: {}", ctx.session_id, event);
                    let line = match serde_json::to_string(&event) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("[{}] Failed to serialize event: {}", ctx.session_id, e);
                            continue;
                        }
                    };
                    ctx.hub.send_to_many(&targets, &line).await;
                }
                OutFrame::Shutdown => {
                    debug!("[{}] Shutdown broadcaster", ctx.session_id);
                    break;
                }
            }
        }
        ports.close(CloseReason::Complete);
    }
}
