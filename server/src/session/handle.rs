//! The handle to the component pair of one session.

use std::sync::Arc;

use quiznet_core::bank::QuestionBank;
use quiznet_core::error::{Error, Result};
use quiznet_core::types::{ClientId, QuestionId, SessionId, SessionRules};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::component::common::{CloseReason, Component, PortsHandle};
use crate::component::Broadcaster;
use crate::frame::{OutFrame, SessionFrame};
use crate::hub::ClientHub;
use crate::session::context::SessionContext;
use crate::session::event_loop::EventLoop;

pub struct SessionHandle {
    pub id: SessionId,
    input_tx: mpsc::Sender<SessionFrame>,
    loop_handle: PortsHandle<SessionFrame, OutFrame>,
    broadcaster_handle: PortsHandle<OutFrame, ()>,
}

impl SessionHandle {
    /// Spawn the event loop and its broadcaster, wired in a pipeline.
    pub fn new(
        id: SessionId,
        rules: SessionRules,
        creator: ClientId,
        question_ids: Vec<QuestionId>,
        bank: Arc<QuestionBank>,
        hub: Arc<ClientHub>,
        slowest_penalty: bool,
    ) -> Result<Self> {
        info!("Create session handle for {} ({})", id, rules.name);

        let session = SessionContext::new(id, rules, creator, question_ids, bank, slowest_penalty);
        let (_, loop_ctx) = EventLoop::init(session);
        let mut loop_handle = EventLoop::start(loop_ctx);

        let (_, broadcaster_ctx) = Broadcaster::init(id, hub);
        let broadcaster_handle = Broadcaster::start(broadcaster_ctx);

        let input_tx = loop_handle
            .input()
            .ok_or_else(|| Error::Internal("event loop has no input".into()))?;
        let broadcaster_tx = broadcaster_handle
            .input()
            .ok_or_else(|| Error::Internal("broadcaster has no input".into()))?;

        // Pump the loop's output into the broadcaster.
        let mut loop_output = loop_handle
            .take_output()
            .ok_or_else(|| Error::Internal("event loop has no output".into()))?;
        tokio::spawn(async move {
            while let Some(frame) = loop_output.recv().await {
                if broadcaster_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            id,
            input_tx,
            loop_handle,
            broadcaster_handle,
        })
    }

    pub fn input(&self) -> mpsc::Sender<SessionFrame> {
        self.input_tx.clone()
    }

    /// Wait until both components have stopped.
    pub fn wait(&mut self) -> JoinHandle<CloseReason> {
        let mut loop_close = std::mem::replace(
            &mut self.loop_handle,
            PortsHandle::drained(),
        );
        let mut broadcaster_close = std::mem::replace(
            &mut self.broadcaster_handle,
            PortsHandle::drained(),
        );
        tokio::spawn(async move {
            let mut close_reason = loop_close.wait().await;
            if let CloseReason::Fault(_) = broadcaster_close.wait().await {
                close_reason = CloseReason::Fault(Error::Internal("broadcaster fault".into()));
            }
            close_reason
        })
    }
}
