//! Manage session instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use quiznet_core::bank::QuestionBank;
use quiznet_core::error::{Error, Result};
use quiznet_core::types::{
    AnswerValue, ClientId, JokerKind, SessionId, SessionRules, SessionSummary,
};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::component::common::CloseReason;
use crate::frame::{JoinReply, JokerReply, SessionFrame, SignalFrame};
use crate::hub::ClientHub;
use crate::session::handle::SessionHandle;

pub const MAX_SESSIONS: usize = 20;

pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }
}

fn wait_and_unload(
    session_id: SessionId,
    join_handle: JoinHandle<CloseReason>,
    signal_tx: mpsc::Sender<SignalFrame>,
) {
    tokio::spawn(async move {
        match join_handle.await {
            Ok(CloseReason::Complete) => {
                info!("Session {} stopped", session_id);
            }
            Ok(CloseReason::Fault(e)) => {
                warn!("Session {} stopped with fault: {}", session_id, e);
            }
            Err(e) => {
                error!("Unexpected error while waiting session to stop: {}", e);
            }
        }
        if signal_tx
            .send(SignalFrame::RemoveSession { session_id })
            .await
            .is_err()
        {
            // Server is already shutting down.
        }
    });
}

impl SessionManager {
    /// Create a session.  The question sequence is drawn here, so an
    /// impossible theme/difficulty combination fails before any slot
    /// is taken.
    pub async fn create_session(
        &self,
        rules: SessionRules,
        creator: ClientId,
        bank: Arc<QuestionBank>,
        hub: Arc<ClientHub>,
        slowest_penalty: bool,
        signal_tx: mpsc::Sender<SignalFrame>,
    ) -> Result<SessionId> {
        let question_ids = bank.select(&rules.theme_ids, rules.difficulty, rules.nb_questions)?;

        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= MAX_SESSIONS {
            return Err(Error::TooManySessions);
        }
        let session_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut handle = SessionHandle::new(
            session_id,
            rules,
            creator,
            question_ids,
            bank,
            hub,
            slowest_penalty,
        )?;
        let join_handle = handle.wait();
        sessions.insert(session_id, handle);
        wait_and_unload(session_id, join_handle, signal_tx);
        Ok(session_id)
    }

    pub async fn remove_session(&self, session_id: SessionId) {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(&session_id).is_some() {
            info!("Clean session handle: {}", session_id);
        }
    }

    async fn input_of(&self, session_id: SessionId) -> Result<mpsc::Sender<SessionFrame>> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&session_id)
            .map(|h| h.input())
            .ok_or(Error::SessionNotFound(session_id))
    }

    pub async fn join(
        &self,
        session_id: SessionId,
        client_id: ClientId,
        pseudo: &str,
    ) -> Result<JoinReply> {
        let input = self.input_of(session_id).await?;
        let (tx, rx) = oneshot::channel();
        input
            .send(SessionFrame::Join {
                client_id,
                pseudo: pseudo.to_owned(),
                reply: tx,
            })
            .await
            .map_err(|_| Error::SessionNotFound(session_id))?;
        rx.await.map_err(|_| Error::SessionNotFound(session_id))?
    }

    /// Drain a client out of a session; fire-and-forget.
    pub async fn leave(&self, session_id: SessionId, client_id: ClientId) {
        if let Ok(input) = self.input_of(session_id).await {
            if input.send(SessionFrame::Leave { client_id }).await.is_err() {
                // The session already finished; nothing to leave.
            }
        }
    }

    pub async fn start(&self, session_id: SessionId, client_id: ClientId) -> Result<()> {
        let input = self.input_of(session_id).await?;
        let (tx, rx) = oneshot::channel();
        input
            .send(SessionFrame::Start {
                client_id,
                reply: tx,
            })
            .await
            .map_err(|_| Error::SessionNotFound(session_id))?;
        rx.await.map_err(|_| Error::SessionNotFound(session_id))?
    }

    pub async fn answer(
        &self,
        session_id: SessionId,
        client_id: ClientId,
        answer: AnswerValue,
        response_time: f64,
    ) -> Result<()> {
        let input = self.input_of(session_id).await?;
        let (tx, rx) = oneshot::channel();
        input
            .send(SessionFrame::Answer {
                client_id,
                answer,
                response_time,
                reply: tx,
            })
            .await
            .map_err(|_| Error::SessionNotFound(session_id))?;
        rx.await.map_err(|_| Error::SessionNotFound(session_id))?
    }

    pub async fn use_joker(
        &self,
        session_id: SessionId,
        client_id: ClientId,
        kind: JokerKind,
    ) -> Result<JokerReply> {
        let input = self.input_of(session_id).await?;
        let (tx, rx) = oneshot::channel();
        input
            .send(SessionFrame::Joker {
                client_id,
                kind,
                reply: tx,
            })
            .await
            .map_err(|_| Error::SessionNotFound(session_id))?;
        rx.await.map_err(|_| Error::SessionNotFound(session_id))?
    }

    /// Snapshot every live session for `GET sessions/list`.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let inputs: Vec<mpsc::Sender<SessionFrame>> = {
            let sessions = self.sessions.lock().await;
            sessions.values().map(|h| h.input()).collect()
        };
        let mut summaries = Vec::with_capacity(inputs.len());
        for input in inputs {
            let (tx, rx) = oneshot::channel();
            if input.send(SessionFrame::Describe { reply: tx }).await.is_err() {
                continue;
            }
            if let Ok(summary) = rx.await {
                summaries.push(summary);
            }
        }
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Ask one session to stop; fire-and-forget.
    pub async fn close_session(&self, session_id: SessionId) {
        if let Ok(input) = self.input_of(session_id).await {
            let _ = input.send(SessionFrame::Shutdown).await;
        }
    }

    /// Ask every live session to stop.
    pub async fn shutdown(&self) {
        let sessions = self.sessions.lock().await;
        info!("Shutdown {} sessions", sessions.len());
        for handle in sessions.values() {
            let _ = handle.input().send(SessionFrame::Shutdown).await;
        }
    }
}
