use quiznet_core::error::Result;
use quiznet_core::types::{
    AnswerValue, ClientId, JokerKind, ServerEvent, SessionId, SessionSummary,
};
use tokio::sync::oneshot;

/// Server-level supervision signals.
#[derive(Debug)]
pub enum SignalFrame {
    RemoveSession { session_id: SessionId },
    Shutdown,
}

/// What a successful join reports back to the dispatcher.
#[derive(Debug, PartialEq, Eq)]
pub struct JoinReply {
    pub session_id: SessionId,
    pub players: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JokerReply {
    Fifty { remaining: Vec<String> },
    Skip,
}

/// Input frames of a session event loop.  Everything that can touch a
/// session funnels through these, so the state machine runs strictly
/// one frame at a time.
#[derive(Debug)]
pub enum SessionFrame {
    Join {
        client_id: ClientId,
        pseudo: String,
        reply: oneshot::Sender<Result<JoinReply>>,
    },
    Leave {
        client_id: ClientId,
    },
    Start {
        client_id: ClientId,
        reply: oneshot::Sender<Result<()>>,
    },
    Answer {
        client_id: ClientId,
        answer: AnswerValue,
        response_time: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    Joker {
        client_id: ClientId,
        kind: JokerKind,
        reply: oneshot::Sender<Result<JokerReply>>,
    },
    Describe {
        reply: oneshot::Sender<SessionSummary>,
    },
    Shutdown,
}

impl std::fmt::Display for SessionFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFrame::Join { pseudo, .. } => write!(f, "Join: {}", pseudo),
            SessionFrame::Leave { client_id } => write!(f, "Leave: {}", client_id),
            SessionFrame::Start { client_id, .. } => write!(f, "Start: {}", client_id),
            SessionFrame::Answer { client_id, .. } => write!(f, "Answer: {}", client_id),
            SessionFrame::Joker {
                client_id, kind, ..
            } => write!(f, "Joker: {} by {}", kind_str(kind), client_id),
            SessionFrame::Describe { .. } => write!(f, "Describe"),
            SessionFrame::Shutdown => write!(f, "Shutdown"),
        }
    }
}

fn kind_str(kind: &JokerKind) -> &'static str {
    match kind {
        JokerKind::Fifty => "fifty",
        JokerKind::Skip => "skip",
    }
}

/// Output frames of a session event loop, consumed by its broadcaster.
#[derive(Debug, Clone)]
pub enum OutFrame {
    Send {
        targets: Vec<ClientId>,
        event: ServerEvent,
    },
    Shutdown,
}

impl std::fmt::Display for OutFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutFrame::Send { targets, event } => {
                write!(f, "Send to {} clients: {}", targets.len(), event)
            }
            OutFrame::Shutdown => write!(f, "Shutdown"),
        }
    }
}
