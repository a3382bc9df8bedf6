//! The session event loop.
//!
//! One loop per session.  It reads frames from the inbox or, when a
//! timer is pending, races the inbox against the deadline.  Whatever
//! wins is handled to completion before the next frame, so members
//! always observe events in the same order and a finished session can
//! never emit a belated broadcast.

use async_trait::async_trait;
use tokio::select;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::component::common::{CloseReason, Component, PipelinePorts, Ports};
use crate::frame::{JoinReply, OutFrame, SessionFrame};
use crate::session::context::{Effect, SessionContext};

pub struct EventLoopContext {
    pub session: SessionContext,
}

pub struct EventLoop {}

impl EventLoop {
    pub fn init(session: SessionContext) -> (Self, EventLoopContext) {
        (Self {}, EventLoopContext { session })
    }
}

enum Input {
    Frame(SessionFrame),
    Timer,
    Closed,
}

/// Take the next frame from the inbox, or the pending timer when it
/// fires first.
async fn read_frame(
    ports: &mut PipelinePorts<SessionFrame, OutFrame>,
    session: &SessionContext,
) -> Input {
    if let Some(dispatch) = session.dispatch {
        if dispatch.deadline <= Instant::now() {
            return Input::Timer;
        }
        select! {
            frame = ports.recv() => match frame {
                Some(frame) => Input::Frame(frame),
                None => Input::Closed,
            },
            _ = sleep_until(dispatch.deadline) => Input::Timer,
        }
    } else {
        match ports.recv().await {
            Some(frame) => Input::Frame(frame),
            None => Input::Closed,
        }
    }
}

/// Push the effects of a transition out to the broadcaster.  Returns
/// whether the session reached its end.
async fn flush_effects(
    ports: &PipelinePorts<SessionFrame, OutFrame>,
    effects: Vec<Effect>,
) -> bool {
    let mut finished = false;
    for effect in effects {
        match effect {
            Effect::Send { targets, event } => {
                ports.send(OutFrame::Send { targets, event }).await;
            }
            Effect::Finished => finished = true,
        }
    }
    finished
}

#[async_trait]
impl Component<PipelinePorts<SessionFrame, OutFrame>, EventLoopContext> for EventLoop {
    fn name() -> &'static str {
        "Session Event Loop"
    }

    async fn run(mut ports: PipelinePorts<SessionFrame, OutFrame>, ctx: EventLoopContext) {
        let mut session = ctx.session;

        loop {
            let input = read_frame(&mut ports, &session).await;
            let now = Instant::now();

            let finished = match input {
                Input::Frame(frame) => {
                    debug!("[{}] Handle frame: {}", session.id, frame);
                    match frame {
                        SessionFrame::Join {
                            client_id,
                            pseudo,
                            reply,
                        } => {
                            let result = session.join(client_id, &pseudo);
                            match result {
                                Ok(effects) => {
                                    let _ = reply.send(Ok(JoinReply {
                                        session_id: session.id,
                                        players: session.player_pseudos(),
                                    }));
                                    flush_effects(&ports, effects).await
                                }
                                Err(e) => {
                                    let _ = reply.send(Err(e));
                                    false
                                }
                            }
                        }
                        SessionFrame::Leave { client_id } => {
                            let effects = session.leave(client_id, now);
                            flush_effects(&ports, effects).await
                        }
                        SessionFrame::Start { client_id, reply } => {
                            match session.start(client_id, now) {
                                Ok(effects) => {
                                    let _ = reply.send(Ok(()));
                                    flush_effects(&ports, effects).await
                                }
                                Err(e) => {
                                    let _ = reply.send(Err(e));
                                    false
                                }
                            }
                        }
                        SessionFrame::Answer {
                            client_id,
                            answer,
                            response_time,
                            reply,
                        } => match session.record_answer(client_id, answer, response_time, now) {
                            Ok(effects) => {
                                let _ = reply.send(Ok(()));
                                flush_effects(&ports, effects).await
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                                false
                            }
                        },
                        SessionFrame::Joker {
                            client_id,
                            kind,
                            reply,
                        } => match session.use_joker(client_id, kind, now) {
                            Ok((joker_reply, effects)) => {
                                let _ = reply.send(Ok(joker_reply));
                                flush_effects(&ports, effects).await
                            }
                            Err(e) => {
                                let _ = reply.send(Err(e));
                                false
                            }
                        },
                        SessionFrame::Describe { reply } => {
                            let _ = reply.send(session.summary());
                            false
                        }
                        SessionFrame::Shutdown => {
                            warn!("[{}] Shutdown session event loop", session.id);
                            break;
                        }
                    }
                }
                Input::Timer => {
                    let effects = session.handle_timer(now);
                    flush_effects(&ports, effects).await
                }
                Input::Closed => break,
            };

            if finished {
                break;
            }
        }

        ports.send(OutFrame::Shutdown).await;
        ports.close(CloseReason::Complete);
    }
}
