//! The request dispatcher.
//!
//! Routes a framed request to its handler, enforcing the endpoint
//! guards first: authentication, then session membership.  Every
//! request gets exactly one response, errors included.

use std::sync::Arc;

use quiznet_core::error::{Error, Result};
use quiznet_core::types::{
    parse_header, AnswerParams, ClientId, CreateSessionParams, CredentialsParams, GameMode,
    JoinSessionParams, JokerParams, Method, Response, SessionId, SessionRules,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::warn;

use crate::context::ApplicationContext;
use crate::frame::JokerReply;

fn statut_of(err: &Error) -> &'static str {
    match err {
        Error::PseudoTaken(_) => "409",
        Error::InvalidCredentials | Error::Unauthenticated => "401",
        Error::AccountStoreFull
        | Error::SessionIsFull(_)
        | Error::NotCreator
        | Error::TooManySessions => "403",
        Error::SessionNotFound(_) => "404",
        Error::UnknownEndpoint(_)
        | Error::QuestionNotFound(_)
        | Error::ClientNotFound(_)
        | Error::HashError(_)
        | Error::StorageError(_)
        | Error::MalformedBank(_)
        | Error::Internal(_) => "520",
        _ => "400",
    }
}

fn error_response(action: &str, err: &Error) -> Response {
    Response::new(action, statut_of(err), err.to_string())
}

fn parse_body<T: DeserializeOwned>(body: Option<&str>) -> Result<T> {
    let body = body.ok_or_else(|| Error::MalformedRequest("missing body".into()))?;
    serde_json::from_str(body).map_err(|e| Error::MalformedRequest(e.to_string()))
}

async fn require_auth(ctx: &ApplicationContext, client_id: ClientId) -> Result<String> {
    ctx.hub.pseudo(client_id).await.ok_or(Error::Unauthenticated)
}

async fn require_session(ctx: &ApplicationContext, client_id: ClientId) -> Result<SessionId> {
    ctx.hub
        .session_of(client_id)
        .await
        .ok_or(Error::PlayerNotInSession)
}

/// Handle one framed request and produce its response.
pub async fn handle_request(
    ctx: &Arc<ApplicationContext>,
    client_id: ClientId,
    header: &str,
    body: Option<&str>,
) -> Response {
    let (method, endpoint) = match parse_header(header) {
        Ok(parsed) => parsed,
        Err(e) => return error_response("unknown", &e),
    };

    match (method, endpoint) {
        (Method::Post, "player/register") => register(ctx, body).await,
        (Method::Post, "player/login") => login(ctx, client_id, body).await,
        (Method::Get, "themes/list") => themes_list(ctx),
        (Method::Get, "sessions/list") => sessions_list(ctx).await,
        (Method::Post, "session/create") => create_session(ctx, client_id, body).await,
        (Method::Post, "session/join") => join_session(ctx, client_id, body).await,
        (Method::Post, "session/leave") => leave_session(ctx, client_id).await,
        (Method::Post, "session/start") => start_session(ctx, client_id).await,
        (Method::Post, "question/answer") => answer(ctx, client_id, body).await,
        (Method::Post, "joker/use") => use_joker(ctx, client_id, body).await,
        _ => error_response(endpoint, &Error::UnknownEndpoint(endpoint.to_owned())),
    }
}

async fn register(ctx: &ApplicationContext, body: Option<&str>) -> Response {
    const ACTION: &str = "player/register";
    let result = async {
        let params: CredentialsParams = parse_body(body)?;
        ctx.accounts.register(&params.pseudo, &params.password).await?;
        Ok(params.pseudo)
    }
    .await;
    match result {
        Ok(pseudo) => Response::created(ACTION, "account created").with("pseudo", pseudo),
        Err(e) => error_response(ACTION, &e),
    }
}

async fn login(ctx: &ApplicationContext, client_id: ClientId, body: Option<&str>) -> Response {
    const ACTION: &str = "player/login";
    let result = async {
        let params: CredentialsParams = parse_body(body)?;
        ctx.accounts.login(&params.pseudo, &params.password).await?;
        ctx.hub.authenticate(client_id, &params.pseudo).await;
        Ok(params.pseudo)
    }
    .await;
    match result {
        Ok(pseudo) => Response::ok(ACTION, "logged in").with("pseudo", pseudo),
        Err(e) => error_response(ACTION, &e),
    }
}

fn themes_list(ctx: &ApplicationContext) -> Response {
    const ACTION: &str = "themes/list";
    let themes = ctx.bank.themes();
    Response::ok(ACTION, "themes")
        .with("nbThemes", themes.len())
        .with("themes", json!(themes))
}

async fn sessions_list(ctx: &ApplicationContext) -> Response {
    const ACTION: &str = "sessions/list";
    let sessions = ctx.sessions.list().await;
    Response::ok(ACTION, "sessions")
        .with("nbSessions", sessions.len())
        .with("sessions", json!(sessions))
}

async fn create_session(
    ctx: &Arc<ApplicationContext>,
    client_id: ClientId,
    body: Option<&str>,
) -> Response {
    const ACTION: &str = "session/create";
    let result = async {
        let pseudo = require_auth(ctx, client_id).await?;
        if ctx.hub.session_of(client_id).await.is_some() {
            return Err(Error::AlreadyInSession);
        }
        let params: CreateSessionParams = parse_body(body)?;
        if params.mode == GameMode::Battle && params.lives.is_none() {
            return Err(Error::InvalidParameter("lives".into()));
        }
        if !params.theme_ids.iter().all(|t| ctx.bank.has_theme(*t)) {
            return Err(Error::InvalidParameter("themeIds".into()));
        }
        let rules = SessionRules {
            name: params.name,
            theme_ids: params.theme_ids,
            difficulty: params.difficulty,
            nb_questions: params.nb_questions,
            time_limit: params.time_limit,
            mode: params.mode,
            max_players: params.max_players,
            lives: params.lives.unwrap_or(0),
        };
        rules.validate()?;

        let session_id = ctx
            .sessions
            .create_session(
                rules,
                client_id,
                ctx.bank.clone(),
                ctx.hub.clone(),
                ctx.config.slowest_penalty,
                ctx.signal_sender(),
            )
            .await?;

        // The creator is not admitted by create itself; join right away.
        match ctx.sessions.join(session_id, client_id, &pseudo).await {
            Ok(reply) => {
                ctx.hub.set_session(client_id, session_id).await;
                Ok((session_id, reply.players))
            }
            Err(e) => {
                warn!("Creator failed to join fresh session {}: {}", session_id, e);
                ctx.sessions.close_session(session_id).await;
                Err(Error::Internal("session creation failed".into()))
            }
        }
    }
    .await;
    match result {
        Ok((session_id, players)) => Response::created(ACTION, "session created")
            .with("sessionId", session_id)
            .with("isCreator", true)
            .with("players", json!(players)),
        Err(e) => error_response(ACTION, &e),
    }
}

async fn join_session(
    ctx: &ApplicationContext,
    client_id: ClientId,
    body: Option<&str>,
) -> Response {
    const ACTION: &str = "session/join";
    let result = async {
        let pseudo = require_auth(ctx, client_id).await?;
        if ctx.hub.session_of(client_id).await.is_some() {
            return Err(Error::AlreadyInSession);
        }
        let params: JoinSessionParams = parse_body(body)?;
        let reply = ctx
            .sessions
            .join(params.session_id, client_id, &pseudo)
            .await?;
        ctx.hub.set_session(client_id, params.session_id).await;
        Ok(reply)
    }
    .await;
    match result {
        Ok(reply) => Response::created(ACTION, "session joined")
            .with("sessionId", reply.session_id)
            .with("players", json!(reply.players)),
        Err(e) => error_response(ACTION, &e),
    }
}

async fn leave_session(ctx: &ApplicationContext, client_id: ClientId) -> Response {
    const ACTION: &str = "session/leave";
    let result = async {
        require_auth(ctx, client_id).await?;
        let session_id = require_session(ctx, client_id).await?;
        ctx.sessions.leave(session_id, client_id).await;
        ctx.hub.clear_session(client_id).await;
        Ok(())
    }
    .await;
    match result {
        Ok(()) => Response::ok(ACTION, "session left"),
        Err(e) => error_response(ACTION, &e),
    }
}

async fn start_session(ctx: &ApplicationContext, client_id: ClientId) -> Response {
    const ACTION: &str = "session/start";
    let result = async {
        require_auth(ctx, client_id).await?;
        let session_id = require_session(ctx, client_id).await?;
        ctx.sessions.start(session_id, client_id).await
    }
    .await;
    match result {
        Ok(()) => Response::ok(ACTION, "session started"),
        Err(e) => error_response(ACTION, &e),
    }
}

async fn answer(ctx: &ApplicationContext, client_id: ClientId, body: Option<&str>) -> Response {
    const ACTION: &str = "question/answer";
    let result = async {
        require_auth(ctx, client_id).await?;
        let session_id = require_session(ctx, client_id).await?;
        let params: AnswerParams = parse_body(body)?;
        ctx.sessions
            .answer(session_id, client_id, params.answer, params.response_time)
            .await
    }
    .await;
    match result {
        Ok(()) => Response::ok(ACTION, "answer recorded").with("accepted", true),
        Err(e) => error_response(ACTION, &e),
    }
}

async fn use_joker(ctx: &ApplicationContext, client_id: ClientId, body: Option<&str>) -> Response {
    const ACTION: &str = "joker/use";
    let result = async {
        require_auth(ctx, client_id).await?;
        let session_id = require_session(ctx, client_id).await?;
        let params: JokerParams = parse_body(body)?;
        ctx.sessions
            .use_joker(session_id, client_id, params.kind)
            .await
    }
    .await;
    match result {
        Ok(JokerReply::Fifty { remaining }) => {
            Response::ok(ACTION, "joker used").with("remainingAnswers", json!(remaining))
        }
        Ok(JokerReply::Skip) => Response::ok(ACTION, "question skipped"),
        Err(e) => error_response(ACTION, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Registration;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

    async fn test_context() -> Arc<ApplicationContext> {
        let seq = TEST_SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "quiznet-dispatcher-{}-{}",
            std::process::id(),
            seq
        ));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let questions: Vec<serde_json::Value> = (0..12)
            .map(|id| {
                json!({
                    "id": id,
                    "themes": ["Histoire"],
                    "difficulty": "facile",
                    "kind": "multi-choice",
                    "question": format!("question {}", id),
                    "options": ["a", "b", "c", "d"],
                    "correct": 2,
                })
            })
            .collect();
        let bank_file = dir.join("questions.json");
        tokio::fs::write(
            &bank_file,
            serde_json::to_string(&json!({ "questions": questions })).unwrap(),
        )
        .await
        .unwrap();

        let accounts_file = dir.join("accounts.txt");
        let _ = tokio::fs::remove_file(&accounts_file).await;

        let config = quiznet_env::Config {
            bank_file,
            accounts_file,
            ..Default::default()
        };
        let (ctx, _signal_loop) = ApplicationContext::try_new_and_start_signal_loop(config)
            .await
            .unwrap();
        Arc::new(ctx)
    }

    async fn connect(ctx: &Arc<ApplicationContext>) -> Registration {
        ctx.hub.register("127.0.0.1:1".parse().unwrap()).await.unwrap()
    }

    async fn login_as(ctx: &Arc<ApplicationContext>, client_id: ClientId, pseudo: &str) {
        let body = format!(r#"{{"pseudo":"{}","password":"pw"}}"#, pseudo);
        let resp =
            handle_request(ctx, client_id, "POST player/register", Some(&body)).await;
        assert_eq!(resp.statut, "201");
        let resp = handle_request(ctx, client_id, "POST player/login", Some(&body)).await;
        assert_eq!(resp.statut, "200");
    }

    #[tokio::test]
    async fn test_register_login_themes() {
        let ctx = test_context().await;
        let alice = connect(&ctx).await;

        let body = r#"{"pseudo":"alice","password":"p1"}"#;
        let resp =
            handle_request(&ctx, alice.client_id, "POST player/register", Some(body)).await;
        assert_eq!(resp.statut, "201");

        let resp =
            handle_request(&ctx, alice.client_id, "POST player/register", Some(body)).await;
        assert_eq!(resp.statut, "409");

        let bad = r#"{"pseudo":"alice","password":"bad"}"#;
        let resp = handle_request(&ctx, alice.client_id, "POST player/login", Some(bad)).await;
        assert_eq!(resp.statut, "401");

        let resp = handle_request(&ctx, alice.client_id, "POST player/login", Some(body)).await;
        assert_eq!(resp.statut, "200");

        let resp = handle_request(&ctx, alice.client_id, "GET themes/list", None).await;
        assert_eq!(resp.statut, "200");
        assert_eq!(resp.data["nbThemes"], 1);
    }

    #[tokio::test]
    async fn test_guards() {
        let ctx = test_context().await;
        let alice = connect(&ctx).await;

        // Unknown endpoint
        let resp = handle_request(&ctx, alice.client_id, "GET no/such", None).await;
        assert_eq!(resp.statut, "520");

        // Malformed header
        let resp = handle_request(&ctx, alice.client_id, "FETCH themes/list", None).await;
        assert_eq!(resp.statut, "400");

        // Invalid JSON body
        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST player/register",
            Some("not json"),
        )
        .await;
        assert_eq!(resp.statut, "400");

        // Auth required
        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/join",
            Some(r#"{"sessionId":1}"#),
        )
        .await;
        assert_eq!(resp.statut, "401");

        // Session required
        login_as(&ctx, alice.client_id, "alice").await;
        let resp = handle_request(&ctx, alice.client_id, "POST session/start", None).await;
        assert_eq!(resp.statut, "400");
    }

    fn create_body(nb_questions: u32, mode: &str, lives: Option<u32>) -> String {
        let mut body = json!({
            "name": "partie",
            "themeIds": [0],
            "difficulty": "easy",
            "nbQuestions": nb_questions,
            "timeLimit": 20,
            "mode": mode,
            "maxPlayers": 4,
        });
        if let Some(lives) = lives {
            body["lives"] = json!(lives);
        }
        body.to_string()
    }

    #[tokio::test]
    async fn test_create_and_join_solo() {
        let ctx = test_context().await;
        let mut alice = connect(&ctx).await;
        let bob = connect(&ctx).await;
        login_as(&ctx, alice.client_id, "alice").await;
        login_as(&ctx, bob.client_id, "bob").await;

        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(10, "solo", None)),
        )
        .await;
        assert_eq!(resp.statut, "201");
        assert_eq!(resp.data["isCreator"], true);
        assert_eq!(resp.data["players"], json!(["alice"]));
        let session_id = resp.data["sessionId"].as_u64().unwrap();

        let join = format!(r#"{{"sessionId":{}}}"#, session_id);
        let resp = handle_request(&ctx, bob.client_id, "POST session/join", Some(&join)).await;
        assert_eq!(resp.statut, "201");
        assert_eq!(resp.data["players"], json!(["alice", "bob"]));

        // Alice is notified of the join.
        let line = alice.outbound_rx.recv().await.unwrap();
        let event: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(event["action"], "session/player/joined");
        assert_eq!(event["pseudo"], "bob");
        assert_eq!(event["nbPlayers"], 2);

        // The session shows up in the listing.
        let resp = handle_request(&ctx, bob.client_id, "GET sessions/list", None).await;
        assert_eq!(resp.data["nbSessions"], 1);
        assert_eq!(resp.data["sessions"][0]["nbPlayers"], 2);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let ctx = test_context().await;
        let alice = connect(&ctx).await;
        login_as(&ctx, alice.client_id, "alice").await;

        // Out-of-range question count
        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(9, "solo", None)),
        )
        .await;
        assert_eq!(resp.statut, "400");

        // Battle without lives
        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(10, "battle", None)),
        )
        .await;
        assert_eq!(resp.statut, "400");

        // Battle with out-of-range lives
        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(10, "battle", Some(11))),
        )
        .await;
        assert_eq!(resp.statut, "400");

        // Not enough matching questions: the bank has 12 easy ones.
        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(13, "solo", None)),
        )
        .await;
        assert_eq!(resp.statut, "400");
        assert_eq!(ctx.sessions.count().await, 0);
    }

    #[tokio::test]
    async fn test_join_and_start_errors() {
        let ctx = test_context().await;
        let alice = connect(&ctx).await;
        let bob = connect(&ctx).await;
        login_as(&ctx, alice.client_id, "alice").await;
        login_as(&ctx, bob.client_id, "bob").await;

        let resp = handle_request(
            &ctx,
            bob.client_id,
            "POST session/join",
            Some(r#"{"sessionId":99}"#),
        )
        .await;
        assert_eq!(resp.statut, "404");

        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(10, "solo", None)),
        )
        .await;
        let session_id = resp.data["sessionId"].as_u64().unwrap();

        // Alone in the session: start is refused.
        let resp = handle_request(&ctx, alice.client_id, "POST session/start", None).await;
        assert_eq!(resp.statut, "400");

        let join = format!(r#"{{"sessionId":{}}}"#, session_id);
        let resp = handle_request(&ctx, bob.client_id, "POST session/join", Some(&join)).await;
        assert_eq!(resp.statut, "201");

        // Non-creator cannot start.
        let resp = handle_request(&ctx, bob.client_id, "POST session/start", None).await;
        assert_eq!(resp.statut, "403");

        let resp = handle_request(&ctx, alice.client_id, "POST session/start", None).await;
        assert_eq!(resp.statut, "200");

        // A second join attempt by bob is refused: he is in a session.
        let resp = handle_request(&ctx, bob.client_id, "POST session/join", Some(&join)).await;
        assert_eq!(resp.statut, "400");
    }

    #[tokio::test]
    async fn test_leave_clears_membership() {
        let ctx = test_context().await;
        let alice = connect(&ctx).await;
        login_as(&ctx, alice.client_id, "alice").await;

        let resp = handle_request(
            &ctx,
            alice.client_id,
            "POST session/create",
            Some(&create_body(10, "solo", None)),
        )
        .await;
        assert_eq!(resp.statut, "201");

        let resp = handle_request(&ctx, alice.client_id, "POST session/leave", None).await;
        assert_eq!(resp.statut, "200");
        assert_eq!(ctx.hub.session_of(alice.client_id).await, None);

        // Not in a session anymore.
        let resp = handle_request(&ctx, alice.client_id, "POST session/leave", None).await;
        assert_eq!(resp.statut, "400");
    }
}
