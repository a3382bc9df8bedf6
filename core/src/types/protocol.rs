//! Wire types of the line-framed protocol.
//!
//! A request is one header line `METHOD endpoint`, followed by exactly
//! one JSON body line when the method is POST.  A response or a
//! server-initiated event is always a single JSON object on one line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::common::{Difficulty, GameMode, JokerKind, QuestionKind, SessionId, SessionStatus, ThemeId};

/// Lines longer than this are rejected and the peer disconnected.
pub const MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Parse a request header line into its method and endpoint.
pub fn parse_header(line: &str) -> Result<(Method, &str)> {
    let mut parts = line.splitn(2, ' ');
    let method = match parts.next() {
        Some("GET") => Method::Get,
        Some("POST") => Method::Post,
        _ => return Err(Error::MalformedRequest(line.to_owned())),
    };
    match parts.next() {
        Some(endpoint) if !endpoint.is_empty() && !endpoint.contains(' ') => {
            Ok((method, endpoint))
        }
        _ => Err(Error::MalformedRequest(line.to_owned())),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsParams {
    pub pseudo: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams {
    pub name: String,
    pub theme_ids: Vec<ThemeId>,
    pub difficulty: Difficulty,
    pub nb_questions: usize,
    pub time_limit: u64,
    pub mode: GameMode,
    pub max_players: usize,
    #[serde(default)]
    pub lives: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionParams {
    pub session_id: SessionId,
}

/// The submitted answer, typed by the current question kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Index(i64),
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerParams {
    pub answer: AnswerValue,
    pub response_time: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JokerParams {
    #[serde(rename = "type")]
    pub kind: JokerKind,
}

/// A response to one request.  `statut` carries an HTTP-style code as a
/// string; extra per-endpoint fields are flattened alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub action: String,
    pub statut: String,
    pub message: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Response {
    pub fn new(action: &str, statut: &str, message: impl Into<String>) -> Self {
        Self {
            action: action.to_owned(),
            statut: statut.to_owned(),
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn ok(action: &str, message: impl Into<String>) -> Self {
        Self::new(action, "200", message)
    }

    pub fn created(action: &str, message: impl Into<String>) -> Self {
        Self::new(action, "201", message)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_owned(), value.into());
        self
    }
}

/// One session as reported by `GET sessions/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub nb_players: usize,
    pub max_players: usize,
    pub status: SessionStatus,
    pub mode: GameMode,
    pub difficulty: Difficulty,
}

/// A player's line in a `question/results` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub pseudo: String,
    pub answer: Option<AnswerValue>,
    pub correct: bool,
    pub points: u32,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<u32>,
}

/// A player's line in a `session/finished` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: usize,
    pub pseudo: String,
    pub score: u32,
    pub correct_answers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lives: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eliminated_at: Option<usize>,
}

/// A server-initiated event.  Events are pushed outside of any
/// request/response exchange and carry no `statut` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "session/player/joined")]
    PlayerJoined { pseudo: String, nb_players: usize },
    #[serde(rename = "session/player/left")]
    PlayerLeft {
        pseudo: String,
        nb_players: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_creator: Option<String>,
    },
    #[serde(rename = "session/started")]
    Started { countdown: u64 },
    #[serde(rename = "question/new")]
    NewQuestion {
        question_number: usize,
        nb_questions: usize,
        kind: QuestionKind,
        difficulty: Difficulty,
        question: String,
        time_limit: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
    },
    #[serde(rename = "question/results")]
    Results {
        correct_answer: AnswerValue,
        #[serde(skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        slowest: Option<String>,
        players: Vec<PlayerResult>,
    },
    #[serde(rename = "session/player/eliminated")]
    Eliminated { pseudo: String, question_number: usize },
    #[serde(rename = "session/finished")]
    Finished {
        mode: GameMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
        ranking: Vec<RankingEntry>,
    },
}

impl std::fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerEvent::PlayerJoined { pseudo, .. } => write!(f, "PlayerJoined: {}", pseudo),
            ServerEvent::PlayerLeft { pseudo, .. } => write!(f, "PlayerLeft: {}", pseudo),
            ServerEvent::Started { .. } => write!(f, "Started"),
            ServerEvent::NewQuestion {
                question_number,
                nb_questions,
                ..
            } => write!(f, "NewQuestion: {}/{}", question_number, nb_questions),
            ServerEvent::Results { .. } => write!(f, "Results"),
            ServerEvent::Eliminated { pseudo, .. } => write!(f, "Eliminated: {}", pseudo),
            ServerEvent::Finished { .. } => write!(f, "Finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("GET themes/list").unwrap(),
            (Method::Get, "themes/list")
        );
        assert_eq!(
            parse_header("POST player/login").unwrap(),
            (Method::Post, "player/login")
        );
        assert!(parse_header("PUT player/login").is_err());
        assert!(parse_header("GET").is_err());
        assert!(parse_header("GET a b").is_err());
        assert!(parse_header("").is_err());
    }

    #[test]
    fn test_response_shape() {
        let resp = Response::created("player/register", "account created")
            .with("pseudo", "alice");
        let v: Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["action"], "player/register");
        assert_eq!(v["statut"], "201");
        assert_eq!(v["pseudo"], "alice");
    }

    #[test]
    fn test_event_action_tag() {
        let ev = ServerEvent::PlayerJoined {
            pseudo: "bob".into(),
            nb_players: 2,
        };
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["action"], "session/player/joined");
        assert_eq!(v["nbPlayers"], 2);
        assert!(v.get("statut").is_none());
    }

    #[test]
    fn test_answer_value_untagged() {
        let a: AnswerValue = serde_json::from_str("2").unwrap();
        assert_eq!(a, AnswerValue::Index(2));
        let a: AnswerValue = serde_json::from_str("true").unwrap();
        assert_eq!(a, AnswerValue::Bool(true));
        let a: AnswerValue = serde_json::from_str("\"Paris\"").unwrap();
        assert_eq!(a, AnswerValue::Text("Paris".into()));
    }

    #[test]
    fn test_create_params_camel_case() {
        let params: CreateSessionParams = serde_json::from_str(
            r#"{"name":"p","themeIds":[0,1],"difficulty":"easy","nbQuestions":10,
                "timeLimit":20,"mode":"battle","maxPlayers":4,"lives":3}"#,
        )
        .unwrap();
        assert_eq!(params.theme_ids, vec![0, 1]);
        assert_eq!(params.lives, Some(3));
    }
}
