use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    #[error("Pseudo already taken: {0}")]
    PseudoTaken(String),

    #[error("Account store is full")]
    AccountStoreFull,

    #[error("Invalid pseudo")]
    InvalidPseudo,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Session is full: {0}")]
    SessionIsFull(usize),

    #[error("Session not joinable")]
    SessionNotJoinable,

    #[error("Player already joined: {0}")]
    PlayerAlreadyJoined(String),

    #[error("Player not in session")]
    PlayerNotInSession,

    #[error("Already in a session")]
    AlreadyInSession,

    #[error("No enough players")]
    NoEnoughPlayers,

    #[error("Not the session creator")]
    NotCreator,

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Session not playing")]
    SessionNotPlaying,

    #[error("Already answered")]
    AlreadyAnswered,

    #[error("Player is eliminated")]
    PlayerEliminated,

    #[error("Joker not available")]
    JokerNotAvailable,

    #[error("No enough questions")]
    InsufficientQuestions,

    #[error("Question not found: {0}")]
    QuestionNotFound(u64),

    #[error("Too many sessions")]
    TooManySessions,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Client not found: {0}")]
    ClientNotFound(u64),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Malformed bank: {0}")]
    MalformedBank(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
