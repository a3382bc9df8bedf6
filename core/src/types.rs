mod common;
mod protocol;

pub use common::{
    ClientId, Difficulty, GameMode, JokerKind, Question, QuestionId, QuestionKind, SessionId,
    SessionRules, SessionStatus, Solution, Theme, ThemeId,
};

pub use protocol::{
    parse_header, AnswerParams, AnswerValue, CreateSessionParams, CredentialsParams,
    JoinSessionParams, JokerParams, Method, PlayerResult, RankingEntry, Response, ServerEvent,
    SessionSummary, MAX_LINE_LEN,
};
