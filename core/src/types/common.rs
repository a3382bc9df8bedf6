use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

pub type ClientId = u64;
pub type SessionId = u64;
pub type QuestionId = u64;
pub type ThemeId = u32;

/// Question difficulty.  The wire format is bilingual: both the French
/// and the English spellings are accepted on input, while output always
/// uses the French spelling for compatibility with the existing client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "facile",
            Difficulty::Medium => "moyen",
            Difficulty::Hard => "difficile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "facile" | "easy" => Some(Difficulty::Easy),
            "moyen" | "medium" => Some(Difficulty::Medium),
            "difficile" | "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Difficulty::parse(&s)
            .ok_or_else(|| de::Error::custom(format!("unknown difficulty: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Solo,
    Battle,
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Solo => write!(f, "solo"),
            GameMode::Battle => write!(f, "battle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    MultiChoice,
    Boolean,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JokerKind {
    Fifty,
    Skip,
}

/// The correctness payload of a question.  Exactly one variant exists
/// per question kind, so a question can never carry two answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Solution {
    MultiChoice {
        options: [String; 4],
        correct: u8,
    },
    Boolean {
        correct: bool,
    },
    Text {
        accepted: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(skip)]
    pub themes: Vec<ThemeId>,
    pub difficulty: Difficulty,
    #[serde(rename = "question")]
    pub prompt: String,
    #[serde(flatten)]
    pub solution: Solution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        match self.solution {
            Solution::MultiChoice { .. } => QuestionKind::MultiChoice,
            Solution::Boolean { .. } => QuestionKind::Boolean,
            Solution::Text { .. } => QuestionKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
}

pub const MIN_QUESTIONS: usize = 10;
pub const MAX_QUESTIONS: usize = 50;
pub const MIN_TIME_LIMIT: u64 = 10;
pub const MAX_TIME_LIMIT: u64 = 60;
pub const MIN_LIVES: u32 = 1;
pub const MAX_LIVES: u32 = 10;
pub const MIN_PLAYERS: usize = 2;

/// The immutable parameters of a session, fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRules {
    pub name: String,
    pub theme_ids: Vec<ThemeId>,
    pub difficulty: Difficulty,
    pub nb_questions: usize,
    pub time_limit: u64,
    pub mode: GameMode,
    pub max_players: usize,
    pub lives: u32,
}

impl SessionRules {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidParameter("name".into()));
        }
        if self.theme_ids.is_empty() {
            return Err(Error::InvalidParameter("themeIds".into()));
        }
        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&self.nb_questions) {
            return Err(Error::InvalidParameter("nbQuestions".into()));
        }
        if !(MIN_TIME_LIMIT..=MAX_TIME_LIMIT).contains(&self.time_limit) {
            return Err(Error::InvalidParameter("timeLimit".into()));
        }
        if self.max_players < MIN_PLAYERS {
            return Err(Error::InvalidParameter("maxPlayers".into()));
        }
        if self.mode == GameMode::Battle && !(MIN_LIVES..=MAX_LIVES).contains(&self.lives) {
            return Err(Error::InvalidParameter("lives".into()));
        }
        Ok(())
    }
}
