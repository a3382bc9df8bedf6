//! Read-only question bank.
//!
//! The bank is loaded once at startup and shared immutably.  Themes are
//! materialized from the file in discovery order and get dense ids.

use std::collections::HashMap;
use std::path::Path;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Difficulty, Question, QuestionId, Solution, Theme, ThemeId};

#[derive(Deserialize)]
struct BankRecord {
    id: QuestionId,
    themes: Vec<String>,
    difficulty: Difficulty,
    #[serde(rename = "question")]
    prompt: String,
    #[serde(flatten)]
    solution: Solution,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
struct BankFile {
    questions: Vec<BankRecord>,
}

pub struct QuestionBank {
    themes: Vec<Theme>,
    questions: Vec<Question>,
    by_id: HashMap<QuestionId, usize>,
}

impl QuestionBank {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::StorageError(e.to_string()))?;
        let file: BankFile =
            serde_json::from_str(&content).map_err(|e| Error::MalformedBank(e.to_string()))?;
        let bank = Self::from_records(file.questions)?;
        info!(
            "Loaded question bank: {} questions, {} themes",
            bank.questions.len(),
            bank.themes.len()
        );
        Ok(bank)
    }

    fn from_records(records: Vec<BankRecord>) -> Result<Self> {
        let mut themes: Vec<Theme> = vec![];
        let mut theme_ids: HashMap<String, ThemeId> = HashMap::new();
        let mut questions: Vec<Question> = vec![];

        for record in records {
            let ids = record
                .themes
                .iter()
                .map(|name| {
                    *theme_ids.entry(name.clone()).or_insert_with(|| {
                        let id = themes.len() as ThemeId;
                        themes.push(Theme {
                            id,
                            name: name.clone(),
                        });
                        id
                    })
                })
                .collect();

            questions.push(Question {
                id: record.id,
                themes: ids,
                difficulty: record.difficulty,
                prompt: record.prompt,
                solution: record.solution,
                explanation: record.explanation,
            });
        }

        Self::from_questions(themes, questions)
    }

    /// Build a bank from already materialized themes and questions.
    pub fn from_questions(themes: Vec<Theme>, questions: Vec<Question>) -> Result<Self> {
        let mut by_id: HashMap<QuestionId, usize> = HashMap::new();

        for (ix, question) in questions.iter().enumerate() {
            if question.themes.is_empty() {
                return Err(Error::MalformedBank(format!(
                    "question {} has no theme",
                    question.id
                )));
            }
            if question
                .themes
                .iter()
                .any(|t| (*t as usize) >= themes.len())
            {
                return Err(Error::MalformedBank(format!(
                    "question {} references an unknown theme",
                    question.id
                )));
            }
            match &question.solution {
                Solution::MultiChoice { correct, .. } if *correct > 3 => {
                    return Err(Error::MalformedBank(format!(
                        "question {} has correct index out of range",
                        question.id
                    )));
                }
                Solution::Text { accepted } if accepted.is_empty() => {
                    return Err(Error::MalformedBank(format!(
                        "question {} accepts no answer",
                        question.id
                    )));
                }
                _ => (),
            }
            if by_id.insert(question.id, ix).is_some() {
                return Err(Error::MalformedBank(format!(
                    "duplicate question id {}",
                    question.id
                )));
            }
        }

        Ok(Self {
            themes,
            questions,
            by_id,
        })
    }

    pub fn themes(&self) -> &[Theme] {
        &self.themes
    }

    pub fn has_theme(&self, id: ThemeId) -> bool {
        (id as usize) < self.themes.len()
    }

    /// Pick `count` distinct questions matching the difficulty whose
    /// theme set intersects `theme_ids`, in uniform random order.
    pub fn select(
        &self,
        theme_ids: &[ThemeId],
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Vec<QuestionId>> {
        let mut matching: Vec<QuestionId> = self
            .questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .filter(|q| q.themes.iter().any(|t| theme_ids.contains(t)))
            .map(|q| q.id)
            .collect();
        if matching.len() < count {
            return Err(Error::InsufficientQuestions);
        }
        matching.shuffle(&mut rand::thread_rng());
        matching.truncate(count);
        Ok(matching)
    }

    pub fn get(&self, id: QuestionId) -> Result<&Question> {
        self.by_id
            .get(&id)
            .map(|ix| &self.questions[*ix])
            .ok_or(Error::QuestionNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
