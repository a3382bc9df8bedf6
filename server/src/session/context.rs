//! Session state.
//!
//! `SessionContext` is plain data plus transition methods.  It is only
//! ever driven by its session's event loop, one frame at a time, so no
//! locking happens here.  Transitions return the broadcasts they
//! caused as a list of [`Effect`]s.

use std::sync::Arc;

use quiznet_core::bank::QuestionBank;
use quiznet_core::error::{Error, Result};
use quiznet_core::normalize;
use quiznet_core::scoring;
use quiznet_core::types::{
    AnswerValue, ClientId, GameMode, JokerKind, PlayerResult, Question, QuestionId, RankingEntry,
    ServerEvent, SessionId, SessionRules, SessionStatus, SessionSummary, Solution,
};
use rand::seq::SliceRandom;
use tokio::time::{Duration, Instant};
use tracing::{error, info};

use crate::frame::JokerReply;

pub const COUNTDOWN_SECS: u64 = 3;
pub const READING_INTERVAL_SECS: u64 = 5;

/// The value a player answered with, or the reason there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAnswer {
    None,
    Skip,
    Value(AnswerValue),
}

impl PlayerAnswer {
    /// The wire form: skip is echoed as the integer sentinel -2,
    /// no-answer as null.
    fn to_wire(&self) -> Option<AnswerValue> {
        match self {
            PlayerAnswer::None => None,
            PlayerAnswer::Skip => Some(AnswerValue::Index(-2)),
            PlayerAnswer::Value(v) => Some(v.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionPlayer {
    pub client_id: ClientId,
    pub pseudo: String,
    pub score: u32,
    pub correct_answers: u32,
    pub lives: u32,
    pub has_answered: bool,
    pub was_correct: bool,
    pub answer: PlayerAnswer,
    pub response_time: f64,
    pub points_this_question: u32,
    pub eliminated: bool,
    pub eliminated_at: Option<usize>,
    pub fifty_used: bool,
    pub skip_used: bool,
    pub skipped_this_question: bool,
}

impl SessionPlayer {
    fn new(client_id: ClientId, pseudo: String, lives: u32) -> Self {
        Self {
            client_id,
            pseudo,
            score: 0,
            correct_answers: 0,
            lives,
            has_answered: false,
            was_correct: false,
            answer: PlayerAnswer::None,
            response_time: 0.0,
            points_this_question: 0,
            eliminated: false,
            eliminated_at: None,
            fifty_used: false,
            skip_used: false,
            skipped_this_question: false,
        }
    }

    fn reset_for_question(&mut self) {
        self.has_answered = false;
        self.was_correct = false;
        self.answer = PlayerAnswer::None;
        self.response_time = 0.0;
        self.points_this_question = 0;
        self.skipped_this_question = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    StartCountdown,
    QuestionTimeout,
    NextQuestion,
}

/// The single pending timer of a session.
#[derive(Debug, Clone, Copy)]
pub struct Dispatch {
    pub kind: DispatchKind,
    pub deadline: Instant,
}

/// What a transition asks the outside world to do.
#[derive(Debug, PartialEq)]
pub enum Effect {
    Send {
        targets: Vec<ClientId>,
        event: ServerEvent,
    },
    Finished,
}

pub struct SessionContext {
    pub id: SessionId,
    pub rules: SessionRules,
    pub status: SessionStatus,
    pub creator: ClientId,
    pub players: Vec<SessionPlayer>,
    pub question_ids: Vec<QuestionId>,
    pub current_index: Option<usize>,
    pub question_start: Option<Instant>,
    pub dispatch: Option<Dispatch>,
    bank: Arc<QuestionBank>,
    slowest_penalty: bool,
}

impl SessionContext {
    pub fn new(
        id: SessionId,
        rules: SessionRules,
        creator: ClientId,
        question_ids: Vec<QuestionId>,
        bank: Arc<QuestionBank>,
        slowest_penalty: bool,
    ) -> Self {
        Self {
            id,
            rules,
            status: SessionStatus::Waiting,
            creator,
            players: Vec::new(),
            question_ids,
            current_index: None,
            question_start: None,
            dispatch: None,
            bank,
            slowest_penalty,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            name: self.rules.name.clone(),
            nb_players: self.players.len(),
            max_players: self.rules.max_players,
            status: self.status,
            mode: self.rules.mode,
            difficulty: self.rules.difficulty,
        }
    }

    pub fn finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    pub fn player_pseudos(&self) -> Vec<String> {
        self.players.iter().map(|p| p.pseudo.clone()).collect()
    }

    fn player(&self, client_id: ClientId) -> Option<&SessionPlayer> {
        self.players.iter().find(|p| p.client_id == client_id)
    }

    fn player_mut(&mut self, client_id: ClientId) -> Option<&mut SessionPlayer> {
        self.players.iter_mut().find(|p| p.client_id == client_id)
    }

    fn member_ids(&self) -> Vec<ClientId> {
        self.players.iter().map(|p| p.client_id).collect()
    }

    fn active_ids(&self) -> Vec<ClientId> {
        self.players
            .iter()
            .filter(|p| !p.eliminated)
            .map(|p| p.client_id)
            .collect()
    }

    fn question_open(&self) -> bool {
        matches!(
            self.dispatch,
            Some(Dispatch {
                kind: DispatchKind::QuestionTimeout,
                ..
            })
        )
    }

    fn all_active_answered(&self) -> bool {
        let mut active = self.players.iter().filter(|p| !p.eliminated).peekable();
        active.peek().is_some() && active.all(|p| p.has_answered)
    }

    /// 1-based number of the current question.
    fn question_number(&self) -> usize {
        self.current_index.map(|ix| ix + 1).unwrap_or(0)
    }

    // --- Joining and leaving -------------------------------------------

    pub fn join(&mut self, client_id: ClientId, pseudo: &str) -> Result<Vec<Effect>> {
        if self.status != SessionStatus::Waiting {
            return Err(Error::SessionNotJoinable);
        }
        if self.players.len() >= self.rules.max_players {
            return Err(Error::SessionIsFull(self.rules.max_players));
        }
        if self.player(client_id).is_some() {
            return Err(Error::PlayerAlreadyJoined(pseudo.to_owned()));
        }
        let others = self.member_ids();
        let lives = match self.rules.mode {
            GameMode::Battle => self.rules.lives,
            GameMode::Solo => 0,
        };
        self.players
            .push(SessionPlayer::new(client_id, pseudo.to_owned(), lives));
        info!("[{}] {} joined ({} players)", self.id, pseudo, self.players.len());

        let mut effects = vec![];
        if !others.is_empty() {
            effects.push(Effect::Send {
                targets: others,
                event: ServerEvent::PlayerJoined {
                    pseudo: pseudo.to_owned(),
                    nb_players: self.players.len(),
                },
            });
        }
        Ok(effects)
    }

    pub fn leave(&mut self, client_id: ClientId, now: Instant) -> Vec<Effect> {
        if self.status == SessionStatus::Finished {
            return vec![];
        }
        let Some(pos) = self.players.iter().position(|p| p.client_id == client_id) else {
            return vec![];
        };
        let leaver = self.players.remove(pos);
        info!("[{}] {} left ({} players)", self.id, leaver.pseudo, self.players.len());

        let mut effects = vec![];
        if self.players.is_empty() {
            self.status = SessionStatus::Finished;
            self.dispatch = None;
            effects.push(Effect::Finished);
            return effects;
        }

        let mut new_creator = None;
        if leaver.client_id == self.creator {
            self.creator = self.players[0].client_id;
            new_creator = Some(self.players[0].pseudo.clone());
        }
        effects.push(Effect::Send {
            targets: self.member_ids(),
            event: ServerEvent::PlayerLeft {
                pseudo: leaver.pseudo,
                nb_players: self.players.len(),
                new_creator,
            },
        });

        if self.status == SessionStatus::Playing {
            if self.players.len() == 1 {
                self.end_session(&mut effects);
            } else if self.question_open() && self.all_active_answered() {
                self.finalize_question(now, &mut effects);
            }
        }
        effects
    }

    // --- Starting ------------------------------------------------------

    pub fn start(&mut self, client_id: ClientId, now: Instant) -> Result<Vec<Effect>> {
        if self.status != SessionStatus::Waiting {
            return Err(Error::AlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(Error::NoEnoughPlayers);
        }
        if client_id != self.creator {
            return Err(Error::NotCreator);
        }
        self.status = SessionStatus::Playing;
        self.current_index = None;
        self.dispatch = Some(Dispatch {
            kind: DispatchKind::StartCountdown,
            deadline: now + Duration::from_secs(COUNTDOWN_SECS),
        });
        info!("[{}] Session started with {} players", self.id, self.players.len());
        Ok(vec![Effect::Send {
            targets: self.member_ids(),
            event: ServerEvent::Started {
                countdown: COUNTDOWN_SECS,
            },
        }])
    }

    // --- Timers --------------------------------------------------------

    pub fn handle_timer(&mut self, now: Instant) -> Vec<Effect> {
        let Some(dispatch) = self.dispatch.take() else {
            return vec![];
        };
        let mut effects = vec![];
        match dispatch.kind {
            DispatchKind::StartCountdown => self.dispatch_question(0, now, &mut effects),
            DispatchKind::QuestionTimeout => self.finalize_question(now, &mut effects),
            DispatchKind::NextQuestion => {
                let next = self.current_index.map(|ix| ix + 1).unwrap_or(0);
                self.dispatch_question(next, now, &mut effects);
            }
        }
        effects
    }

    fn dispatch_question(&mut self, index: usize, now: Instant, effects: &mut Vec<Effect>) {
        let question = match self.question_ids.get(index).copied() {
            Some(id) => match self.bank.get(id) {
                Ok(q) => q.clone(),
                Err(e) => {
                    error!("[{}] Lost question {}: {}", self.id, id, e);
                    self.end_session(effects);
                    return;
                }
            },
            None => {
                error!("[{}] Question index {} out of range", self.id, index);
                self.end_session(effects);
                return;
            }
        };

        self.current_index = Some(index);
        for player in self.players.iter_mut() {
            player.reset_for_question();
        }
        self.question_start = Some(now);
        self.dispatch = Some(Dispatch {
            kind: DispatchKind::QuestionTimeout,
            deadline: now + Duration::from_secs(self.rules.time_limit),
        });

        let options = match &question.solution {
            Solution::MultiChoice { options, .. } => Some(options.to_vec()),
            _ => None,
        };
        effects.push(Effect::Send {
            targets: self.active_ids(),
            event: ServerEvent::NewQuestion {
                question_number: index + 1,
                nb_questions: self.rules.nb_questions,
                kind: question.kind(),
                difficulty: question.difficulty,
                question: question.prompt.clone(),
                time_limit: self.rules.time_limit,
                options,
            },
        });
    }

    // --- Answer intake -------------------------------------------------

    pub fn record_answer(
        &mut self,
        client_id: ClientId,
        answer: AnswerValue,
        response_time: f64,
        now: Instant,
    ) -> Result<Vec<Effect>> {
        if self.status != SessionStatus::Playing || !self.question_open() {
            return Err(Error::SessionNotPlaying);
        }
        let time_limit = self.rules.time_limit;
        let question = self.current_question()?.clone();
        let player = self
            .player_mut(client_id)
            .ok_or(Error::PlayerNotInSession)?;
        if player.eliminated {
            return Err(Error::PlayerEliminated);
        }
        if player.has_answered {
            return Err(Error::AlreadyAnswered);
        }

        let response_time = scoring::clamp_response_time(response_time, time_limit);
        let correct = check_answer(&question, &answer);
        player.has_answered = true;
        player.was_correct = correct;
        player.answer = PlayerAnswer::Value(answer);
        player.response_time = response_time;
        if correct {
            player.correct_answers += 1;
            player.points_this_question =
                scoring::points_for(question.difficulty, response_time, time_limit);
            player.score += player.points_this_question;
        }

        let mut effects = vec![];
        if self.all_active_answered() {
            self.dispatch = None;
            self.finalize_question(now, &mut effects);
        }
        Ok(effects)
    }

    fn current_question(&self) -> Result<&Question> {
        let index = self.current_index.ok_or(Error::SessionNotPlaying)?;
        let id = self
            .question_ids
            .get(index)
            .copied()
            .ok_or(Error::SessionNotPlaying)?;
        self.bank.get(id)
    }

    // --- Jokers --------------------------------------------------------

    pub fn use_joker(
        &mut self,
        client_id: ClientId,
        kind: JokerKind,
        now: Instant,
    ) -> Result<(JokerReply, Vec<Effect>)> {
        if self.status != SessionStatus::Playing || !self.question_open() {
            return Err(Error::SessionNotPlaying);
        }
        let question = self.current_question()?.clone();
        let player = self
            .player_mut(client_id)
            .ok_or(Error::PlayerNotInSession)?;
        if player.eliminated {
            return Err(Error::PlayerEliminated);
        }

        match kind {
            JokerKind::Fifty => {
                if player.has_answered || player.fifty_used {
                    return Err(Error::JokerNotAvailable);
                }
                let Solution::MultiChoice { options, correct } = &question.solution else {
                    return Err(Error::JokerNotAvailable);
                };
                player.fifty_used = true;
                let wrong: Vec<usize> = (0..4).filter(|ix| *ix != *correct as usize).collect();
                let removed: Vec<usize> = wrong
                    .choose_multiple(&mut rand::thread_rng(), 2)
                    .copied()
                    .collect();
                let remaining: Vec<String> = (0..4)
                    .filter(|ix| !removed.contains(ix))
                    .map(|ix| options[ix].clone())
                    .collect();
                Ok((JokerReply::Fifty { remaining }, vec![]))
            }
            JokerKind::Skip => {
                if player.has_answered || player.skip_used {
                    return Err(Error::JokerNotAvailable);
                }
                player.skip_used = true;
                player.skipped_this_question = true;
                player.has_answered = true;
                player.was_correct = false;
                player.answer = PlayerAnswer::Skip;
                player.response_time = 0.0;

                let mut effects = vec![];
                if self.all_active_answered() {
                    self.dispatch = None;
                    self.finalize_question(now, &mut effects);
                }
                Ok((JokerReply::Skip, effects))
            }
        }
    }

    // --- Results, elimination, advance ---------------------------------

    fn finalize_question(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let question = match self.current_question() {
            Ok(q) => q.clone(),
            Err(e) => {
                error!("[{}] No current question at results: {}", self.id, e);
                self.end_session(effects);
                return;
            }
        };
        let question_number = self.question_number();
        self.dispatch = None;
        self.question_start = None;

        // Record everyone who let the clock run out.
        let unanswered_time = (self.rules.time_limit + 1) as f64;
        for player in self
            .players
            .iter_mut()
            .filter(|p| !p.eliminated && !p.has_answered)
        {
            player.was_correct = false;
            player.answer = PlayerAnswer::None;
            player.response_time = unanswered_time;
        }

        let battle = self.rules.mode == GameMode::Battle;
        let mut newly_eliminated: Vec<String> = vec![];
        let mut slowest: Option<String> = None;

        if battle {
            for player in self.players.iter_mut().filter(|p| {
                !p.eliminated && p.has_answered && !p.was_correct && !p.skipped_this_question
            }) {
                player.lives = player.lives.saturating_sub(1);
                if player.lives == 0 {
                    player.eliminated = true;
                    player.eliminated_at = Some(question_number);
                    newly_eliminated.push(player.pseudo.clone());
                }
            }

            // The slowest non-skipping answerer loses a life even when
            // correct; ties go to the lowest player index.
            let slowest_ix = self
                .players
                .iter()
                .enumerate()
                .filter(|(_, p)| p.has_answered && !p.skipped_this_question)
                .fold(None::<usize>, |best, (ix, p)| match best {
                    Some(b) if self.players[b].response_time >= p.response_time => Some(b),
                    _ => Some(ix),
                });
            if let Some(ix) = slowest_ix {
                slowest = Some(self.players[ix].pseudo.clone());
                if self.slowest_penalty && self.players[ix].was_correct {
                    let player = &mut self.players[ix];
                    player.lives = player.lives.saturating_sub(1);
                    if player.lives == 0 && !player.eliminated {
                        player.eliminated = true;
                        player.eliminated_at = Some(question_number);
                        newly_eliminated.push(player.pseudo.clone());
                    }
                }
            }
        }

        let player_results = self
            .players
            .iter()
            .map(|p| PlayerResult {
                pseudo: p.pseudo.clone(),
                answer: p.answer.to_wire(),
                correct: p.was_correct,
                points: p.points_this_question,
                score: p.score,
                response_time: battle.then_some(p.response_time),
                lives: battle.then_some(p.lives),
            })
            .collect();
        effects.push(Effect::Send {
            targets: self.member_ids(),
            event: ServerEvent::Results {
                correct_answer: correct_answer_value(&question),
                explanation: question.explanation.clone(),
                slowest: if battle { slowest } else { None },
                players: player_results,
            },
        });

        for pseudo in newly_eliminated {
            effects.push(Effect::Send {
                targets: self.member_ids(),
                event: ServerEvent::Eliminated {
                    pseudo,
                    question_number,
                },
            });
        }

        let active = self.players.iter().filter(|p| !p.eliminated).count();
        if battle && active <= 1 {
            self.end_session(effects);
        } else if question_number >= self.rules.nb_questions {
            self.end_session(effects);
        } else {
            self.dispatch = Some(Dispatch {
                kind: DispatchKind::NextQuestion,
                deadline: now + Duration::from_secs(READING_INTERVAL_SECS),
            });
        }
    }

    fn end_session(&mut self, effects: &mut Vec<Effect>) {
        self.status = SessionStatus::Finished;
        self.dispatch = None;
        self.question_start = None;

        let battle = self.rules.mode == GameMode::Battle;
        let mut ordered: Vec<&SessionPlayer> = self.players.iter().collect();
        if battle {
            ordered.sort_by(|a, b| {
                b.lives
                    .cmp(&a.lives)
                    .then_with(|| {
                        let a_at = a.eliminated_at.unwrap_or(usize::MAX);
                        let b_at = b.eliminated_at.unwrap_or(usize::MAX);
                        b_at.cmp(&a_at)
                    })
                    .then_with(|| b.score.cmp(&a.score))
            });
        } else {
            ordered.sort_by(|a, b| b.score.cmp(&a.score));
        }

        let ranking: Vec<RankingEntry> = ordered
            .iter()
            .enumerate()
            .map(|(ix, p)| RankingEntry {
                rank: ix + 1,
                pseudo: p.pseudo.clone(),
                score: p.score,
                correct_answers: p.correct_answers,
                lives: battle.then_some(p.lives),
                eliminated_at: if battle { p.eliminated_at } else { None },
            })
            .collect();
        let winner = if battle {
            ranking.first().map(|e| e.pseudo.clone())
        } else {
            None
        };

        info!("[{}] Session finished", self.id);
        if !self.players.is_empty() {
            effects.push(Effect::Send {
                targets: self.member_ids(),
                event: ServerEvent::Finished {
                    mode: self.rules.mode,
                    winner,
                    ranking,
                },
            });
        }
        effects.push(Effect::Finished);
    }
}

fn check_answer(question: &Question, answer: &AnswerValue) -> bool {
    match (&question.solution, answer) {
        (Solution::MultiChoice { correct, .. }, AnswerValue::Index(ix)) => *ix == *correct as i64,
        (Solution::Boolean { correct }, AnswerValue::Bool(b)) => b == correct,
        (Solution::Text { accepted }, AnswerValue::Text(text)) => {
            normalize::answer_matches(text, accepted)
        }
        _ => false,
    }
}

fn correct_answer_value(question: &Question) -> AnswerValue {
    match &question.solution {
        Solution::MultiChoice { correct, .. } => AnswerValue::Index(*correct as i64),
        Solution::Boolean { correct } => AnswerValue::Bool(*correct),
        Solution::Text { accepted } => AnswerValue::Text(accepted[0].clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiznet_core::types::{Difficulty, Theme};

    fn bank() -> Arc<QuestionBank> {
        let themes = vec![Theme {
            id: 0,
            name: "Histoire".into(),
        }];
        let mut questions: Vec<Question> = (0..10)
            .map(|id| Question {
                id,
                themes: vec![0],
                difficulty: Difficulty::Medium,
                prompt: format!("question {}", id),
                solution: Solution::MultiChoice {
                    options: [
                        "a".to_string(),
                        "b".to_string(),
                        "c".to_string(),
                        "d".to_string(),
                    ],
                    correct: 2,
                },
                explanation: None,
            })
            .collect();
        questions.push(Question {
            id: 100,
            themes: vec![0],
            difficulty: Difficulty::Easy,
            prompt: "Quelle ville ?".into(),
            solution: Solution::Text {
                accepted: vec!["Genève".into()],
            },
            explanation: None,
        });
        Arc::new(QuestionBank::from_questions(themes, questions).unwrap())
    }

    fn rules(mode: GameMode, lives: u32) -> SessionRules {
        SessionRules {
            name: "test".into(),
            theme_ids: vec![0],
            difficulty: Difficulty::Medium,
            nb_questions: 10,
            time_limit: 20,
            mode,
            max_players: 4,
            lives,
        }
    }

    fn session(mode: GameMode, lives: u32, question_ids: Vec<QuestionId>) -> SessionContext {
        SessionContext::new(1, rules(mode, lives), 1, question_ids, bank(), true)
    }

    /// Join players 1..=n as p1..pn and run start + countdown.
    fn playing(mode: GameMode, lives: u32, n: u64) -> SessionContext {
        let mut ctx = session(mode, lives, (0..10).collect());
        for id in 1..=n {
            ctx.join(id, &format!("p{}", id)).unwrap();
        }
        let now = Instant::now();
        ctx.start(1, now).unwrap();
        ctx.handle_timer(now);
        assert!(ctx.question_open());
        ctx
    }

    #[test]
    fn test_join_guards() {
        let mut ctx = session(GameMode::Solo, 0, (0..10).collect());
        for id in 1..=4 {
            ctx.join(id, &format!("p{}", id)).unwrap();
        }
        assert_eq!(ctx.join(5, "p5"), Err(Error::SessionIsFull(4)));
        ctx.leave(4, Instant::now());
        assert_eq!(ctx.join(1, "p1"), Err(Error::PlayerAlreadyJoined("p1".into())));

        let now = Instant::now();
        ctx.start(1, now).unwrap();
        assert_eq!(ctx.join(5, "p5"), Err(Error::SessionNotJoinable));
    }

    #[test]
    fn test_leave_hands_over_creator() {
        let mut ctx = session(GameMode::Solo, 0, (0..10).collect());
        ctx.join(1, "p1").unwrap();
        ctx.join(2, "p2").unwrap();
        ctx.join(3, "p3").unwrap();

        let effects = ctx.leave(1, Instant::now());
        assert_eq!(ctx.creator, 2);
        match &effects[0] {
            Effect::Send { event, .. } => match event {
                ServerEvent::PlayerLeft {
                    pseudo,
                    nb_players,
                    new_creator,
                } => {
                    assert_eq!(pseudo, "p1");
                    assert_eq!(*nb_players, 2);
                    assert_eq!(new_creator.as_deref(), Some("p2"));
                }
                _ => panic!("expected PlayerLeft"),
            },
            _ => panic!("expected Send"),
        }
    }

    #[test]
    fn test_last_player_leaving_finishes() {
        let mut ctx = session(GameMode::Solo, 0, (0..10).collect());
        ctx.join(1, "p1").unwrap();
        let effects = ctx.leave(1, Instant::now());
        assert!(ctx.finished());
        assert!(matches!(effects[0], Effect::Finished));
    }

    #[test]
    fn test_response_time_clamped() {
        let mut ctx = playing(GameMode::Solo, 0, 2);
        ctx.record_answer(1, AnswerValue::Index(2), -5.0, Instant::now())
            .unwrap();
        let p1 = ctx.player(1).unwrap();
        assert_eq!(p1.response_time, 21.0);
        // Clamped to the slowest possible: no speed bonus.
        assert_eq!(p1.points_this_question, 10);
    }

    #[test]
    fn test_wrong_answer_type_is_incorrect() {
        let mut ctx = playing(GameMode::Solo, 0, 2);
        ctx.record_answer(1, AnswerValue::Bool(true), 1.0, Instant::now())
            .unwrap();
        let p1 = ctx.player(1).unwrap();
        assert!(p1.has_answered);
        assert!(!p1.was_correct);
    }

    #[test]
    fn test_text_answer_accent_folded() {
        let mut ctx = session(GameMode::Solo, 0, vec![100, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
        ctx.join(1, "p1").unwrap();
        ctx.join(2, "p2").unwrap();
        let now = Instant::now();
        ctx.start(1, now).unwrap();
        ctx.handle_timer(now);

        ctx.record_answer(1, AnswerValue::Text("GENEVE".into()), 2.0, now)
            .unwrap();
        assert!(ctx.player(1).unwrap().was_correct);
    }

    #[test]
    fn test_slowest_tie_goes_to_lowest_index() {
        let mut ctx = playing(GameMode::Battle, 3, 3);
        let now = Instant::now();
        ctx.record_answer(1, AnswerValue::Index(2), 10.0, now).unwrap();
        ctx.record_answer(2, AnswerValue::Index(2), 10.0, now).unwrap();
        // Last answer completes the question and runs the results.
        ctx.record_answer(3, AnswerValue::Index(2), 5.0, now).unwrap();

        // All correct; the slowest (p1, tie broken by index) pays one life.
        assert_eq!(ctx.player(1).unwrap().lives, 2);
        assert_eq!(ctx.player(2).unwrap().lives, 3);
        assert_eq!(ctx.player(3).unwrap().lives, 3);
    }

    #[test]
    fn test_solo_has_no_penalties() {
        let mut ctx = playing(GameMode::Solo, 0, 2);
        let now = Instant::now();
        ctx.record_answer(1, AnswerValue::Index(0), 2.0, now).unwrap();
        ctx.record_answer(2, AnswerValue::Index(1), 3.0, now).unwrap();
        assert!(!ctx.player(1).unwrap().eliminated);
        assert!(!ctx.finished());
        // Next question is scheduled.
        assert!(matches!(
            ctx.dispatch,
            Some(Dispatch {
                kind: DispatchKind::NextQuestion,
                ..
            })
        ));
    }

    #[test]
    fn test_timeout_marks_non_answerers() {
        let mut ctx = playing(GameMode::Battle, 2, 2);
        let now = Instant::now();
        ctx.record_answer(1, AnswerValue::Index(2), 2.0, now).unwrap();
        // p2 never answers; fire the question timeout.
        ctx.handle_timer(now);

        let p2 = ctx.player(2).unwrap();
        assert!(!p2.was_correct);
        assert_eq!(p2.answer, PlayerAnswer::None);
        assert_eq!(p2.response_time, 21.0);
        // Not answering costs no life; only wrong answers do.
        assert_eq!(p2.lives, 2);
    }

    #[test]
    fn test_battle_ranking_order() {
        let mut ctx = playing(GameMode::Battle, 3, 3);
        ctx.player_mut(1).unwrap().lives = 0;
        ctx.player_mut(1).unwrap().eliminated = true;
        ctx.player_mut(1).unwrap().eliminated_at = Some(2);
        ctx.player_mut(2).unwrap().lives = 0;
        ctx.player_mut(2).unwrap().eliminated = true;
        ctx.player_mut(2).unwrap().eliminated_at = Some(5);
        ctx.player_mut(3).unwrap().lives = 1;
        ctx.player_mut(3).unwrap().score = 0;

        let mut effects = vec![];
        ctx.end_session(&mut effects);

        let finished = effects
            .iter()
            .find_map(|e| match e {
                Effect::Send {
                    event: ServerEvent::Finished { winner, ranking, .. },
                    ..
                } => Some((winner.clone(), ranking.clone())),
                _ => None,
            })
            .unwrap();
        let (winner, ranking) = finished;
        // Survivor first, then the later elimination.
        assert_eq!(winner.as_deref(), Some("p3"));
        assert_eq!(ranking[0].pseudo, "p3");
        assert_eq!(ranking[1].pseudo, "p2");
        assert_eq!(ranking[2].pseudo, "p1");
        assert_eq!(ranking[2].rank, 3);
    }

    #[test]
    fn test_fifty_keeps_correct_option() {
        for _ in 0..20 {
            let mut ctx = playing(GameMode::Solo, 0, 2);
            let (reply, _) = ctx.use_joker(1, JokerKind::Fifty, Instant::now()).unwrap();
            match reply {
                JokerReply::Fifty { remaining } => {
                    assert_eq!(remaining.len(), 2);
                    assert!(remaining.contains(&"c".to_string()));
                }
                _ => panic!("expected fifty"),
            }
        }
    }

    #[test]
    fn test_skip_exempts_from_penalties() {
        let mut ctx = playing(GameMode::Battle, 1, 3);
        let now = Instant::now();
        ctx.use_joker(1, JokerKind::Skip, now).unwrap();
        ctx.record_answer(2, AnswerValue::Index(2), 1.0, now).unwrap();
        ctx.record_answer(3, AnswerValue::Index(2), 2.0, now).unwrap();

        // p1 skipped: no life lost despite was_correct being false.
        assert_eq!(ctx.player(1).unwrap().lives, 1);
        // The skip joker is single-use.
        assert_eq!(
            ctx.use_joker(1, JokerKind::Skip, now),
            Err(Error::SessionNotPlaying)
        );
    }
}
