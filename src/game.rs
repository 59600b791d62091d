//! Game-flow state machine and session state
//!
//! This module contains the main game struct and logic for driving a
//! Jeopardy-style session: consuming moderator input events, walking
//! the ten-state machine, mutating the board and team registry through
//! entry/exit effects, arming and cancelling the answer countdown, and
//! computing the finish ranking. One event is always processed to full
//! completion, including chained auto-transitions, before the next is
//! accepted.

use enum_map::{Enum, EnumMap};
use garde::Validate;
use itertools::Itertools;
use once_cell_serde::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

use crate::{
    board::{Board, FrameId, FrameStatus},
    constants,
    load::QuestionSet,
    session::Tunnel,
    teams::{RankingEntry, TeamId, TeamRegistry},
    timer::AnswerTimer,
};

/// The phases of a game session
///
/// The machine starts in `Normal` (board shown, frames selectable) and
/// ends in `Finished`, which accepts no further events. Every other
/// state belongs to the lifecycle of exactly one open question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum StateType {
    /// Board view; no active frame, waiting for a selection
    Normal,
    /// A frame's question is shown and the countdown runs
    ShowQuestion,
    /// The countdown expired with no team picked
    TimeOut,
    /// A team that wants to answer is being chosen
    PickTeam,
    /// The picked team ran out of its answering time
    TeamTimedOut,
    /// The moderator is judging the given answer
    PickRightOrWrong,
    /// The answer was judged wrong
    WrongAnswer,
    /// The answer was judged right
    RightAnswer,
    /// The moderator abandoned the question via the cancel pseudo-team
    NoAnswers,
    /// All frames are resolved; the session is over
    Finished,
}

/// The moderator's verdict on a given answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Judgement {
    /// The answer was correct
    Right,
    /// The answer was incorrect
    Wrong,
}

/// Input events submitted to the game
///
/// Events invalid for the current state are silently ignored; the
/// timer's expiry is not an incoming message but arrives through
/// [`Game::tick`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub enum IncomingMessage {
    /// A frame was chosen from the board (valid in `Normal`)
    SelectFrame(FrameId),
    /// A team was chosen to answer (valid in `PickTeam`)
    SelectTeam(TeamId),
    /// The given answer was judged (valid in `PickRightOrWrong`)
    Judge(Judgement),
    /// The moderator confirmed the currently shown result or question
    Acknowledge,
}

/// Validates that the configured answer time falls within bounds
fn validate_answer_time(val: &Duration) -> garde::Result {
    let millis = val.as_millis() as u64;
    if (constants::timer::MIN_ANSWER_TIME..=constants::timer::MAX_ANSWER_TIME).contains(&millis) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "answer_time is outside of the bounds [{},{}] ms",
            constants::timer::MIN_ANSWER_TIME,
            constants::timer::MAX_ANSWER_TIME,
        )))
    }
}

/// Per-session configuration options
///
/// These replace what the original program kept as process-wide state:
/// whether board frames react to hovering at all, and how long a
/// question stays open for answering.
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Options {
    /// Whether still-hidden frames are marked selectable on the board
    #[garde(skip)]
    pub hover_enabled: bool,
    /// Total time a question stays open, across all team hand-offs
    #[garde(custom(|v, _| validate_answer_time(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub answer_time: Duration,
}

impl Default for Options {
    /// Hovering enabled, five-second answer countdown
    fn default() -> Self {
        Self {
            hover_enabled: true,
            answer_time: Duration::from_millis(constants::timer::DEFAULT_ANSWER_TIME),
        }
    }
}

/// Errors that can occur when constructing a game session
#[derive(Error, Debug)]
pub enum Error {
    /// No team names were supplied
    #[error("at least one team is required")]
    NoTeams,
    /// More teams than the board can seat
    #[error("at most {} teams are supported", constants::teams::MAX_TEAM_COUNT)]
    TooManyTeams,
    /// A team name was empty or too long
    #[error("invalid team name {0:?}")]
    InvalidTeamName(String),
    /// The question set or options failed validation
    #[error(transparent)]
    Invalid(#[from] garde::Report),
}

/// Counters of how questions were resolved over the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Questions answered correctly
    pub right: usize,
    /// Questions answered wrongly or abandoned
    pub wrong: usize,
    /// Answering attempts lost to the per-team countdown
    pub timed_out: usize,
}

/// Update messages sent to the display about changes in the game
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// A frame was revealed; its question is now open
    QuestionAnnouncement {
        /// The revealed frame
        frame: FrameId,
        /// The frame's monetary value
        value: i64,
        /// The question text
        question: String,
        /// Time left before the question times out
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        duration: Duration,
    },
    /// A team must be picked; lists the teams still allowed to answer
    PickTeamPrompt {
        /// Teams not yet in the attempted-set, plus the cancel entry
        eligible: Vec<(TeamId, String)>,
    },
    /// A team's score changed
    ScoreChange {
        /// The team whose score changed
        team: TeamId,
        /// The team's display name
        name: String,
        /// The applied delta (negative for penalties)
        delta: i64,
        /// The team's new total
        total: i64,
    },
    /// A frame was resolved and its answer can be shown
    AnswerReveal {
        /// The resolved frame
        frame: FrameId,
        /// The answer text (may be empty)
        answer: String,
        /// How the frame resolved
        status: FrameStatus,
    },
    /// The session ended; final standings
    Podium {
        /// The finish ranking, best first
        standings: Vec<RankingEntry>,
    },
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// A frame as seen in a board snapshot
#[derive(Debug, Serialize, Clone)]
pub struct FrameSnapshot {
    /// The frame's grid coordinates
    pub id: FrameId,
    /// The frame's monetary value
    pub value: i64,
    /// The frame's resolution status
    pub status: FrameStatus,
    /// Whether the frame is currently offered for selection
    pub selectable: bool,
}

/// A team's standing as seen in a board snapshot
#[derive(Debug, Serialize, Clone)]
pub struct TeamScore {
    /// The team
    pub team: TeamId,
    /// The team's display name
    pub name: String,
    /// The team's current score
    pub score: i64,
}

/// Sync messages carrying a complete view for a (re)connecting display
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The board view: frame grid, scores, and progress
    Board {
        /// Topic labels in column order
        topics: Vec<String>,
        /// All frames with their statuses
        frames: Vec<FrameSnapshot>,
        /// All competing teams with their scores
        scores: Vec<TeamScore>,
        /// Frames not yet resolved
        frames_left: usize,
    },
    /// An open-question view
    Question {
        /// The active frame
        frame: FrameId,
        /// The frame's monetary value
        value: i64,
        /// The question text
        question: String,
        /// Time left on the answer countdown
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        remaining: Duration,
        /// Teams that already tried and failed this question
        attempted: Vec<TeamId>,
        /// The current machine state
        state: StateType,
    },
    /// The end-of-session podium view
    Podium {
        /// The finish ranking, best first
        standings: Vec<RankingEntry>,
    },
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Builds the allowed-transition table
///
/// Pair-by-pair, mirroring the original machine's construction. The
/// `PickTeam → TeamTimedOut` edge is present but nothing currently
/// raises the per-team expiry, so `TeamTimedOut` stays defined yet
/// unreachable.
fn transition_table() -> EnumMap<StateType, Vec<StateType>> {
    use StateType::{
        Finished, NoAnswers, Normal, PickRightOrWrong, PickTeam, RightAnswer, ShowQuestion,
        TeamTimedOut, TimeOut, WrongAnswer,
    };

    let mut table: EnumMap<StateType, Vec<StateType>> = EnumMap::default();
    let mut add = |from: StateType, to: StateType| table[from].push(to);

    add(Normal, ShowQuestion);
    add(ShowQuestion, TimeOut);
    add(ShowQuestion, PickTeam);
    add(TimeOut, Normal);
    add(TimeOut, Finished);
    add(PickTeam, NoAnswers);
    add(NoAnswers, Normal);
    add(NoAnswers, Finished);
    add(PickTeam, PickRightOrWrong);
    add(PickTeam, TeamTimedOut);
    add(TeamTimedOut, ShowQuestion);
    add(PickRightOrWrong, RightAnswer);
    add(PickRightOrWrong, WrongAnswer);
    add(RightAnswer, Normal);
    add(RightAnswer, Finished);
    add(WrongAnswer, ShowQuestion);
    add(WrongAnswer, Normal);
    add(WrongAnswer, Finished);

    table
}

/// The main game session struct
///
/// Owns the board, the team registry, and the answer countdown; the
/// machine references frames and teams by stable id only. All mutation
/// happens inside the single synchronous event-processing path.
#[derive(Serialize, Deserialize)]
pub struct Game {
    board: Board,
    teams: TeamRegistry,
    timer: AnswerTimer,
    state: StateType,
    current_frame: Option<FrameId>,
    active_team: Option<TeamId>,
    /// Next state a result screen moves to once acknowledged
    requested: Option<StateType>,
    frames_left: usize,
    summary: Summary,
    options: Options,
    /// Final ranking, computed once on entering `Finished`
    #[serde(skip)]
    final_ranking: OnceCell<Vec<RankingEntry>>,
    #[serde(skip, default = "transition_table")]
    transitions: EnumMap<StateType, Vec<StateType>>,
}

impl std::fmt::Debug for Game {
    /// Custom debug implementation that avoids printing the whole board
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("state", &self.state)
            .field("frames_left", &self.frames_left)
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Creates a new game session from a parsed question set
    ///
    /// Validates the set and options, registers the teams plus the
    /// cancel pseudo-team, builds the board, and starts in `Normal`
    /// with every frame selectable (subject to `hover_enabled`).
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the set or options fail validation, if
    /// no team names are given, if there are more than the supported
    /// maximum, or if a name is empty or too long.
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(
        set: QuestionSet,
        team_names: I,
        options: Options,
    ) -> Result<Self, Error> {
        set.validate()?;
        options.validate()?;

        let team_names = team_names.into_iter().map(Into::into).collect_vec();
        if team_names.is_empty() {
            return Err(Error::NoTeams);
        }
        if team_names.len() > constants::teams::MAX_TEAM_COUNT {
            return Err(Error::TooManyTeams);
        }
        if let Some(name) = team_names
            .iter()
            .find(|n| n.trim().is_empty() || n.len() > constants::teams::MAX_NAME_LENGTH)
        {
            return Err(Error::InvalidTeamName(name.clone()));
        }

        let board = Board::new(
            set.topics
                .into_iter()
                .map(|topic| {
                    (
                        topic.name,
                        topic
                            .questions
                            .into_iter()
                            .map(|q| (q.question, q.answer))
                            .collect(),
                    )
                })
                .collect(),
            constants::board::ROWS_PER_TOPIC,
        );
        let frames_left = board.frame_count();

        let mut game = Self {
            board,
            teams: TeamRegistry::new(team_names),
            timer: AnswerTimer::new(options.answer_time),
            state: StateType::Normal,
            current_frame: None,
            active_team: None,
            requested: None,
            frames_left,
            summary: Summary::default(),
            options,
            final_ranking: OnceCell::new(),
            transitions: transition_table(),
        };
        game.board.set_hidden_selectable(game.options.hover_enabled);

        Ok(game)
    }

    /// Returns the current machine state
    pub fn state(&self) -> StateType {
        self.state
    }

    /// Returns the number of frames not yet resolved
    pub fn frames_left(&self) -> usize {
        self.frames_left
    }

    /// Returns the board
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the team registry
    pub fn teams(&self) -> &TeamRegistry {
        &self.teams
    }

    /// Returns the answer countdown
    pub fn timer(&self) -> &AnswerTimer {
        &self.timer
    }

    /// Returns the frame currently being played, if any
    pub fn current_frame(&self) -> Option<FrameId> {
        self.current_frame
    }

    /// Returns the team currently answering, if any
    pub fn active_team(&self) -> Option<TeamId> {
        self.active_team
    }

    /// Returns the resolution counters
    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Returns the standings: the cached finish ranking once the
    /// session is over, the live standings before that
    pub fn ranking(&self) -> Vec<RankingEntry> {
        self.final_ranking
            .get()
            .cloned()
            .unwrap_or_else(|| self.teams.ranking())
    }

    /// Handles an incoming input event
    ///
    /// Events invalid for the current state are silently ignored, and a
    /// finished session accepts nothing at all. The event is processed
    /// to full completion, including chained auto-transitions, before
    /// this method returns.
    pub fn receive_message<T: Tunnel>(&mut self, message: IncomingMessage, tunnel: &T) {
        use StateType::{
            Finished, NoAnswers, Normal, PickRightOrWrong, PickTeam, RightAnswer, ShowQuestion,
            TeamTimedOut, TimeOut, WrongAnswer,
        };

        if matches!(self.state, Finished) {
            return;
        }

        match (self.state, message) {
            (Normal, IncomingMessage::SelectFrame(id)) => self.select_frame(id, tunnel),
            (ShowQuestion, IncomingMessage::Acknowledge) => {
                // Consumed time stays in the accumulator so the
                // countdown resumes if the question comes back.
                self.timer.cancel();
                self.next(PickTeam, tunnel);
            }
            (PickTeam, IncomingMessage::SelectTeam(id)) => self.select_team(id, tunnel),
            (PickRightOrWrong, IncomingMessage::Judge(judgement)) => {
                let verdict = match judgement {
                    Judgement::Right => RightAnswer,
                    Judgement::Wrong => WrongAnswer,
                };
                self.next(verdict, tunnel);
            }
            (
                TimeOut | TeamTimedOut | WrongAnswer | RightAnswer | NoAnswers,
                IncomingMessage::Acknowledge,
            ) => {
                debug_assert!(self.requested.is_some());
                if let Some(to) = self.requested.take() {
                    self.next(to, tunnel);
                }
            }
            _ => {}
        }
    }

    /// Advances the answer countdown by the given wall-time delta
    ///
    /// Expiry while the question is shown fails the frame and resolves
    /// the question as timed out. Ticks in any other state are ignored;
    /// the timer is always disarmed by then, so a stale tick never
    /// mutates anything.
    pub fn tick<T: Tunnel>(&mut self, delta: Duration, tunnel: &T) {
        if matches!(self.state, StateType::ShowQuestion) && self.timer.tick(delta) {
            self.next(StateType::TimeOut, tunnel);
        }
    }

    /// Returns the message necessary to synchronize a display's view
    pub fn state_message(&self) -> SyncMessage {
        if matches!(self.state, StateType::Finished) {
            return SyncMessage::Podium {
                standings: self.ranking(),
            };
        }

        if let Some(id) = self.current_frame {
            if let Some(frame) = self.board.frame_at(id) {
                return SyncMessage::Question {
                    frame: id,
                    value: frame.value(),
                    question: frame.question().to_string(),
                    remaining: self.timer.remaining(),
                    attempted: self
                        .teams
                        .competing()
                        .map(|(team, _)| team)
                        .filter(|team| self.teams.has_attempted(*team))
                        .collect_vec(),
                    state: self.state,
                };
            }
        }

        SyncMessage::Board {
            topics: self
                .board
                .topics()
                .iter()
                .map(|t| t.name().to_string())
                .collect_vec(),
            frames: self
                .board
                .frames()
                .iter()
                .map(|f| FrameSnapshot {
                    id: f.id(),
                    value: f.value(),
                    status: f.status(),
                    selectable: f.selectable(),
                })
                .collect_vec(),
            scores: self
                .teams
                .competing()
                .map(|(team, t)| TeamScore {
                    team,
                    name: t.name().to_string(),
                    score: t.score(),
                })
                .collect_vec(),
            frames_left: self.frames_left,
        }
    }

    /// Handles a frame selection from the board in `Normal`
    ///
    /// Selecting an unknown or already-resolved frame is a no-op.
    fn select_frame<T: Tunnel>(&mut self, id: FrameId, tunnel: &T) {
        let Some(frame) = self.board.frame_at(id) else {
            return;
        };
        if frame.status() != FrameStatus::Hidden {
            return;
        }

        // The other frames stop reacting while a question is open.
        self.current_frame = Some(id);
        self.board.set_hidden_selectable(false);
        self.next(StateType::ShowQuestion, tunnel);
    }

    /// Handles a team selection in `PickTeam`
    ///
    /// The cancel pseudo-team abandons the question; a team already in
    /// the attempted-set is not selectable and the event is a no-op.
    fn select_team<T: Tunnel>(&mut self, id: TeamId, tunnel: &T) {
        if id == self.teams.cancel_id() {
            self.next(StateType::NoAnswers, tunnel);
            return;
        }
        if self.teams.team(id).is_none() || self.teams.has_attempted(id) {
            return;
        }

        self.active_team = Some(id);
        self.next(StateType::PickRightOrWrong, tunnel);
    }

    /// Moves the machine to `to`, running exit and entry effects
    ///
    /// Entry effects may demand a further transition (the
    /// all-teams-attempted auto-timeout); those chain synchronously
    /// until the machine settles. A target missing from the transition
    /// table is a programming error: debug assert, no-op in release.
    fn next<T: Tunnel>(&mut self, to: StateType, tunnel: &T) {
        let mut pending = Some(to);
        while let Some(to) = pending.take() {
            debug_assert!(
                self.transitions[self.state].contains(&to),
                "no transition from {:?} to {to:?}",
                self.state,
            );
            if !self.transitions[self.state].contains(&to) {
                return;
            }

            self.on_exited(self.state);
            self.state = to;
            pending = self.on_entered(to, tunnel);
        }
    }

    /// Runs the exit effects of a state being left
    fn on_exited(&mut self, state: StateType) {
        match state {
            StateType::Normal => {
                self.active_team = None;
            }
            StateType::PickTeam => {
                self.teams.set_untried_selectable(false);
            }
            _ => {}
        }
    }

    /// Runs the entry effects of a state just entered
    ///
    /// Returns the state an auto-transition demands, if any.
    fn on_entered<T: Tunnel>(&mut self, state: StateType, tunnel: &T) -> Option<StateType> {
        match state {
            StateType::Normal => {
                debug_assert_eq!(self.teams.attempted_len(), 0);
                debug_assert!(self.active_team.is_none());
                debug_assert!(self.current_frame.is_none());
                self.timer.reset();
                self.board.set_hidden_selectable(self.options.hover_enabled);
                None
            }
            StateType::ShowQuestion => self.enter_show_question(tunnel),
            StateType::TimeOut => {
                debug_assert!(self.current_frame.is_some());
                self.fail_current_frame(tunnel);
                self.finish_question();
                None
            }
            StateType::PickTeam => {
                self.active_team = None;
                self.teams.set_untried_selectable(true);
                let eligible = self
                    .teams
                    .competing()
                    .filter(|(id, _)| !self.teams.has_attempted(*id))
                    .map(|(id, team)| (id, team.name().to_string()))
                    .chain(std::iter::once((
                        self.teams.cancel_id(),
                        constants::teams::CANCEL_NAME.to_string(),
                    )))
                    .collect_vec();
                tunnel.send_message(&UpdateMessage::PickTeamPrompt { eligible });
                None
            }
            StateType::TeamTimedOut => {
                self.summary.timed_out += 1;
                self.fail_active_team(tunnel);
                None
            }
            StateType::WrongAnswer => {
                self.summary.wrong += 1;
                self.fail_active_team(tunnel);
                None
            }
            StateType::RightAnswer => {
                self.summary.right += 1;
                self.reward_active_team(tunnel);
                self.finish_question();
                None
            }
            StateType::NoAnswers => {
                debug_assert!(self.active_team.is_none());
                self.summary.wrong += 1;
                self.fail_current_frame(tunnel);
                self.finish_question();
                None
            }
            StateType::PickRightOrWrong => None,
            StateType::Finished => {
                let standings = self
                    .final_ranking
                    .get_or_init(|| self.teams.ranking())
                    .clone();
                tunnel.send_message(&UpdateMessage::Podium { standings });
                None
            }
        }
    }

    /// `ShowQuestion` entry: auto-timeout or arm the countdown
    ///
    /// If every team has already failed this question there is nobody
    /// left to offer it to, so the machine falls straight through to
    /// `TimeOut` without arming the timer. Re-arming after a hand-off
    /// resumes from the accumulator; an exhausted budget also times the
    /// question out immediately.
    fn enter_show_question<T: Tunnel>(&mut self, tunnel: &T) -> Option<StateType> {
        if self.teams.attempted_len() == self.teams.team_count() {
            return Some(StateType::TimeOut);
        }

        debug_assert!(self.current_frame.is_some());
        let remaining = self.timer.arm();
        if remaining.is_zero() {
            return Some(StateType::TimeOut);
        }

        if let Some(frame) = self.current_frame.and_then(|id| self.board.frame_at(id)) {
            tunnel.send_message(&UpdateMessage::QuestionAnnouncement {
                frame: frame.id(),
                value: frame.value(),
                question: frame.question().to_string(),
                duration: remaining,
            });
        }
        None
    }

    /// Marks the current frame failed and reveals its answer
    fn fail_current_frame<T: Tunnel>(&mut self, tunnel: &T) {
        let Some(id) = self.current_frame else {
            return;
        };
        let answer = self
            .board
            .frame_at(id)
            .map_or_else(String::new, |f| f.answer().to_string());
        self.board.mark(id, FrameStatus::Failed);
        tunnel.send_message(&UpdateMessage::AnswerReveal {
            frame: id,
            answer,
            status: FrameStatus::Failed,
        });
    }

    /// Shared `WrongAnswer`/`TeamTimedOut` entry bookkeeping
    ///
    /// Deducts half the frame's value from the active team, fails the
    /// frame, and records the team in the attempted-set: it has now
    /// tried and failed. If only one team remains untried the question
    /// is over; otherwise it is handed back via `ShowQuestion` for the
    /// next team.
    fn fail_active_team<T: Tunnel>(&mut self, tunnel: &T) {
        debug_assert!(self.active_team.is_some());
        debug_assert!(self.current_frame.is_some());
        let (Some(team), Some(frame_id)) = (self.active_team, self.current_frame) else {
            return;
        };

        let penalty = self.board.frame_at(frame_id).map_or(0, |f| f.value() / 2);
        self.teams.add_points(team, -penalty);
        self.send_score_change(team, -penalty, tunnel);
        self.fail_current_frame(tunnel);
        self.teams.mark_attempted(team);

        if self.teams.attempted_len() + 1 == self.teams.team_count() {
            self.finish_question();
        } else {
            self.requested = Some(StateType::ShowQuestion);
        }
    }

    /// `RightAnswer` entry bookkeeping: full value, frame succeeded
    fn reward_active_team<T: Tunnel>(&mut self, tunnel: &T) {
        debug_assert!(self.active_team.is_some());
        debug_assert!(self.current_frame.is_some());
        let (Some(team), Some(frame_id)) = (self.active_team, self.current_frame) else {
            return;
        };

        let (value, answer) = self
            .board
            .frame_at(frame_id)
            .map_or((0, String::new()), |f| (f.value(), f.answer().to_string()));
        self.teams.add_points(team, value);
        self.send_score_change(team, value, tunnel);
        self.board.mark(frame_id, FrameStatus::Succeeded);
        tunnel.send_message(&UpdateMessage::AnswerReveal {
            frame: frame_id,
            answer,
            status: FrameStatus::Succeeded,
        });
    }

    /// Announces a score delta together with the new total
    fn send_score_change<T: Tunnel>(&self, team: TeamId, delta: i64, tunnel: &T) {
        if let Some(t) = self.teams.team(team) {
            tunnel.send_message(&UpdateMessage::ScoreChange {
                team,
                name: t.name().to_string(),
                delta,
                total: t.score(),
            });
        }
    }

    /// Resolves the open question and requests the follow-up state
    ///
    /// Clears the active frame and team, empties the attempted-set, and
    /// decrements the remaining-frames counter; the machine moves to
    /// `Finished` when it hits zero, `Normal` otherwise, once the
    /// result screen is acknowledged.
    fn finish_question(&mut self) {
        debug_assert!(self.current_frame.is_some());
        debug_assert!(self.frames_left > 0);
        if let Some(id) = self.current_frame.take() {
            self.board.set_selectable(id, false);
        }
        self.active_team = None;
        self.teams.clear_attempted();
        self.frames_left = self.frames_left.saturating_sub(1);
        self.requested = Some(if self.frames_left == 0 {
            StateType::Finished
        } else {
            StateType::Normal
        });
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::load::{QuestionConfig, QuestionSet, TopicConfig};

    #[derive(Debug, Default)]
    struct MockTunnel {
        messages: RefCell<Vec<UpdateMessage>>,
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.messages.borrow_mut().push(message.clone());
        }

        fn send_state(&self, _state: &SyncMessage) {}
    }

    fn question_set(topics: usize) -> QuestionSet {
        QuestionSet {
            topics: (0..topics)
                .map(|t| TopicConfig {
                    name: format!("Topic {t}"),
                    questions: (0..5)
                        .map(|r| QuestionConfig {
                            question: format!("q{t}-{r}"),
                            answer: format!("a{t}-{r}"),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn game(team_names: &[&str]) -> Game {
        Game::new(question_set(1), team_names.iter().copied(), Options::default()).unwrap()
    }

    fn team_ids(game: &Game) -> Vec<TeamId> {
        game.teams().competing().map(|(id, _)| id).collect()
    }

    fn frame(row: usize, col: usize) -> FrameId {
        FrameId { row, col }
    }

    /// Drives the machine up to `PickRightOrWrong` for the given team.
    fn open_question_for(game: &mut Game, id: FrameId, team: TeamId, tunnel: &MockTunnel) {
        game.receive_message(IncomingMessage::SelectFrame(id), tunnel);
        game.receive_message(IncomingMessage::Acknowledge, tunnel);
        game.receive_message(IncomingMessage::SelectTeam(team), tunnel);
        assert_eq!(game.state(), StateType::PickRightOrWrong);
    }

    #[test]
    fn test_initial_state() {
        let g = game(&["One", "Two"]);
        assert_eq!(g.state(), StateType::Normal);
        assert_eq!(g.frames_left(), 5);
        assert!(g.current_frame().is_none());
        assert!(g.board().frame_at(frame(0, 0)).unwrap().selectable());
    }

    #[test]
    fn test_construction_errors() {
        let names: [&str; 0] = [];
        assert!(matches!(
            Game::new(question_set(1), names, Options::default()),
            Err(Error::NoTeams)
        ));
        assert!(matches!(
            Game::new(question_set(1), vec!["t"; 13], Options::default()),
            Err(Error::TooManyTeams)
        ));
        assert!(matches!(
            Game::new(question_set(1), ["ok", "  "], Options::default()),
            Err(Error::InvalidTeamName(_))
        ));
        assert!(matches!(
            Game::new(QuestionSet { topics: vec![] }, ["ok"], Options::default()),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn test_options_validation() {
        let bad = Options {
            hover_enabled: true,
            answer_time: Duration::from_millis(10),
        };
        assert!(bad.validate().is_err());
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn test_right_answer_awards_full_value() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);

        assert_eq!(g.state(), StateType::RightAnswer);
        assert_eq!(g.teams().team(ids[0]).unwrap().score(), 100);
        assert_eq!(g.board().status_of(frame(0, 0)), FrameStatus::Succeeded);
        assert_eq!(g.frames_left(), 4);
        assert_eq!(g.summary().right, 1);

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Normal);
    }

    #[test]
    fn test_wrong_answer_resolves_with_two_teams() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Wrong), &tunnel);

        assert_eq!(g.state(), StateType::WrongAnswer);
        assert_eq!(g.teams().team(ids[0]).unwrap().score(), -50);
        assert_eq!(g.teams().team(ids[1]).unwrap().score(), 0);
        assert_eq!(g.board().status_of(frame(0, 0)), FrameStatus::Failed);
        // Resolved immediately: the other team is not offered the
        // question, the counter already dropped.
        assert_eq!(g.frames_left(), 4);
        assert_eq!(g.teams().attempted_len(), 0);

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Normal);
    }

    #[test]
    fn test_full_game_reaches_finished() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        for row in 0..5 {
            assert_eq!(g.state(), StateType::Normal);
            let team = ids[row % 2];
            open_question_for(&mut g, frame(row, 0), team, &tunnel);
            g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);
            assert_eq!(g.frames_left(), 4 - row);
            g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        }

        assert_eq!(g.state(), StateType::Finished);
        assert_eq!(g.frames_left(), 0);

        // One: rows 0, 2, 4 -> 100 + 300 + 500; Two: rows 1, 3 -> 200 + 400.
        let ranking = g.ranking();
        assert_eq!(ranking[0].name, "One");
        assert_eq!(ranking[0].score, 900);
        assert_eq!(ranking[1].name, "Two");
        assert_eq!(ranking[1].score, 600);

        // The terminal state rejects everything.
        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Finished);
        assert_eq!(g.ranking(), ranking);
    }

    #[test]
    fn test_single_team_wrong_answer_hits_auto_timeout() {
        // With a single team, a wrong answer hands the question back to
        // a ShowQuestion where everyone has already failed: the machine
        // must fall straight through to TimeOut without arming the
        // timer.
        let mut g = game(&["Solo"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Wrong), &tunnel);
        assert_eq!(g.state(), StateType::WrongAnswer);
        assert_eq!(g.frames_left(), 5);

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::TimeOut);
        assert!(!g.timer().is_armed());
        assert_eq!(g.frames_left(), 4);
        // The penalty was applied exactly once.
        assert_eq!(g.teams().team(ids[0]).unwrap().score(), -50);

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Normal);
    }

    #[test]
    fn test_cancel_team_abandons_question() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);
        let wrong_before = g.summary().wrong;

        g.receive_message(IncomingMessage::SelectFrame(frame(2, 0)), &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::PickTeam);
        g.receive_message(IncomingMessage::SelectTeam(g.teams().cancel_id()), &tunnel);

        assert_eq!(g.state(), StateType::NoAnswers);
        assert_eq!(g.board().status_of(frame(2, 0)), FrameStatus::Failed);
        assert_eq!(g.teams().team(ids[0]).unwrap().score(), 0);
        assert_eq!(g.teams().team(ids[1]).unwrap().score(), 0);
        assert_eq!(g.summary().wrong, wrong_before + 1);
        assert_eq!(g.frames_left(), 4);

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Normal);
    }

    #[test]
    fn test_selecting_resolved_frame_is_idempotent() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Normal);

        let scores_before: Vec<i64> =
            g.teams().competing().map(|(_, t)| t.score()).collect();
        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);

        assert_eq!(g.state(), StateType::Normal);
        assert_eq!(g.frames_left(), 4);
        assert_eq!(g.teams().attempted_len(), 0);
        let scores_after: Vec<i64> =
            g.teams().competing().map(|(_, t)| t.score()).collect();
        assert_eq!(scores_before, scores_after);
    }

    #[test]
    fn test_wrong_answer_hands_question_to_next_team() {
        let mut g = game(&["One", "Two", "Three"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Wrong), &tunnel);
        assert_eq!(g.state(), StateType::WrongAnswer);
        // Question not resolved yet; One is in the attempted-set.
        assert_eq!(g.frames_left(), 5);
        assert!(g.teams().has_attempted(ids[0]));

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::ShowQuestion);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::PickTeam);

        // The team that already failed cannot be picked again.
        g.receive_message(IncomingMessage::SelectTeam(ids[0]), &tunnel);
        assert_eq!(g.state(), StateType::PickTeam);
        assert!(!g.teams().team(ids[0]).unwrap().selectable());

        g.receive_message(IncomingMessage::SelectTeam(ids[1]), &tunnel);
        assert_eq!(g.state(), StateType::PickRightOrWrong);
        g.receive_message(IncomingMessage::Judge(Judgement::Wrong), &tunnel);

        // Two failing leaves only Three untried: the question resolves.
        assert_eq!(g.frames_left(), 4);
        assert_eq!(g.teams().team(ids[0]).unwrap().score(), -50);
        assert_eq!(g.teams().team(ids[1]).unwrap().score(), -50);
        assert_eq!(g.teams().team(ids[2]).unwrap().score(), 0);
    }

    #[test]
    fn test_timer_expiry_times_question_out() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();

        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);
        assert_eq!(g.state(), StateType::ShowQuestion);
        assert!(g.timer().is_armed());

        g.tick(Duration::from_millis(5000), &tunnel);
        assert_eq!(g.state(), StateType::TimeOut);
        assert_eq!(g.board().status_of(frame(0, 0)), FrameStatus::Failed);
        assert_eq!(g.frames_left(), 4);
        // Nobody answered; nobody is penalized.
        assert!(g.teams().competing().all(|(_, t)| t.score() == 0));

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::Normal);
        assert_eq!(g.timer().elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_countdown_resumes_after_handoff() {
        let mut g = game(&["One", "Two", "Three"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);
        g.tick(Duration::from_millis(2000), &tunnel);
        assert_eq!(g.state(), StateType::ShowQuestion);

        // Acknowledging cancels the countdown but keeps the progress.
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert!(!g.timer().is_armed());
        assert_eq!(g.timer().elapsed(), Duration::from_millis(2000));

        g.receive_message(IncomingMessage::SelectTeam(ids[0]), &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Wrong), &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::ShowQuestion);
        assert_eq!(g.timer().remaining(), Duration::from_millis(3000));

        g.tick(Duration::from_millis(3000), &tunnel);
        assert_eq!(g.state(), StateType::TimeOut);
    }

    #[test]
    fn test_tick_outside_show_question_is_ignored() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();

        g.tick(Duration::from_millis(60_000), &tunnel);
        assert_eq!(g.state(), StateType::Normal);

        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::PickTeam);
        g.tick(Duration::from_millis(60_000), &tunnel);
        assert_eq!(g.state(), StateType::PickTeam);
    }

    #[test]
    fn test_invalid_events_are_ignored() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        g.receive_message(IncomingMessage::SelectTeam(ids[0]), &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);
        assert_eq!(g.state(), StateType::Normal);

        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);
        g.receive_message(IncomingMessage::SelectFrame(frame(1, 0)), &tunnel);
        assert_eq!(g.current_frame(), Some(frame(0, 0)));
    }

    #[test]
    fn test_hover_disabled_keeps_frames_unselectable() {
        let options = Options {
            hover_enabled: false,
            ..Options::default()
        };
        let g = Game::new(question_set(1), ["One", "Two"], options).unwrap();
        assert!(g.board().frames().iter().all(|f| !f.selectable()));
    }

    #[test]
    fn test_update_messages_flow() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);

        let messages = tunnel.messages.borrow();
        assert!(matches!(
            messages[0],
            UpdateMessage::QuestionAnnouncement { value: 100, .. }
        ));
        assert!(matches!(messages[1], UpdateMessage::PickTeamPrompt { .. }));
        assert!(matches!(
            messages[2],
            UpdateMessage::ScoreChange {
                delta: 100,
                total: 100,
                ..
            }
        ));
        assert!(matches!(
            messages[3],
            UpdateMessage::AnswerReveal {
                status: FrameStatus::Succeeded,
                ..
            }
        ));
    }

    #[test]
    fn test_podium_announced_on_finish() {
        let mut g = game(&["Solo"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        for row in 0..5 {
            open_question_for(&mut g, frame(row, 0), ids[0], &tunnel);
            g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);
            g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        }

        assert_eq!(g.state(), StateType::Finished);
        let messages = tunnel.messages.borrow();
        assert!(matches!(
            messages.last(),
            Some(UpdateMessage::Podium { standings }) if standings.len() == 1
        ));
    }

    #[test]
    fn test_state_message_snapshots() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();

        assert!(matches!(g.state_message(), SyncMessage::Board { .. }));

        g.receive_message(IncomingMessage::SelectFrame(frame(0, 0)), &tunnel);
        assert!(matches!(
            g.state_message(),
            SyncMessage::Question {
                state: StateType::ShowQuestion,
                ..
            }
        ));

        let json = g.state_message().to_message();
        assert!(json.contains("Question"));
        assert!(json.contains("q0-0"));
    }

    #[test]
    fn test_pick_team_prompt_excludes_attempted() {
        let mut g = game(&["One", "Two", "Three"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);

        open_question_for(&mut g, frame(0, 0), ids[0], &tunnel);
        g.receive_message(IncomingMessage::Judge(Judgement::Wrong), &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        g.receive_message(IncomingMessage::Acknowledge, &tunnel);
        assert_eq!(g.state(), StateType::PickTeam);

        let messages = tunnel.messages.borrow();
        let Some(UpdateMessage::PickTeamPrompt { eligible }) = messages
            .iter()
            .rev()
            .find(|m| matches!(m, UpdateMessage::PickTeamPrompt { .. }))
        else {
            panic!("expected a team prompt");
        };
        let names: Vec<&str> = eligible.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(names, ["Two", "Three", "Cancel"]);
    }

    #[test]
    fn test_finished_entered_exactly_once() {
        let mut g = game(&["One", "Two"]);
        let tunnel = MockTunnel::default();
        let ids = team_ids(&g);
        let mut finished_seen = 0;

        for row in 0..5 {
            open_question_for(&mut g, frame(row, 0), ids[0], &tunnel);
            g.receive_message(IncomingMessage::Judge(Judgement::Right), &tunnel);
            g.receive_message(IncomingMessage::Acknowledge, &tunnel);
            if g.state() == StateType::Finished {
                finished_seen += 1;
            }
        }

        assert_eq!(finished_seen, 1);
        assert_eq!(g.frames_left(), 0);
    }
}
