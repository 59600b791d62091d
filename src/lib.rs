//! # Jeopardy Game Library
//!
//! This library provides the core game logic for a Jeopardy-style quiz
//! session. It handles the question board, team registry and scoring,
//! the moderator-driven game-flow state machine, the answer countdown,
//! and loading question sets from the line-oriented round format.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod board;
pub mod constants;
pub mod game;
pub mod load;
pub mod session;
pub mod teams;
pub mod timer;

pub use board::{Board, FrameId, FrameStatus};
pub use game::{Game, IncomingMessage, Judgement, Options, StateType, SyncMessage, UpdateMessage};
pub use load::QuestionSet;
pub use session::Tunnel;
pub use teams::{Place, RankingEntry, TeamId, TeamRegistry};
pub use timer::AnswerTimer;
