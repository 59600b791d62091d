//! Configuration constants for the trivia game system
//!
//! This module contains the grid dimensions, registration limits, and
//! timing bounds used throughout the game core to keep loaded sessions
//! and per-session options within sane boundaries.

/// Board grid configuration constants
pub mod board {
    /// Number of question rows under every topic column
    pub const ROWS_PER_TOPIC: usize = 5;
    /// Maximum number of topic columns in a single session
    pub const MAX_TOPIC_COUNT: usize = 30;
    /// Maximum length of a topic label in characters
    pub const MAX_TOPIC_LENGTH: usize = 200;
    /// Monetary value of the first row; row `r` is worth `(r + 1) * VALUE_STEP`
    pub const VALUE_STEP: i64 = 100;
    /// Maximum length of a question or answer in characters
    pub const MAX_TEXT_LENGTH: usize = 500;
}

/// Team registration configuration constants
pub mod teams {
    /// Maximum number of competing teams in a single session
    pub const MAX_TEAM_COUNT: usize = 12;
    /// Maximum length of a team name in characters
    pub const MAX_NAME_LENGTH: usize = 50;
    /// Display name of the moderator's cancel pseudo-team
    pub const CANCEL_NAME: &str = "Cancel";
}

/// Answer countdown configuration constants
pub mod timer {
    /// Default time in milliseconds a question stays open for answering
    pub const DEFAULT_ANSWER_TIME: u64 = 5000;
    /// Minimum configurable answer time in milliseconds
    pub const MIN_ANSWER_TIME: u64 = 1000;
    /// Maximum configurable answer time in milliseconds
    pub const MAX_ANSWER_TIME: u64 = 240_000;
}
