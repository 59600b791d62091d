//! Question board and frame grid management
//!
//! This module owns the fixed grid of question frames presented to the
//! teams: one column per topic, a constant number of monetary-value rows
//! per column. Frames are owned by value and addressed by stable
//! `FrameId` coordinates so the game state never holds references into
//! the board.

use serde::{Deserialize, Serialize};

use crate::constants;

/// The lifecycle status of a single question frame
///
/// A frame starts `Hidden` and is resolved exactly once, either because
/// a team answered it correctly (`Succeeded`) or because it was answered
/// wrongly, timed out, or abandoned (`Failed`). A resolved frame never
/// returns to `Hidden`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    /// Not yet attempted; still selectable from the board
    #[default]
    Hidden,
    /// Resolved without a correct answer
    Failed,
    /// Resolved with a correct answer
    Succeeded,
}

/// Stable grid coordinates identifying a frame
///
/// Row 0 is the cheapest question of a topic; the column index matches
/// the topic's position in the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId {
    /// Zero-based row inside the topic column
    pub row: usize,
    /// Zero-based topic column
    pub col: usize,
}

/// A column header grouping five question frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    name: String,
}

impl Topic {
    /// Returns the topic's display label
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One question cell in the grid
///
/// Carries the question/answer text, the monetary value derived from the
/// row, the resolution status, and the selectable flag the presentation
/// layer reads to decide whether the cell reacts to the pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    id: FrameId,
    value: i64,
    question: String,
    answer: String,
    status: FrameStatus,
    selectable: bool,
}

impl Frame {
    /// Returns the frame's grid coordinates
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Returns the monetary value of the frame
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Returns the question text
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Returns the answer text (may be empty)
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Returns the current resolution status
    pub fn status(&self) -> FrameStatus {
        self.status
    }

    /// Returns whether the presentation layer should offer this frame
    pub fn selectable(&self) -> bool {
        self.selectable
    }
}

/// The fixed grid of topics and question frames
///
/// Rows per column is fixed at load time; frames are stored column-major
/// in registration order and addressed by `FrameId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    topics: Vec<Topic>,
    frames: Vec<Frame>,
    rows: usize,
}

impl Board {
    /// Builds a board from topic names and their `(question, answer)` rows
    ///
    /// Every topic must come with exactly `rows` questions; the caller
    /// (session construction) guarantees this via load validation. The
    /// monetary value of row `r` is `(r + 1) * VALUE_STEP`.
    pub fn new(topics: Vec<(String, Vec<(String, String)>)>, rows: usize) -> Self {
        let mut board = Self {
            topics: Vec::with_capacity(topics.len()),
            frames: Vec::with_capacity(topics.len() * rows),
            rows,
        };

        for (col, (name, questions)) in topics.into_iter().enumerate() {
            debug_assert_eq!(questions.len(), rows);
            board.topics.push(Topic { name });
            for (row, (question, answer)) in questions.into_iter().enumerate() {
                board.frames.push(Frame {
                    id: FrameId { row, col },
                    value: (row as i64 + 1) * constants::board::VALUE_STEP,
                    question,
                    answer,
                    status: FrameStatus::Hidden,
                    selectable: false,
                });
            }
        }

        board
    }

    /// Returns the number of question rows per topic
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the topic columns in board order
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Returns all frames in column-major board order
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Returns the total number of frames on the board
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Looks up a frame by its grid coordinates
    pub fn frame_at(&self, id: FrameId) -> Option<&Frame> {
        if id.row >= self.rows || id.col >= self.topics.len() {
            return None;
        }
        self.frames.get(id.col * self.rows + id.row)
    }

    fn frame_at_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        if id.row >= self.rows || id.col >= self.topics.len() {
            return None;
        }
        self.frames.get_mut(id.col * self.rows + id.row)
    }

    /// Returns the status of a frame, `Hidden` for unknown coordinates
    pub fn status_of(&self, id: FrameId) -> FrameStatus {
        self.frame_at(id).map_or(FrameStatus::Hidden, Frame::status)
    }

    /// Resolves a frame, moving it away from `Hidden` exactly once
    ///
    /// Only `Hidden → {Failed, Succeeded}` is a real change; marking an
    /// already-resolved frame is ignored so a question that failed on
    /// the wrong-answer path stays `Failed` when the timeout path runs
    /// over the same frame. Resolving also withdraws the frame from
    /// selection.
    pub fn mark(&mut self, id: FrameId, status: FrameStatus) {
        debug_assert_ne!(status, FrameStatus::Hidden);
        if let Some(frame) = self.frame_at_mut(id) {
            if frame.status == FrameStatus::Hidden && status != FrameStatus::Hidden {
                frame.status = status;
            }
            frame.selectable = false;
        }
    }

    /// Counts the frames still awaiting resolution
    pub fn remaining_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.status == FrameStatus::Hidden)
            .count()
    }

    /// Marks every still-hidden frame selectable (or clears all flags)
    ///
    /// Run on `Normal` entry so the presentation layer re-offers the
    /// remaining questions; resolved frames never become selectable
    /// again.
    pub fn set_hidden_selectable(&mut self, on: bool) {
        for frame in &mut self.frames {
            frame.selectable = on && frame.status == FrameStatus::Hidden;
        }
    }

    /// Raises or lowers the selectable flag of a single frame
    pub fn set_selectable(&mut self, id: FrameId, on: bool) {
        if let Some(frame) = self.frame_at_mut(id) {
            frame.selectable = on && frame.status == FrameStatus::Hidden;
        }
    }
}
