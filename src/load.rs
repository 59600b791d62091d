//! Question-file parsing
//!
//! This module turns the line-oriented question format into the
//! structured topic/question/answer tuples the game core consumes. The
//! format is repeating blocks of one non-empty topic line followed by
//! exactly five `question|answer` lines; the answer may be empty, and a
//! line may contain at most one `|`. Lines whose first non-whitespace
//! character is `#` are comments. Any malformed block aborts the whole
//! load; no partial session is retained.

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// Errors aborting a question-file load
///
/// Every variant names the offending line so the moderator can fix the
/// file; the parser keeps nothing on failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LoadError {
    /// A question line contained more than one `|`
    #[error("there can only be one | per question line (line {line})")]
    TooManySeparators {
        /// 1-indexed line number of the offending line
        line: usize,
    },
    /// An empty line appeared where a question was expected
    #[error("unexpected empty line while looking for question {row} of {topic:?} (line {line})")]
    UnexpectedEmptyLine {
        /// 1-indexed line number of the offending line
        line: usize,
        /// The topic whose block was interrupted
        topic: String,
        /// Zero-based row that was being looked for
        row: usize,
    },
    /// The file ended before a topic block was complete
    #[error("file ended with only {got} of {expected} questions for {topic:?}")]
    TruncatedTopic {
        /// The topic whose block was cut short
        topic: String,
        /// Questions required per topic
        expected: usize,
        /// Questions actually found
        got: usize,
    },
}

/// One `question|answer` tuple from the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The question text shown when the frame is revealed
    #[garde(length(min = 1, max = constants::board::MAX_TEXT_LENGTH))]
    pub question: String,
    /// The expected answer; may be empty
    #[garde(length(max = constants::board::MAX_TEXT_LENGTH))]
    pub answer: String,
}

/// A topic label with its fixed block of questions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TopicConfig {
    /// The column header label
    #[garde(length(min = 1, max = constants::board::MAX_TOPIC_LENGTH))]
    pub name: String,
    /// The questions under this topic, cheapest first
    #[garde(
        length(
            min = constants::board::ROWS_PER_TOPIC,
            max = constants::board::ROWS_PER_TOPIC
        ),
        dive
    )]
    pub questions: Vec<QuestionConfig>,
}

/// A complete parsed question set, ready for session construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct QuestionSet {
    /// The topic columns in file order
    #[garde(length(min = 1, max = constants::board::MAX_TOPIC_COUNT), dive)]
    pub topics: Vec<TopicConfig>,
}

/// Parser line-state: what the next meaningful line must be
enum Expecting {
    Topic,
    Question,
}

/// Collapses runs of whitespace into single spaces and trims the ends
fn simplified(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a question file into a [`QuestionSet`]
///
/// # Errors
///
/// Returns a [`LoadError`] naming the first malformed line; the whole
/// load is abandoned, matching the no-partial-session rule.
pub fn parse(source: &str) -> Result<QuestionSet, LoadError> {
    let rows = constants::board::ROWS_PER_TOPIC;

    let mut topics: Vec<TopicConfig> = Vec::new();
    let mut state = Expecting::Topic;

    for (index, raw) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = simplified(raw);
        if line.starts_with('#') {
            continue;
        }

        match state {
            Expecting::Topic => {
                if line.is_empty() {
                    continue;
                }
                topics.push(TopicConfig {
                    name: line,
                    questions: Vec::with_capacity(rows),
                });
                state = Expecting::Question;
            }
            Expecting::Question => {
                let topic = topics.last_mut().expect("a topic opened this block");
                if line.is_empty() {
                    return Err(LoadError::UnexpectedEmptyLine {
                        line: line_number,
                        topic: topic.name.clone(),
                        row: topic.questions.len(),
                    });
                }

                let mut split = line.splitn(3, '|');
                let question = split.next().unwrap_or_default().trim().to_string();
                let answer = split.next().unwrap_or_default().trim().to_string();
                if split.next().is_some() {
                    return Err(LoadError::TooManySeparators { line: line_number });
                }

                topic.questions.push(QuestionConfig { question, answer });
                if topic.questions.len() == rows {
                    state = Expecting::Topic;
                }
            }
        }
    }

    if let Expecting::Question = state {
        let topic = topics.last().expect("a topic opened this block");
        return Err(LoadError::TruncatedTopic {
            topic: topic.name.clone(),
            expected: rows,
            got: topic.questions.len(),
        });
    }

    Ok(QuestionSet { topics })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const VALID: &str = "\
# movie night questions
Movies
Who directed Jaws?|Spielberg
Name the 1972 mafia film|The Godfather
  # mid-block comment
Highest grossing film of 1997|Titanic
First feature-length animated film|Snow White
Film where a DeLorean travels in time|Back to the Future
";

    #[test]
    fn test_parse_valid_file() {
        let set = parse(VALID).unwrap();
        assert_eq!(set.topics.len(), 1);
        let topic = &set.topics[0];
        assert_eq!(topic.name, "Movies");
        assert_eq!(topic.questions.len(), 5);
        assert_eq!(topic.questions[0].question, "Who directed Jaws?");
        assert_eq!(topic.questions[0].answer, "Spielberg");
        assert!(set.validate().is_ok());
    }

    #[test]
    fn test_parse_skips_blank_lines_between_topics() {
        let doubled = format!("{VALID}\n\nScience\nq1|a1\nq2|a2\nq3|a3\nq4|a4\nq5|a5\n");
        let set = parse(&doubled).unwrap();
        assert_eq!(set.topics.len(), 2);
        assert_eq!(set.topics[1].name, "Science");
    }

    #[test]
    fn test_parse_allows_empty_answer() {
        let source = "Topic\nq1|\nq2\nq3|a3\nq4|a4\nq5|a5\n";
        let set = parse(source).unwrap();
        assert_eq!(set.topics[0].questions[0].answer, "");
        assert_eq!(set.topics[0].questions[1].question, "q2");
        assert_eq!(set.topics[0].questions[1].answer, "");
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let source = "  A   Topic  \nq1  here |  a1\nq2|a2\nq3|a3\nq4|a4\nq5|a5\n";
        let set = parse(source).unwrap();
        assert_eq!(set.topics[0].name, "A Topic");
        assert_eq!(set.topics[0].questions[0].question, "q1 here");
    }

    #[test]
    fn test_parse_rejects_extra_separator() {
        let source = "Topic\nq1|a1|extra\n";
        assert_eq!(
            parse(source),
            Err(LoadError::TooManySeparators { line: 2 })
        );
    }

    #[test]
    fn test_parse_rejects_empty_line_mid_block() {
        let source = "Topic\nq1|a1\n\nq3|a3\nq4|a4\nq5|a5\n";
        assert_eq!(
            parse(source),
            Err(LoadError::UnexpectedEmptyLine {
                line: 3,
                topic: "Topic".to_string(),
                row: 1,
            })
        );
    }

    #[test]
    fn test_parse_rejects_truncated_topic() {
        let source = "Topic\nq1|a1\nq2|a2\n";
        assert_eq!(
            parse(source),
            Err(LoadError::TruncatedTopic {
                topic: "Topic".to_string(),
                expected: 5,
                got: 2,
            })
        );
    }

    #[test]
    fn test_empty_set_fails_validation() {
        let set = parse("# nothing but comments\n").unwrap();
        assert!(set.topics.is_empty());
        assert!(set.validate().is_err());
    }
}
