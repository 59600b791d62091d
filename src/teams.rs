//! Team registration, scoring, and ranking
//!
//! This module manages the ordered list of competing teams for a game
//! session, their integer scores, the per-question attempted-set, and
//! the final standings. A non-scoring "Cancel" pseudo-team is appended
//! after the real teams so the moderator can abandon a question that
//! nobody can answer; it never appears in team counts or rankings.

use std::{cmp::Reverse, collections::HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants;

/// A stable index identifying a team within its registry
///
/// Teams are owned by the registry and referenced by index, so the game
/// state never holds references into the team list.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct TeamId(usize);

/// A single competing team (or the cancel sentinel)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    name: String,
    score: i64,
    cancel: bool,
    selectable: bool,
}

impl Team {
    /// Returns the team's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the team's current score (may be negative)
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Returns whether this entry is the cancel pseudo-team
    pub fn is_cancel(&self) -> bool {
        self.cancel
    }

    /// Returns whether the presentation layer should offer this team
    pub fn selectable(&self) -> bool {
        self.selectable
    }
}

/// Place label for a team in the finish ranking
///
/// The top three places carry medal labels taken from the podium; every
/// later place is a plain numeric rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum Place {
    /// First place
    #[display("Gold")]
    Gold,
    /// Second place
    #[display("Silver")]
    Silver,
    /// Third place
    #[display("Bronze")]
    Bronze,
    /// Any place past the podium, 1-indexed
    #[display("{_0}.")]
    Numeric(usize),
}

impl Place {
    fn from_position(position: usize) -> Self {
        match position {
            0 => Self::Gold,
            1 => Self::Silver,
            2 => Self::Bronze,
            later => Self::Numeric(later + 1),
        }
    }
}

/// One row of the finish ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// The team being ranked
    pub team: TeamId,
    /// The team's display name
    pub name: String,
    /// The team's final score
    pub score: i64,
    /// The place label for this entry
    pub place: Place,
}

/// The ordered list of teams plus the attempted-set for the open question
///
/// Scores and the attempted-set are mutated exclusively by the game
/// state machine; the attempted-set is always a subset of the non-cancel
/// teams and is cleared exactly when a question resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRegistry {
    teams: Vec<Team>,
    attempted: HashSet<TeamId>,
}

impl TeamRegistry {
    /// Creates a registry with the given competing teams
    ///
    /// The cancel pseudo-team is appended after the real teams, matching
    /// the original board layout where it renders as an extra tile.
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(names: I) -> Self {
        let mut teams = names
            .into_iter()
            .map(|name| Team {
                name: name.into(),
                score: 0,
                cancel: false,
                selectable: false,
            })
            .collect_vec();
        teams.push(Team {
            name: constants::teams::CANCEL_NAME.to_string(),
            score: 0,
            cancel: true,
            selectable: false,
        });

        Self {
            teams,
            attempted: HashSet::new(),
        }
    }

    /// Returns the number of competing teams, excluding the cancel entry
    pub fn team_count(&self) -> usize {
        self.teams.len() - 1
    }

    /// Returns the id of the cancel pseudo-team
    pub fn cancel_id(&self) -> TeamId {
        TeamId(self.teams.len() - 1)
    }

    /// Looks up a team by id
    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(id.0)
    }

    /// Returns the competing teams with their ids, in registration order
    pub fn competing(&self) -> impl Iterator<Item = (TeamId, &Team)> {
        self.teams
            .iter()
            .enumerate()
            .filter(|(_, team)| !team.cancel)
            .map(|(i, team)| (TeamId(i), team))
    }

    /// Adds points to a team's score; the delta may be negative
    ///
    /// The cancel pseudo-team is outside normal scoring, so crediting it
    /// is a programming error.
    pub fn add_points(&mut self, id: TeamId, delta: i64) {
        debug_assert!(self.team(id).is_some_and(|t| !t.is_cancel()));
        if let Some(team) = self.teams.get_mut(id.0) {
            if !team.cancel {
                team.score += delta;
            }
        }
    }

    /// Records that a team has tried and failed the open question
    pub fn mark_attempted(&mut self, id: TeamId) {
        debug_assert!(self.team(id).is_some_and(|t| !t.is_cancel()));
        if self.team(id).is_some_and(|t| !t.is_cancel()) {
            self.attempted.insert(id);
        }
    }

    /// Returns whether a team is in the attempted-set
    pub fn has_attempted(&self, id: TeamId) -> bool {
        self.attempted.contains(&id)
    }

    /// Returns the size of the attempted-set
    pub fn attempted_len(&self) -> usize {
        self.attempted.len()
    }

    /// Empties the attempted-set; run exactly when a question resolves
    pub fn clear_attempted(&mut self) {
        self.attempted.clear();
    }

    /// Marks the teams not yet in the attempted-set selectable
    ///
    /// The cancel entry is always offered alongside them so the
    /// moderator can abandon the question.
    pub fn set_untried_selectable(&mut self, on: bool) {
        for (i, team) in self.teams.iter_mut().enumerate() {
            team.selectable = on && (team.cancel || !self.attempted.contains(&TeamId(i)));
        }
    }

    /// Computes the standings: stable descending sort by score
    ///
    /// Ties break by registration order, so two teams on equal points
    /// keep the order in which they were entered. The cancel entry is
    /// excluded. The top three entries get medal places, the rest
    /// numeric ranks.
    pub fn ranking(&self) -> Vec<RankingEntry> {
        self.competing()
            .sorted_by_key(|(_, team)| Reverse(team.score))
            .enumerate()
            .map(|(position, (id, team))| RankingEntry {
                team: id,
                name: team.name.clone(),
                score: team.score,
                place: Place::from_position(position),
            })
            .collect_vec()
    }
}
