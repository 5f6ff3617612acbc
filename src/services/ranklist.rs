use std::collections::HashMap;

use tracing::warn;

use crate::models::{Identifier, RanklistEntry, RanklistRow};

/// An entry whose score vector does not line up with the contest's problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLengthMismatch {
    pub key: usize,
    pub user_name: String,
    pub expected: usize,
    pub actual: usize,
}

/// Leaderboard ready for a table: one column per problem, rows in server order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RanklistTable {
    pub columns: Vec<Identifier>,
    pub rows: Vec<RanklistRow>,
    pub mismatches: Vec<ScoreLengthMismatch>,
}

impl RanklistTable {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Zips every entry's scores against `problem_ids`.
///
/// Rows keep the order and rank the server sent; keys count from 1. Only the
/// positions present in both sequences are mapped, and each entry where the
/// lengths differ is reported in `mismatches`.
pub fn assemble(problem_ids: &[Identifier], entries: &[RanklistEntry]) -> RanklistTable {
    let mut rows = Vec::with_capacity(entries.len());
    let mut mismatches = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let key = index + 1;

        if entry.scores.len() != problem_ids.len() {
            warn!(
                "Ranklist row {} ({}) has {} scores for {} problems",
                key,
                entry.user.name,
                entry.scores.len(),
                problem_ids.len()
            );
            mismatches.push(ScoreLengthMismatch {
                key,
                user_name: entry.user.name.clone(),
                expected: problem_ids.len(),
                actual: entry.scores.len(),
            });
        }

        let scores_by_problem_id: HashMap<Identifier, f64> = problem_ids
            .iter()
            .zip(entry.scores.iter())
            .map(|(problem_id, score)| (problem_id.clone(), *score))
            .collect();

        rows.push(RanklistRow {
            key,
            name: entry.user.name.clone(),
            rank: entry.rank,
            scores_by_problem_id,
        });
    }

    RanklistTable {
        columns: problem_ids.to_vec(),
        rows,
        mismatches,
    }
}
