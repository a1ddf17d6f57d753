use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::Candidate};

/// One candidate's line in the tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub vote_count: u64,
    /// Vote share in percent, rounded to two decimal places; zero when no
    /// votes have been cast at all.
    pub percentage: f64,
}

/// The full admin tally: per-candidate results plus overall counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub results: Vec<CandidateTally>,
    pub total_votes: u64,
    pub total_users: u64,
}

impl ElectionResults {
    /// Compute the tally from a snapshot of the candidates.
    ///
    /// Candidates are ordered by descending vote count; ties break by
    /// ascending ID, which is stable across identical snapshots.
    pub fn compute(
        mut candidates: Vec<Candidate>,
        total_votes: u64,
        total_users: u64,
    ) -> Self {
        candidates.sort_by(|a, b| {
            b.vote_count
                .cmp(&a.vote_count)
                .then_with(|| a.id.cmp(&b.id))
        });
        let results = candidates
            .into_iter()
            .map(|candidate| {
                let percentage = if total_votes == 0 {
                    0.0
                } else {
                    round2(candidate.vote_count as f64 / total_votes as f64 * 100.0)
                };
                CandidateTally {
                    id: candidate.id.into(),
                    name: candidate.candidate.name,
                    party: candidate.candidate.party,
                    vote_count: candidate.candidate.vote_count,
                    percentage,
                }
            })
            .collect();
        Self {
            results,
            total_votes,
            total_users,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_votes(votes: u64) -> Candidate {
        Candidate::example_with_votes(votes)
    }

    #[test]
    fn orders_by_descending_votes() {
        let results = ElectionResults::compute(
            vec![with_votes(1), with_votes(5), with_votes(3)],
            9,
            10,
        );
        let counts: Vec<u64> = results.results.iter().map(|r| r.vote_count).collect();
        assert_eq!(counts, vec![5, 3, 1]);
        assert_eq!(results.total_votes, 9);
        assert_eq!(results.total_users, 10);
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let a = with_votes(2);
        let b = with_votes(2);
        let (first, second) = if a.id < b.id {
            (a.id, b.id)
        } else {
            (b.id, a.id)
        };
        let results = ElectionResults::compute(vec![b, a], 4, 4);
        assert_eq!(results.results[0].id, first.into());
        assert_eq!(results.results[1].id, second.into());
    }

    #[test]
    fn percentages_round_to_two_decimals() {
        let results =
            ElectionResults::compute(vec![with_votes(1), with_votes(2)], 3, 3);
        assert_eq!(results.results[0].percentage, 66.67);
        assert_eq!(results.results[1].percentage, 33.33);
    }

    #[test]
    fn percentages_sum_to_roughly_100() {
        let results = ElectionResults::compute(
            vec![with_votes(7), with_votes(11), with_votes(13), with_votes(2)],
            33,
            40,
        );
        let sum: f64 = results.results.iter().map(|r| r.percentage).sum();
        assert!((sum - 100.0).abs() < 0.05, "sum was {sum}");
    }

    #[test]
    fn zero_total_votes_yields_zero_percentages() {
        let results = ElectionResults::compute(vec![with_votes(0), with_votes(0)], 0, 2);
        assert!(results.results.iter().all(|r| r.percentage == 0.0));
        assert_eq!(results.total_votes, 0);
    }

    #[test]
    fn single_candidate_with_all_votes_is_100() {
        let results = ElectionResults::compute(vec![with_votes(4)], 4, 5);
        assert_eq!(results.results[0].percentage, 100.0);
    }
}
