use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{api::candidate::CandidateSpec, mongodb::Id};

/// Core candidate data, as stored in the database.
///
/// `vote_count` is maintained inside the same transaction as every vote
/// insert, so it always equals the live count of referencing votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub party: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub vote_count: u64,
}

impl From<CandidateSpec> for CandidateCore {
    /// A freshly specified candidate starts with zero votes.
    fn from(spec: CandidateSpec) -> Self {
        Self {
            name: spec.name,
            party: spec.party,
            description: spec.description,
            image_url: spec.image_url,
            vote_count: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example() -> Self {
            Self {
                name: "Ada Lovelace".to_string(),
                party: "Analytical Party".to_string(),
                description: Some("First among programmers".to_string()),
                image_url: None,
                vote_count: 0,
            }
        }
    }

    impl Candidate {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                candidate: CandidateCore::example(),
            }
        }

        pub fn example_with_votes(votes: u64) -> Self {
            let mut candidate = Self::example();
            candidate.vote_count = votes;
            candidate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_conversion_starts_with_zero_votes() {
        let spec = CandidateSpec {
            name: "Grace Hopper".to_string(),
            party: "Compiler Party".to_string(),
            description: None,
            image_url: Some("https://example.com/grace.png".to_string()),
        };
        let core = CandidateCore::from(spec);
        assert_eq!(core.vote_count, 0);
        assert_eq!(core.name, "Grace Hopper");
        assert_eq!(core.description, None);
    }
}
