use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::Candidate};

/// A candidate as specified by an admin when creating or updating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A candidate as shown to voters: no vote count, to avoid leaking a
/// running tally mid-election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            description: candidate.candidate.description,
            image_url: candidate.candidate.image_url,
        }
    }
}

/// A candidate as shown to admins, including the running count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDetails {
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub vote_count: u64,
}

impl From<Candidate> for CandidateDetails {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            description: candidate.candidate.description,
            image_url: candidate.candidate.image_url,
            vote_count: candidate.candidate.vote_count,
        }
    }
}

/// The ballot as a voter sees it, plus whether they have already cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotResponse {
    pub candidates: Vec<CandidateDescription>,
    pub has_voted: bool,
}

/// Body of a `vote` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub candidate_id: String,
}
