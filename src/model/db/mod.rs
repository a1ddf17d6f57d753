pub mod candidate;
pub mod user;
pub mod vote;

pub use candidate::{Candidate, CandidateCore, NewCandidate};
pub use user::{ensure_admin_exists, hash_password, NewUser, User, UserCore};
pub use vote::{NewVote, Vote, VoteCore};
