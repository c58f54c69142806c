use crate::*;

use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("decide: authentication required")]
    Unauthorized,

    #[error("decide: administrator privileges required")]
    Forbidden,

    #[error("Action not found, try with start, stop or tally")]
    InvalidAction(String),

    #[error("{0}")]
    InvalidStateTransition(#[from] TransitionError),

    #[error("decide: voter {voter} is not in the census of voting {voting}")]
    Ineligible { voting: VotingId, voter: VoterId },

    #[error("decide: voter {voter} already voted in voting {voting}")]
    DuplicateBallot { voting: VotingId, voter: VoterId },

    #[error("decide: voting {0} is not open")]
    VotingNotOpen(VotingId),

    #[error("decide: voting {0} not found")]
    VotingNotFound(VotingId),

    #[error("decide: invalid voting: {0}")]
    InvalidVoting(String),

    #[error("decide: malformed ballot: {0}")]
    MalformedBallot(String),

    #[error("decide: voting {0} has no public key")]
    MissingPublicKey(VotingId),

    #[error("decide: authority unavailable: {0}")]
    AuthorityUnavailable(String),

    #[error("decide: malformed tally result: {0}")]
    MalformedTallyResult(String),

    #[error("decide: store error: {0}")]
    Store(String),
}

impl Error {
    /// Short machine-readable name of the error, stable across releases
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::Forbidden => "forbidden",
            Error::InvalidAction(_) => "invalid_action",
            Error::InvalidStateTransition(_) => "invalid_state_transition",
            Error::Ineligible { .. } => "ineligible",
            Error::DuplicateBallot { .. } => "already_voted",
            Error::VotingNotOpen(_) => "voting_not_open",
            Error::VotingNotFound(_) => "voting_not_found",
            Error::InvalidVoting(_) => "invalid_voting",
            Error::MalformedBallot(_) => "malformed_ballot",
            Error::MissingPublicKey(_) => "missing_public_key",
            Error::AuthorityUnavailable(_) => "authority_unavailable",
            Error::MalformedTallyResult(_) => "malformed_tally_result",
            Error::Store(_) => "store",
        }
    }
}

/// Lifecycle rejections
///
/// The `Display` output of each variant is part of the public API: clients match on these strings.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Voting is not started")]
    NotStarted,

    #[error("Voting already started")]
    AlreadyStarted,

    #[error("Voting is not stopped")]
    NotStopped,

    #[error("Voting already stopped")]
    AlreadyStopped,

    #[error("Voting already tallied")]
    AlreadyTallied,
}
