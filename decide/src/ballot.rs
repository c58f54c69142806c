use crate::*;

/// An accepted encrypted ballot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub voting_id: VotingId,
    pub voter_id: VoterId,
    pub vote: Ciphertext,
}

/// A ballot as submitted by a voter client
///
/// `{"votingId": 1, "voterId": 7, "vote": {"a": .., "b": ..}}`. The short `voting` and `voter`
/// keys are accepted as well.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BallotSubmission {
    #[serde(alias = "voting")]
    pub voting_id: VotingId,
    #[serde(alias = "voter")]
    pub voter_id: VoterId,
    pub vote: Ciphertext,
}

impl From<BallotSubmission> for Ballot {
    fn from(sub: BallotSubmission) -> Self {
        Ballot {
            voting_id: sub.voting_id,
            voter_id: sub.voter_id,
            vote: sub.vote,
        }
    }
}
