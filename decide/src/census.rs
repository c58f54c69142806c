use crate::*;

/// Presence of an entry makes a voter eligible for a voting
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CensusEntry {
    pub voting_id: VotingId,
    pub voter_id: VoterId,
}

/// Outcome of the census gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotInCensus,
    AlreadyVoted,
}

impl Eligibility {
    /// A voter is eligible iff they are in the census and have no accepted ballot yet.
    ///
    /// Stores evaluate this inside their atomic ballot insert.
    pub fn evaluate(in_census: bool, has_voted: bool) -> Self {
        if !in_census {
            Eligibility::NotInCensus
        } else if has_voted {
            Eligibility::AlreadyVoted
        } else {
            Eligibility::Eligible
        }
    }

    pub fn into_result(self, voting: VotingId, voter: VoterId) -> Result<(), Error> {
        match self {
            Eligibility::Eligible => Ok(()),
            Eligibility::NotInCensus => Err(Error::Ineligible { voting, voter }),
            Eligibility::AlreadyVoted => Err(Error::DuplicateBallot { voting, voter }),
        }
    }
}

/// Evaluate the census gate against a store. Has no side effects.
pub async fn check_eligibility(
    store: &dyn Store,
    voting: VotingId,
    voter: VoterId,
) -> Result<Eligibility, Error> {
    let in_census = store.census_contains(voting, voter).await?;
    let has_voted = store.has_voted(voting, voter).await?;

    Ok(Eligibility::evaluate(in_census, has_voted))
}
