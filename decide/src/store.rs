use crate::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Data access for votings, census and ballots
///
/// Every method that changes state is a single atomic step. In particular `insert_ballot`
/// evaluates the open-voting check and the census gate in the same step that stores the
/// ballot, and status changes are compare-and-set.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store a new voting and assign its identifier
    async fn create_voting(&self, voting: NewVoting) -> Result<Voting, Error>;

    /// Get a voting
    async fn get_voting(&self, id: VotingId) -> Result<Option<Voting>, Error>;

    /// All votings, by ascending identifier
    async fn list_votings(&self) -> Result<Vec<Voting>, Error>;

    /// Set the public key unless one is already set. Returns the key in effect.
    async fn set_public_key(&self, id: VotingId, key: PublicKey) -> Result<PublicKey, Error>;

    /// Move a voting from `from` to `to`, recording `at` as start or end date.
    ///
    /// Returns `false` without changing anything if the voting is not in `from`.
    async fn compare_and_set_status(
        &self,
        id: VotingId,
        from: VotingStatus,
        to: VotingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Move a voting from `Stopped` to `Tallied`, writing the result in the same step.
    ///
    /// Returns `false` without changing anything if the voting is not stopped.
    async fn commit_tally(&self, id: VotingId, result: &TallyResult) -> Result<bool, Error>;

    /// Add voters to the census of a voting. Returns how many were not already present.
    async fn add_census(&self, voting: VotingId, voters: &[VoterId]) -> Result<usize, Error>;

    /// Remove voters from the census of a voting. Returns how many were present.
    async fn remove_census(&self, voting: VotingId, voters: &[VoterId]) -> Result<usize, Error>;

    async fn census_contains(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error>;

    async fn has_voted(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error>;

    /// Atomically accept a ballot.
    ///
    /// Fails with `VotingNotOpen` unless the voting is started, and with `Ineligible` or
    /// `DuplicateBallot` when the census gate denies the voter.
    async fn insert_ballot(&self, ballot: Ballot) -> Result<(), Error>;

    /// All ballots of a voting
    async fn ballots(&self, voting: VotingId) -> Result<Vec<Ballot>, Error>;

    /// Get a voting that must exist
    async fn require_voting(&self, id: VotingId) -> Result<Voting, Error> {
        self.get_voting(id).await?.ok_or(Error::VotingNotFound(id))
    }
}

/// A simple store that keeps everything in memory
///
/// Clones share the same data.
#[derive(Default, Clone)]
pub struct MemStore {
    inner: Arc<Mutex<MemInner>>,
}

#[derive(Default)]
struct MemInner {
    last_id: VotingId,
    votings: BTreeMap<VotingId, Voting>,
    census: BTreeSet<CensusEntry>,
    ballots: BTreeMap<(VotingId, VoterId), Ballot>,
}

impl MemInner {
    fn voting_mut(&mut self, id: VotingId) -> Result<&mut Voting, Error> {
        self.votings.get_mut(&id).ok_or(Error::VotingNotFound(id))
    }
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_voting(&self, voting: NewVoting) -> Result<Voting, Error> {
        voting.validate()?;

        let mut inner = self.inner.lock();
        inner.last_id += 1;
        let voting = voting.into_voting(inner.last_id);
        inner.votings.insert(voting.id, voting.clone());

        Ok(voting)
    }

    async fn get_voting(&self, id: VotingId) -> Result<Option<Voting>, Error> {
        Ok(self.inner.lock().votings.get(&id).cloned())
    }

    async fn list_votings(&self) -> Result<Vec<Voting>, Error> {
        Ok(self.inner.lock().votings.values().cloned().collect())
    }

    async fn set_public_key(&self, id: VotingId, key: PublicKey) -> Result<PublicKey, Error> {
        let mut inner = self.inner.lock();
        let voting = inner.voting_mut(id)?;
        Ok(voting.pub_key.get_or_insert(key).clone())
    }

    async fn compare_and_set_status(
        &self,
        id: VotingId,
        from: VotingStatus,
        to: VotingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let mut inner = self.inner.lock();
        let voting = inner.voting_mut(id)?;
        if voting.status != from {
            return Ok(false);
        }

        voting.status = to;
        match to {
            VotingStatus::Started => voting.start_date = Some(at),
            VotingStatus::Stopped => voting.end_date = Some(at),
            _ => {}
        }
        Ok(true)
    }

    async fn commit_tally(&self, id: VotingId, result: &TallyResult) -> Result<bool, Error> {
        let mut inner = self.inner.lock();
        let voting = inner.voting_mut(id)?;
        if voting.status != VotingStatus::Stopped {
            return Ok(false);
        }

        voting.status = VotingStatus::Tallied;
        voting.tally = Some(result.tally.clone());
        voting.postproc = Some(result.postproc.clone());
        Ok(true)
    }

    async fn add_census(&self, voting: VotingId, voters: &[VoterId]) -> Result<usize, Error> {
        let mut inner = self.inner.lock();
        inner.voting_mut(voting)?;

        let mut added = 0;
        for voter in voters {
            let entry = CensusEntry {
                voting_id: voting,
                voter_id: *voter,
            };
            if inner.census.insert(entry) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn remove_census(&self, voting: VotingId, voters: &[VoterId]) -> Result<usize, Error> {
        let mut inner = self.inner.lock();
        inner.voting_mut(voting)?;

        let mut removed = 0;
        for voter in voters {
            let entry = CensusEntry {
                voting_id: voting,
                voter_id: *voter,
            };
            if inner.census.remove(&entry) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn census_contains(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error> {
        let entry = CensusEntry {
            voting_id: voting,
            voter_id: voter,
        };
        Ok(self.inner.lock().census.contains(&entry))
    }

    async fn has_voted(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error> {
        Ok(self.inner.lock().ballots.contains_key(&(voting, voter)))
    }

    async fn insert_ballot(&self, ballot: Ballot) -> Result<(), Error> {
        let (voting, voter) = (ballot.voting_id, ballot.voter_id);

        // One lock covers the open check, the census gate and the insert
        let mut inner = self.inner.lock();
        let status = inner
            .votings
            .get(&voting)
            .map(|v| v.status)
            .ok_or(Error::VotingNotFound(voting))?;
        if !status.accepts_ballots() {
            return Err(Error::VotingNotOpen(voting));
        }

        let in_census = inner.census.contains(&CensusEntry {
            voting_id: voting,
            voter_id: voter,
        });
        let has_voted = inner.ballots.contains_key(&(voting, voter));
        Eligibility::evaluate(in_census, has_voted).into_result(voting, voter)?;

        inner.ballots.insert((voting, voter), ballot);
        Ok(())
    }

    async fn ballots(&self, voting: VotingId) -> Result<Vec<Ballot>, Error> {
        let inner = self.inner.lock();
        Ok(inner
            .ballots
            .range((voting, VoterId::MIN)..=(voting, VoterId::MAX))
            .map(|(_, ballot)| ballot.clone())
            .collect())
    }
}
