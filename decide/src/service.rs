use crate::*;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bound on a single exchange with the authority
pub const DEFAULT_AUTHORITY_TIMEOUT: Duration = Duration::from_secs(30);

/// The voting operations, over a store and an authority
///
/// Every administrative operation goes through [`Identity::require_admin`] before anything else.
#[derive(Clone)]
pub struct Decide {
    store: Arc<dyn Store>,
    authority: Arc<dyn Authority>,
    authority_timeout: Duration,
    // One key generation in flight per voting
    keygen_locks: Arc<parking_lot::Mutex<HashMap<VotingId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Decide {
    pub fn new(store: Arc<dyn Store>, authority: Arc<dyn Authority>) -> Self {
        Decide {
            store,
            authority,
            authority_timeout: DEFAULT_AUTHORITY_TIMEOUT,
            keygen_locks: Default::default(),
        }
    }

    pub fn with_authority_timeout(mut self, timeout: Duration) -> Self {
        self.authority_timeout = timeout;
        self
    }

    pub async fn create_voting(&self, caller: &Identity, voting: NewVoting) -> Result<Voting, Error> {
        caller.require_admin()?;

        let voting = self.store.create_voting(voting).await?;
        info!(voting = voting.id, name = %voting.name, "voting created");

        Ok(voting)
    }

    pub async fn get_voting(&self, id: VotingId) -> Result<Voting, Error> {
        self.store.require_voting(id).await
    }

    /// Administrators see every voting, anyone else only public ones
    pub async fn list_votings(&self, caller: Option<&Identity>) -> Result<Vec<Voting>, Error> {
        let all = self.store.list_votings().await?;
        let is_admin = caller.map(|c| c.is_admin).unwrap_or(false);

        Ok(all.into_iter().filter(|v| is_admin || v.public).collect())
    }

    /// Apply a lifecycle action. Returns the outcome message of the action.
    pub async fn apply_action(
        &self,
        caller: &Identity,
        id: VotingId,
        action: Action,
    ) -> Result<&'static str, Error> {
        caller.require_admin()?;

        match action {
            Action::Start => self.start(id).await?,
            Action::Stop => self.transition(id, Action::Stop).await?,
            Action::Tally => {
                self.tally(caller, id).await?;
            }
        }

        Ok(action.outcome())
    }

    /// Have the authority generate the voting's public key, unless it already has one
    pub async fn ensure_public_key(&self, caller: &Identity, id: VotingId) -> Result<PublicKey, Error> {
        caller.require_admin()?;

        let voting = self.store.require_voting(id).await?;
        self.public_key_for(&voting).await
    }

    async fn public_key_for(&self, voting: &Voting) -> Result<PublicKey, Error> {
        if let Some(key) = &voting.pub_key {
            return Ok(key.clone());
        }

        let lock = self
            .keygen_locks
            .lock()
            .entry(voting.id)
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        // Someone else may have generated it while we waited
        let voting = self.store.require_voting(voting.id).await?;
        if let Some(key) = voting.pub_key {
            return Ok(key);
        }

        let key = self
            .bounded("key generation", self.authority.generate_key(&voting))
            .await
            .map_err(|e| {
                warn!(voting = voting.id, error = %e, "public key generation failed");
                e
            })?;

        let key = self.store.set_public_key(voting.id, key).await?;
        // Later callers find the key in the store
        self.keygen_locks.lock().remove(&voting.id);
        debug!(voting = voting.id, "public key set");
        Ok(key)
    }

    async fn start(&self, id: VotingId) -> Result<(), Error> {
        let voting = self.store.require_voting(id).await?;
        voting.status.transition(Action::Start)?;

        // A voting never opens without a key to encrypt for
        self.public_key_for(&voting).await?;
        self.transition(id, Action::Start).await
    }

    /// Compare-and-set the status for `action`.
    ///
    /// Losing a race re-reads the status and re-checks the table, so a concurrent caller gets
    /// the rejection for the state that won. Statuses only move forward, so this terminates.
    async fn transition(&self, id: VotingId, action: Action) -> Result<(), Error> {
        loop {
            let from = self.store.require_voting(id).await?.status;
            let to = from.transition(action)?;

            if self
                .store
                .compare_and_set_status(id, from, to, Utc::now())
                .await?
            {
                info!(voting = id, from = %from, to = %to, "voting status changed");
                return Ok(());
            }
        }
    }

    /// Accept a ballot cast by `caller`
    pub async fn submit_ballot(
        &self,
        caller: &Identity,
        submission: BallotSubmission,
    ) -> Result<(), Error> {
        if caller.id != submission.voter_id {
            return Err(Error::Forbidden);
        }

        let voting = self.store.require_voting(submission.voting_id).await?;
        if !voting.status.accepts_ballots() {
            return Err(Error::VotingNotOpen(voting.id));
        }
        let key = voting
            .pub_key
            .as_ref()
            .ok_or(Error::MissingPublicKey(voting.id))?;
        submission.vote.validate(key)?;

        let (voting_id, voter_id) = (submission.voting_id, submission.voter_id);
        self.store.insert_ballot(submission.into()).await?;
        debug!(voting = voting_id, voter = voter_id, "ballot accepted");

        Ok(())
    }

    /// Decrypt and count the ballots of a stopped voting, then mark it tallied.
    ///
    /// Nothing is written unless the whole batch decrypts and every selection matches an
    /// option, so a failed tally leaves the voting stopped and can be retried.
    pub async fn tally(&self, caller: &Identity, id: VotingId) -> Result<TallyResult, Error> {
        caller.require_admin()?;

        let voting = self.store.require_voting(id).await?;
        voting.status.transition(Action::Tally)?;
        let key = voting.pub_key.clone().ok_or(Error::MissingPublicKey(id))?;

        let ballots = self.store.ballots(id).await?;
        let num_ballots = ballots.len();

        let selections = if ballots.is_empty() {
            vec![]
        } else {
            let batch = ballots.into_iter().map(|b| b.vote).collect();
            self.bounded("decryption", self.authority.decrypt(&voting, &key, batch))
                .await
                .map_err(|e| {
                    warn!(voting = id, error = %e, "tally aborted");
                    e
                })?
        };

        if selections.len() != num_ballots {
            return Err(Error::MalformedTallyResult(format!(
                "{} selections for {} ballots",
                selections.len(),
                num_ballots
            )));
        }
        let result = TallyResult::tally(&voting.question, &selections)?;

        if !self.store.commit_tally(id, &result).await? {
            // Stopped only ever moves to Tallied
            return Err(TransitionError::AlreadyTallied.into());
        }
        info!(voting = id, ballots = num_ballots, "voting tallied");

        Ok(result)
    }

    pub async fn ballots(&self, caller: &Identity, id: VotingId) -> Result<Vec<Ballot>, Error> {
        caller.require_admin()?;

        self.store.require_voting(id).await?;
        self.store.ballots(id).await
    }

    pub async fn add_census(
        &self,
        caller: &Identity,
        voting: VotingId,
        voters: &[VoterId],
    ) -> Result<usize, Error> {
        caller.require_admin()?;

        let added = self.store.add_census(voting, voters).await?;
        info!(voting, added, "census updated");
        Ok(added)
    }

    pub async fn remove_census(
        &self,
        caller: &Identity,
        voting: VotingId,
        voters: &[VoterId],
    ) -> Result<usize, Error> {
        caller.require_admin()?;

        let removed = self.store.remove_census(voting, voters).await?;
        info!(voting, removed, "census updated");
        Ok(removed)
    }

    /// Is the voter in the census of the voting
    pub async fn check_census(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error> {
        self.store.census_contains(voting, voter).await
    }

    /// Evaluate the census gate without side effects
    pub async fn eligibility(&self, voting: VotingId, voter: VoterId) -> Result<Eligibility, Error> {
        check_eligibility(&*self.store, voting, voter).await
    }

    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match tokio::time::timeout(self.authority_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(Error::AuthorityUnavailable(format!(
                "{} timed out after {:?}",
                what, self.authority_timeout
            ))),
        }
    }
}
