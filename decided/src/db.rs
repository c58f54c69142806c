use async_trait::async_trait;
use chrono::{DateTime, Utc};
use decide::*;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use std::time::Duration;

/// Ballots are only accepted for a started voting and a voter in its census.
/// The unique `(voting_id, voter_id)` constraint rejects a second ballot.
const INSERT_BALLOT: &str = "
    INSERT INTO ballots (voting_id, voter_id, a, b)
    SELECT ?1, ?2, ?3, ?4
    WHERE EXISTS (SELECT 1 FROM votings WHERE id = ?1 AND status = ?5)
      AND EXISTS (SELECT 1 FROM census WHERE voting_id = ?1 AND voter_id = ?2)";

/// A [`Store`] backed by SQLite
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct VotingRow {
    id: i64,
    name: String,
    description: Option<String>,
    public: bool,
    question: String,
    auths: String,
    status: i64,
    pub_key: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    tally: Option<String>,
    postproc: Option<String>,
}

impl TryFrom<VotingRow> for Voting {
    type Error = Error;

    fn try_from(row: VotingRow) -> Result<Voting, Error> {
        let status = u8::try_from(row.status)
            .ok()
            .and_then(|code| VotingStatus::try_from(code).ok())
            .ok_or_else(|| {
                Error::Store(format!("voting {} has unknown status {}", row.id, row.status))
            })?;

        Ok(Voting {
            id: from_sql_id(row.id)?,
            name: row.name,
            desc: row.description,
            public: row.public,
            question: from_json(&row.question)?,
            auths: from_json(&row.auths)?,
            status,
            pub_key: row.pub_key.as_deref().map(from_json).transpose()?,
            start_date: row.start_date,
            end_date: row.end_date,
            tally: row.tally.as_deref().map(from_json).transpose()?,
            postproc: row.postproc.as_deref().map(from_json).transpose()?,
        })
    }
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

fn sql_id(id: u64) -> Result<i64, Error> {
    i64::try_from(id).map_err(|_| Error::Store(format!("identifier {} out of range", id)))
}

fn from_sql_id(id: i64) -> Result<u64, Error> {
    u64::try_from(id).map_err(|_| Error::Store(format!("negative identifier {}", id)))
}

fn status_code(status: VotingStatus) -> i64 {
    i64::from(u8::from(status))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(store_err)
}

fn from_json<T: DeserializeOwned>(value: &str) -> Result<T, Error> {
    serde_json::from_str(value).map_err(store_err)
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run pending migrations
    pub async fn connect(path: &str) -> Result<Self, Error> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .connect_with(opts)
            .await
            .map_err(store_err)?;

        Self::migrate(pool).await
    }

    /// A private in-memory database. Every connection would get its own, so the pool keeps one.
    #[cfg(test)]
    pub async fn memory() -> Result<Self, Error> {
        use std::str::FromStr;

        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(store_err)?
            .disable_statement_logging();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(store_err)?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(store_err)?;

        Ok(SqliteStore { pool })
    }

    async fn voting_exists(&self, id: i64) -> Result<bool, Error> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM votings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(found.is_some())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_voting(&self, voting: NewVoting) -> Result<Voting, Error> {
        voting.validate()?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO votings (name, description, public, question, auths, status)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&voting.name)
        .bind(&voting.desc)
        .bind(voting.public)
        .bind(to_json(&voting.question)?)
        .bind(to_json(&voting.auths)?)
        .bind(status_code(VotingStatus::NotStarted))
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(voting.into_voting(from_sql_id(id)?))
    }

    async fn get_voting(&self, id: VotingId) -> Result<Option<Voting>, Error> {
        let Ok(id) = i64::try_from(id) else {
            return Ok(None);
        };

        sqlx::query_as::<_, VotingRow>("SELECT * FROM votings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .map(Voting::try_from)
            .transpose()
    }

    async fn list_votings(&self) -> Result<Vec<Voting>, Error> {
        sqlx::query_as::<_, VotingRow>("SELECT * FROM votings ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(Voting::try_from)
            .collect()
    }

    async fn set_public_key(&self, id: VotingId, key: PublicKey) -> Result<PublicKey, Error> {
        sqlx::query("UPDATE votings SET pub_key = ? WHERE id = ? AND pub_key IS NULL")
            .bind(to_json(&key)?)
            .bind(sql_id(id)?)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        self.require_voting(id)
            .await?
            .pub_key
            .ok_or(Error::MissingPublicKey(id))
    }

    async fn compare_and_set_status(
        &self,
        id: VotingId,
        from: VotingStatus,
        to: VotingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let date = match to {
            VotingStatus::Started => ", start_date = ?",
            VotingStatus::Stopped => ", end_date = ?",
            _ => "",
        };
        let sql = format!(
            "UPDATE votings SET status = ?{} WHERE id = ? AND status = ?",
            date
        );

        let mut query = sqlx::query(&sql).bind(status_code(to));
        if !date.is_empty() {
            query = query.bind(at);
        }
        let done = query
            .bind(sql_id(id)?)
            .bind(status_code(from))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        if done.rows_affected() == 1 {
            return Ok(true);
        }
        self.require_voting(id).await?;
        Ok(false)
    }

    async fn commit_tally(&self, id: VotingId, result: &TallyResult) -> Result<bool, Error> {
        let done = sqlx::query(
            "UPDATE votings SET status = ?, tally = ?, postproc = ? WHERE id = ? AND status = ?",
        )
        .bind(status_code(VotingStatus::Tallied))
        .bind(to_json(&result.tally)?)
        .bind(to_json(&result.postproc)?)
        .bind(sql_id(id)?)
        .bind(status_code(VotingStatus::Stopped))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if done.rows_affected() == 1 {
            return Ok(true);
        }
        self.require_voting(id).await?;
        Ok(false)
    }

    async fn add_census(&self, voting: VotingId, voters: &[VoterId]) -> Result<usize, Error> {
        let voting_id = sql_id(voting)?;
        if !self.voting_exists(voting_id).await? {
            return Err(Error::VotingNotFound(voting));
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut added = 0;
        for voter in voters {
            let done =
                sqlx::query("INSERT OR IGNORE INTO census (voting_id, voter_id) VALUES (?, ?)")
                    .bind(voting_id)
                    .bind(sql_id(*voter)?)
                    .execute(&mut *tx)
                    .await
                    .map_err(store_err)?;
            added += done.rows_affected() as usize;
        }
        tx.commit().await.map_err(store_err)?;

        Ok(added)
    }

    async fn remove_census(&self, voting: VotingId, voters: &[VoterId]) -> Result<usize, Error> {
        let voting_id = sql_id(voting)?;
        if !self.voting_exists(voting_id).await? {
            return Err(Error::VotingNotFound(voting));
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut removed = 0;
        for voter in voters {
            let done = sqlx::query("DELETE FROM census WHERE voting_id = ? AND voter_id = ?")
                .bind(voting_id)
                .bind(sql_id(*voter)?)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            removed += done.rows_affected() as usize;
        }
        tx.commit().await.map_err(store_err)?;

        Ok(removed)
    }

    async fn census_contains(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM census WHERE voting_id = ? AND voter_id = ?")
                .bind(sql_id(voting)?)
                .bind(sql_id(voter)?)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;

        Ok(count > 0)
    }

    async fn has_voted(&self, voting: VotingId, voter: VoterId) -> Result<bool, Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ballots WHERE voting_id = ? AND voter_id = ?")
                .bind(sql_id(voting)?)
                .bind(sql_id(voter)?)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;

        Ok(count > 0)
    }

    async fn insert_ballot(&self, ballot: Ballot) -> Result<(), Error> {
        let (voting, voter) = (ballot.voting_id, ballot.voter_id);
        let (a, b) = ballot.vote.to_decimal();

        let inserted = sqlx::query(INSERT_BALLOT)
            .bind(sql_id(voting)?)
            .bind(sql_id(voter)?)
            .bind(a)
            .bind(b)
            .bind(status_code(VotingStatus::Started))
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(done) if done.rows_affected() == 1 => Ok(()),
            Ok(_) => {
                // Nothing was written. Work out which condition refused it.
                let status = self.require_voting(voting).await?.status;
                if !status.accepts_ballots() {
                    return Err(Error::VotingNotOpen(voting));
                }
                let in_census = self.census_contains(voting, voter).await?;
                let has_voted = self.has_voted(voting, voter).await?;
                Eligibility::evaluate(in_census, has_voted).into_result(voting, voter)?;

                // The census changed since the insert
                Err(Error::Ineligible { voting, voter })
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateBallot { voting, voter })
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn ballots(&self, voting: VotingId) -> Result<Vec<Ballot>, Error> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT voter_id, a, b FROM ballots WHERE voting_id = ? ORDER BY voter_id",
        )
        .bind(sql_id(voting)?)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter()
            .map(|(voter, a, b)| {
                Ok(Ballot {
                    voting_id: voting,
                    voter_id: from_sql_id(voter)?,
                    vote: Ciphertext::from_decimal(&a, &b)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn new_voting() -> NewVoting {
        let mut question = Question::new("test question");
        question.add_option("cat", false, false);
        question.add_option("dog", false, false);
        let auth = AuthorityRef {
            name: "test auth".into(),
            url: "http://localhost:8000".into(),
            me: true,
        };
        NewVoting::new("test voting", question, vec![auth])
    }

    fn ballot(voting: VotingId, voter: VoterId) -> Ballot {
        Ballot {
            voting_id: voting,
            voter_id: voter,
            vote: Ciphertext {
                a: BigUint::from(4u32),
                b: BigUint::from(9u32),
            },
        }
    }

    async fn started_voting(store: &SqliteStore, census: &[VoterId]) -> VotingId {
        let id = store.create_voting(new_voting()).await.unwrap().id;
        store.add_census(id, census).await.unwrap();
        assert!(store
            .compare_and_set_status(id, VotingStatus::NotStarted, VotingStatus::Started, Utc::now())
            .await
            .unwrap());
        id
    }

    #[tokio::test]
    async fn voting_round_trips_through_sqlite() {
        let store = SqliteStore::memory().await.unwrap();
        let created = store.create_voting(new_voting()).await.unwrap();
        assert_eq!(created.id, 1);

        let key = PublicKey {
            p: BigUint::from(23u32),
            g: BigUint::from(5u32),
            y: BigUint::from(8u32),
        };
        let mut other = key.clone();
        other.y = BigUint::from(10u32);
        assert_eq!(store.set_public_key(1, key.clone()).await.unwrap(), key);
        assert_eq!(store.set_public_key(1, other).await.unwrap(), key);

        let stored = store.get_voting(1).await.unwrap().unwrap();
        assert_eq!(stored.question, created.question);
        assert_eq!(stored.auths, created.auths);
        assert_eq!(stored.pub_key, Some(key));
        assert_eq!(stored.status, VotingStatus::NotStarted);

        assert!(store.get_voting(2).await.unwrap().is_none());
        assert!(store.get_voting(u64::MAX).await.unwrap().is_none());
        assert_eq!(store.list_votings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_is_compare_and_set() {
        use VotingStatus::*;

        let store = SqliteStore::memory().await.unwrap();
        let id = store.create_voting(new_voting()).await.unwrap().id;
        let now = Utc::now();

        assert!(!store.compare_and_set_status(id, Started, Stopped, now).await.unwrap());
        assert!(store.compare_and_set_status(id, NotStarted, Started, now).await.unwrap());
        assert!(!store.compare_and_set_status(id, NotStarted, Started, now).await.unwrap());
        assert!(store.compare_and_set_status(id, Started, Stopped, now).await.unwrap());

        let voting = store.get_voting(id).await.unwrap().unwrap();
        assert!(voting.start_date.is_some() && voting.end_date.is_some());

        let result = TallyResult::tally(&voting.question, &[1, 2, 2]).unwrap();
        assert!(store.commit_tally(id, &result).await.unwrap());
        assert!(!store.commit_tally(id, &result).await.unwrap());

        let voting = store.get_voting(id).await.unwrap().unwrap();
        assert_eq!(voting.status, Tallied);
        assert_eq!(voting.tally, Some(vec![1, 2, 2]));
        assert_eq!(voting.postproc, Some(result.postproc));

        assert!(matches!(
            store.compare_and_set_status(42, NotStarted, Started, now).await,
            Err(Error::VotingNotFound(42))
        ));
    }

    #[tokio::test]
    async fn census_counts_changes() {
        let store = SqliteStore::memory().await.unwrap();
        let id = store.create_voting(new_voting()).await.unwrap().id;

        assert_eq!(store.add_census(id, &[1, 2, 3]).await.unwrap(), 3);
        assert_eq!(store.add_census(id, &[3, 4]).await.unwrap(), 1);
        assert_eq!(store.remove_census(id, &[4, 5]).await.unwrap(), 1);
        assert!(store.census_contains(id, 3).await.unwrap());
        assert!(!store.census_contains(id, 4).await.unwrap());

        assert!(matches!(
            store.add_census(7, &[1]).await,
            Err(Error::VotingNotFound(7))
        ));
    }

    #[tokio::test]
    async fn ballot_insert_is_gated() {
        let store = SqliteStore::memory().await.unwrap();
        let id = started_voting(&store, &[1, 2]).await;

        store.insert_ballot(ballot(id, 1)).await.unwrap();
        assert!(matches!(
            store.insert_ballot(ballot(id, 1)).await,
            Err(Error::DuplicateBallot { voter: 1, .. })
        ));
        assert!(matches!(
            store.insert_ballot(ballot(id, 3)).await,
            Err(Error::Ineligible { voter: 3, .. })
        ));
        assert!(matches!(
            store.insert_ballot(ballot(99, 1)).await,
            Err(Error::VotingNotFound(99))
        ));

        store
            .compare_and_set_status(id, VotingStatus::Started, VotingStatus::Stopped, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            store.insert_ballot(ballot(id, 2)).await,
            Err(Error::VotingNotOpen(_))
        ));

        assert_eq!(store.ballots(id).await.unwrap(), vec![ballot(id, 1)]);
        assert!(store.has_voted(id, 1).await.unwrap());
        assert!(!store.has_voted(id, 2).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_ballots() {
        let store = SqliteStore::memory().await.unwrap();
        let id = started_voting(&store, &[5]).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_ballot(ballot(id, 5)).await })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => assert!(matches!(e, Error::DuplicateBallot { .. })),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(store.ballots(id).await.unwrap().len(), 1);
    }
}
