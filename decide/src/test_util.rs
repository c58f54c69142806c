//! An in-process authority for tests.
//!
//! Generates a toy ElGamal keypair per voting and decrypts with it. Not for production use:
//! real deployments talk to their mixnet through [`crate::HttpAuthority`].

use crate::*;
use async_trait::async_trait;
use num_bigint::{BigUint, RandBigInt};
use num_traits::ToPrimitive;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// 2^127 - 1
const MODULUS: &str = "170141183460469231731687303715884105727";
const GENERATOR: u32 = 3;

#[derive(Default)]
pub struct LocalAuthority {
    keys: Mutex<HashMap<VotingId, (PublicKey, BigUint)>>,
    failing: AtomicBool,
    injected: Mutex<Option<Vec<u64>>>,
    delay: Mutex<Option<Duration>>,
    keygen_delay: Mutex<Option<Duration>>,
    key_requests: AtomicUsize,
    decrypt_requests: AtomicUsize,
}

impl LocalAuthority {
    pub fn new() -> Self {
        LocalAuthority::default()
    }

    /// Make every request fail as unavailable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Answer the next decryption with these selections instead of the real ones
    pub fn inject_selections(&self, selections: Vec<u64>) {
        *self.injected.lock() = Some(selections);
    }

    /// Sleep this long before answering a decryption
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Sleep this long before answering a key request
    pub fn set_keygen_delay(&self, delay: Option<Duration>) {
        *self.keygen_delay.lock() = delay;
    }

    pub fn key_requests(&self) -> usize {
        self.key_requests.load(Ordering::SeqCst)
    }

    pub fn decrypt_requests(&self) -> usize {
        self.decrypt_requests.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::AuthorityUnavailable("local authority is down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Authority for LocalAuthority {
    async fn generate_key(&self, voting: &Voting) -> Result<PublicKey, Error> {
        self.key_requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.keygen_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        let mut keys = self.keys.lock();
        let (key, _) = keys.entry(voting.id).or_insert_with(|| {
            let p = parse_decimal(MODULUS).unwrap_or_default();
            let g = BigUint::from(GENERATOR);
            let two = BigUint::from(2u32);
            let x = rand::thread_rng().gen_biguint_range(&two, &(&p - &two));
            let y = g.modpow(&x, &p);
            (PublicKey { p, g, y }, x)
        });

        Ok(key.clone())
    }

    async fn decrypt(
        &self,
        voting: &Voting,
        key: &PublicKey,
        ballots: Vec<Ciphertext>,
    ) -> Result<Vec<u64>, Error> {
        self.decrypt_requests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        if let Some(selections) = self.injected.lock().take() {
            return Ok(selections);
        }

        let secret = match self.keys.lock().get(&voting.id) {
            Some((known, secret)) if known == key => secret.clone(),
            _ => {
                return Err(Error::AuthorityUnavailable(format!(
                    "no key for voting {}",
                    voting.id
                )))
            }
        };

        let p = &key.p;
        let exponent = p - BigUint::from(2u32);
        let mut clear = Vec::with_capacity(ballots.len());
        for ballot in ballots {
            let shared = ballot.a.modpow(&secret, p);
            let inverse = shared.modpow(&exponent, p);
            let m = (&ballot.b * inverse) % p;
            clear.push(m.to_u64().ok_or_else(|| {
                Error::MalformedTallyResult("decrypted value out of range".into())
            })?);
        }
        clear.shuffle(&mut rand::thread_rng());

        Ok(clear)
    }
}
