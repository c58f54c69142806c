use crate::*;
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{CryptoRng, Rng};

/// ElGamal public key of a voting, as generated by its authority
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    #[serde(with = "biguint_decimal")]
    pub p: BigUint,
    #[serde(with = "biguint_decimal")]
    pub g: BigUint,
    #[serde(with = "biguint_decimal")]
    pub y: BigUint,
}

impl PublicKey {
    /// Encrypt an option number for this key.
    ///
    /// This is what a voter client does before submitting a ballot. The core never decrypts.
    ///
    /// # Panics
    ///
    /// If the modulus is below 3. Call [`PublicKey::validate`] on keys from elsewhere first.
    pub fn encrypt<R: Rng + CryptoRng>(&self, option: u64, rng: &mut R) -> Ciphertext {
        let k = rng.gen_biguint_range(&BigUint::one(), &(&self.p - BigUint::one()));
        let a = self.g.modpow(&k, &self.p);
        let shared = self.y.modpow(&k, &self.p);
        let b = (BigUint::from(option) * shared) % &self.p;

        Ciphertext { a, b }
    }

    /// Sanity check the key parameters
    pub fn validate(&self) -> Result<(), Error> {
        let three = BigUint::from(3u32);
        if self.p < three {
            return Err(Error::MalformedTallyResult("public key modulus too small".into()));
        }
        if self.g.is_zero() || self.g >= self.p || self.y.is_zero() || self.y >= self.p {
            return Err(Error::MalformedTallyResult("public key out of range".into()));
        }
        Ok(())
    }
}

/// An encrypted ballot: the ElGamal pair `(a, b)`.
///
/// Opaque to everything but the authority.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    #[serde(with = "biguint_decimal")]
    pub a: BigUint,
    #[serde(with = "biguint_decimal")]
    pub b: BigUint,
}

impl Ciphertext {
    /// Decode a ciphertext from its stored decimal components
    pub fn from_decimal(a: &str, b: &str) -> Result<Self, Error> {
        let a = parse_decimal(a).map_err(Error::MalformedBallot)?;
        let b = parse_decimal(b).map_err(Error::MalformedBallot)?;
        Ok(Ciphertext { a, b })
    }

    /// Encode as decimal components, `(a, b)`
    pub fn to_decimal(&self) -> (String, String) {
        (self.a.to_str_radix(10), self.b.to_str_radix(10))
    }

    /// Check that both components lie in `1..p`
    pub fn validate(&self, key: &PublicKey) -> Result<(), Error> {
        for (name, c) in [("a", &self.a), ("b", &self.b)].iter() {
            if c.is_zero() {
                return Err(Error::MalformedBallot(format!("{} must not be zero", name)));
            }
            if *c >= &key.p {
                return Err(Error::MalformedBallot(format!(
                    "{} is not below the key modulus",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Wire form used by mixnet authorities: `[a, b]`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CiphertextPair(
    #[serde(with = "biguint_decimal")] pub BigUint,
    #[serde(with = "biguint_decimal")] pub BigUint,
);

impl From<Ciphertext> for CiphertextPair {
    fn from(c: Ciphertext) -> Self {
        CiphertextPair(c.a, c.b)
    }
}

impl From<CiphertextPair> for Ciphertext {
    fn from(pair: CiphertextPair) -> Self {
        Ciphertext {
            a: pair.0,
            b: pair.1,
        }
    }
}
