// Decimal (de)serialization for big integers, for use in `#[serde(with)]`
//
// Values are written as decimal strings. On input both decimal strings and JSON
// integers are accepted, since authorities written in other languages send plain numbers.
use num_bigint::BigUint;
use num_traits::Num;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

pub mod biguint_decimal {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = BigUint;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
        Ok(BigUint::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
        if v < 0 {
            return Err(E::custom("negative integer"));
        }
        Ok(BigUint::from(v as u64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
        parse_decimal(v).map_err(E::custom)
    }
}

/// Parse a decimal string into a big integer
pub fn parse_decimal(v: &str) -> Result<BigUint, String> {
    let v = v.trim();
    if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid decimal integer {:?}", v));
    }
    BigUint::from_str_radix(v, 10).map_err(|e| format!("invalid decimal integer {:?}: {}", v, e))
}
