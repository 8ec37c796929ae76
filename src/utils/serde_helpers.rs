use alloy::primitives::U256;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a wei amount as a decimal string
pub fn as_decimal<S>(value: &U256, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&value.to_string())
}

/// Deserialize a wei amount from a decimal string
pub fn from_decimal<'de, D>(d: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    U256::from_str_radix(&s, 10).map_err(D::Error::custom)
}
