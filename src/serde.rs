//! Serde extensions

use std::{fmt::Display, str::FromStr};

use ::serde::{de, Deserialize, Deserializer, Serializer};

/// Serialize a value through its `Display` implementation
pub fn serialize_display<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Deserialize a value from a string through its `FromStr` implementation
pub fn deserialize_from_str<'de, T, D>(d: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    s.parse().map_err(|error| de::Error::custom(format!("{}: {}", s, error)))
}
