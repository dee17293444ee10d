// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationId(Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(Uuid);

impl CustomerId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self> {
        parse_id("customer_id", value).map(Self)
    }
}

impl GenerationId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self> {
        parse_id("generation_id", value).map(Self)
    }
}

impl OrderId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self> {
        parse_id("order_id", value).map(Self)
    }
}

/// Strict: only the canonical hyphenated lowercase form is accepted, so a
/// stored id and its string representation round-trip byte for byte.
fn parse_id(kind: &'static str, value: &str) -> Result<Uuid> {
    if value.is_empty() {
        return Err(Error::InvalidIdentifier {
            kind,
            value: value.to_owned(),
            reason: "must not be empty",
        });
    }
    let parsed = Uuid::try_parse(value).map_err(|_| Error::InvalidIdentifier {
        kind,
        value: value.to_owned(),
        reason: "must be a uuid",
    })?;
    if parsed.hyphenated().to_string() != value {
        return Err(Error::InvalidIdentifier {
            kind,
            value: value.to_owned(),
            reason: "must use the canonical hyphenated form",
        });
    }
    Ok(parsed)
}

macro_rules! impl_id_traits {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::parse(&value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::parse(value)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }
    };
}

impl_id_traits!(CustomerId);
impl_id_traits!(GenerationId);
impl_id_traits!(OrderId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_round_trip() {
        let id = OrderId::generate();
        let text = id.to_string();
        assert_eq!(OrderId::parse(&text).expect("parse"), id);
    }

    #[test]
    fn non_canonical_forms_are_rejected() {
        let canonical = GenerationId::generate().to_string();
        let upper = canonical.to_ascii_uppercase();
        let simple = canonical.replace('-', "");
        assert!(GenerationId::parse(&upper).is_err());
        assert!(GenerationId::parse(&simple).is_err());
        assert!(GenerationId::parse("").is_err());
        assert!(GenerationId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CustomerId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
        let back: CustomerId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
