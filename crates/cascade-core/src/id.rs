use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const CHECKSUM_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ012345";

/// A platform record identifier, normalized to its 18-character form.
///
/// The platform hands out ids in two encodings: a 15-character
/// case-sensitive form and an 18-character case-insensitive form that
/// appends a 3-character case checksum. Both parse to the same `RecordId`,
/// and a `RecordId` compares equal to either raw string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(AppError::InvalidIdentifier(raw.to_string()));
        }

        match raw.len() {
            15 => {
                let mut canonical = String::with_capacity(18);
                canonical.push_str(raw);
                for chunk in raw.as_bytes().chunks(5) {
                    let bits = chunk
                        .iter()
                        .enumerate()
                        .filter(|(_, b)| b.is_ascii_uppercase())
                        .fold(0usize, |acc, (i, _)| acc | (1 << i));
                    canonical.push(CHECKSUM_ALPHABET[bits] as char);
                }
                Ok(Self(canonical))
            }
            18 => Ok(Self(raw.to_string())),
            _ => Err(AppError::InvalidIdentifier(raw.to_string())),
        }
    }

    /// The canonical 18-character form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The case-sensitive 15-character prefix.
    pub fn short(&self) -> &str {
        &self.0[..15]
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for RecordId {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RecordId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        RecordId::parse(other).is_ok_and(|other| *self == other)
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl PartialEq<String> for RecordId {
    fn eq(&self, other: &String) -> bool {
        *self == *other.as_str()
    }
}

impl PartialEq<RecordId> for &str {
    fn eq(&self, other: &RecordId) -> bool {
        *other == **self
    }
}

impl PartialEq<RecordId> for String {
    fn eq(&self, other: &RecordId) -> bool {
        *other == *self.as_str()
    }
}
