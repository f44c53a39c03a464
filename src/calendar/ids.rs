//! Identifier newtypes.
//!
//! The server and the command line hand out ids either as JSON numbers or as
//! decimal strings. Every id is normalized here, once, so the store compares
//! plain integers everywhere else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid identifier: {0:?}")]
pub struct IdError(pub String);

/// An id exactly as it arrived on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    pub fn coerce(self) -> Result<i64, IdError> {
        match self {
            RawId::Number(n) => Ok(n),
            RawId::Text(s) => parse_id(&s),
        }
    }
}

fn parse_id(raw: &str) -> Result<i64, IdError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| IdError(raw.to_string()))
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "RawId", into = "i64")]
        pub struct $name(pub i64);

        impl $name {
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }

        impl TryFrom<RawId> for $name {
            type Error = IdError;

            fn try_from(raw: RawId) -> Result<Self, IdError> {
                raw.coerce().map(Self)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, IdError> {
                parse_id(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Server-assigned calendar id; also the key of an event bucket.
    CalendarId
);
id_type!(EventId);
id_type!(InvitationId);
