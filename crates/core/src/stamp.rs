//! Minute-resolution timestamps and the string-or-list wire shape.
//!
//! Every fact in the library is stamped with a `YYYYMMDDHHMM` string. The
//! fixed width makes lexical order equal chronological order, so `Stamp`
//! derives `Ord` straight from its inner string.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// chrono format string for [`Stamp`].
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M";

/// A validated `YYYYMMDDHHMM` time value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Stamp(String);

impl Stamp {
    /// Parse and validate a stamp string.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let s = s.trim();
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(StoreError::InvalidStamp(s.to_string()));
        }
        NaiveDateTime::parse_from_str(s, STAMP_FORMAT)
            .map_err(|_| StoreError::InvalidStamp(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    /// The current local time, truncated to the minute.
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.format(STAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Stamp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Stamp {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Stamp> for String {
    fn from(stamp: Stamp) -> Self {
        stamp.0
    }
}

/// A field that older files store either as a single value or as a list.
///
/// Normalized to a `Vec` as soon as it is read; nothing past the
/// deserialization boundary branches on the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, OneOrMany::Many(v) if v.is_empty())
    }
}

impl<T: Clone> OneOrMany<T> {
    /// Expand to exactly `len` values: a single value is repeated, a list is
    /// returned as-is. Returns `None` when a list has the wrong length.
    pub fn broadcast(self, len: usize) -> Option<Vec<T>> {
        match self {
            OneOrMany::One(v) => Some(vec![v; len]),
            OneOrMany::Many(v) if v.len() == len => Some(v),
            OneOrMany::Many(_) => None,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        value.into_vec()
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

/// `deserialize_with` helper reading a [`OneOrMany`] straight into a `Vec`.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::<T>::deserialize(deserializer).map(Vec::from)
}
