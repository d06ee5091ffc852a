use std::fmt::Display;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    /// Either `/track/<id>` at the end of the path, or `/album/<id>/track/<id>` anywhere
    static ref TRACK_URL_REGEX: Regex =
        Regex::new(r"/track/(\d+)/?(?:[?#].*)?$|/album/\d+/track/(\d+)").unwrap();
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error(
        "\"{0}\" is not a track reference. Expected a track id (12345), \
        a track link (https://music.yandex.ru/track/12345), \
        or an album track link (https://music.yandex.ru/album/99/track/12345)"
    )]
    Invalid(String),
}

/// The catalog's identifier for a track. Always positive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TrackId(i64);

impl TrackId {
    pub fn new(value: i64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Extracts a track id from user input.
    /// A bare number is tried first, then the catalog's track link shapes.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let input = input.trim();
        let invalid = || ReferenceError::Invalid(input.to_string());

        if let Ok(value) = input.parse::<i64>() {
            return Self::new(value).ok_or_else(invalid);
        }

        let captures = TRACK_URL_REGEX.captures(input).ok_or_else(invalid)?;
        let value = captures
            .get(1)
            .or_else(|| captures.get(2))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(invalid)?;

        Self::new(value).ok_or_else(invalid)
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
