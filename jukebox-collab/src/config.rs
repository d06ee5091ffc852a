use std::{str::FromStr, time::Duration};

use thiserror::Error;

/// Who transport commands (next, prev, pause, now) are sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportScope {
    /// Only connections watching the room
    #[default]
    Room,
    /// Every connection, regardless of room
    Global,
}

#[derive(Debug, Error)]
#[error("Unknown transport scope \"{0}\", expected \"room\" or \"global\"")]
pub struct ParseTransportScopeError(String);

impl FromStr for TransportScope {
    type Err = ParseTransportScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "room" => Ok(Self::Room),
            "global" => Ok(Self::Global),
            _ => Err(ParseTransportScopeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// How many characters a room code has
    pub code_length: usize,
    /// The characters room codes are drawn from
    pub code_alphabet: String,
    /// How many codes to try before giving up on creating a room
    pub max_code_attempts: usize,
    /// How long a single catalog lookup may take
    pub resolve_timeout: Duration,
    /// How many catalog lookups a playlist listing runs at once
    pub resolve_concurrency: usize,
    pub transport_scope: TransportScope,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            code_length: 5,
            code_alphabet: "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string(),
            max_code_attempts: 32,
            resolve_timeout: Duration::from_secs(5),
            resolve_concurrency: 4,
            transport_scope: TransportScope::Room,
        }
    }
}

#[cfg(test)]
mod test {
    use super::TransportScope;

    #[test]
    fn test_transport_scope_parsing() {
        assert_eq!("room".parse::<TransportScope>().unwrap(), TransportScope::Room);
        assert_eq!(" GLOBAL ".parse::<TransportScope>().unwrap(), TransportScope::Global);
        assert!("everyone".parse::<TransportScope>().is_err());
    }
}
