//! Reference tokens: the wire form of a registry entry.
//!
//! `[<uuid>]` addresses an ephemeral entry and `$<name>` a persistent one.
//! The leading character alone decides the namespace.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// A parsed reference to a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceToken {
    /// `[<uuid>]`
    Ephemeral(Uuid),
    /// `$<name>`
    Persistent(String),
}

/// A token that does not follow either reference syntax.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed reference token {token:?}: {reason}")]
pub struct TokenError {
    pub token: String,
    pub reason: &'static str,
}

impl TokenError {
    fn new(token: &str, reason: &'static str) -> Self {
        Self {
            token: token.to_string(),
            reason,
        }
    }
}

impl ReferenceToken {
    /// Parses the interior of `[...]` on its own, as found in `/[<uuid>]` paths.
    ///
    /// # Errors
    ///
    /// Fails when the text is not bracketed or the interior is not a UUID.
    pub fn parse_ephemeral(text: &str) -> Result<Uuid, TokenError> {
        let interior = text
            .strip_prefix('[')
            .ok_or_else(|| TokenError::new(text, "expected '['"))?
            .strip_suffix(']')
            .ok_or_else(|| TokenError::new(text, "expected closing ']'"))?;
        Uuid::parse_str(interior).map_err(|_| TokenError::new(text, "invalid uuid"))
    }
}

impl FromStr for ReferenceToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('[') {
            return Self::parse_ephemeral(s).map(Self::Ephemeral);
        }
        match s.strip_prefix('$') {
            Some("") => Err(TokenError::new(s, "empty persistent name")),
            Some(name) => Ok(Self::Persistent(name.to_string())),
            None => Err(TokenError::new(s, "expected '[' or '$'")),
        }
    }
}

impl fmt::Display for ReferenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ephemeral(id) => write!(f, "[{id}]"),
            Self::Persistent(name) => write!(f, "${name}"),
        }
    }
}
