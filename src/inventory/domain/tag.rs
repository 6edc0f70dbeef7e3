//! Validated tags for nodes and subscriptions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::InventoryDomainError;

/// Globally unique, human-assigned label referenced by routing rules.
///
/// A tag starts with an ASCII letter or underscore, continues with ASCII
/// alphanumerics, `_`, `-` or `.`, and is at most [`Tag::MAX_LEN`]
/// characters long.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Maximum tag length in characters.
    pub const MAX_LEN: usize = 64;

    /// Validates and wraps a tag.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryDomainError::InvalidTag`] when the value violates
    /// the tag format.
    pub fn new(value: impl Into<String>) -> Result<Self, InventoryDomainError> {
        let raw = value.into();
        match validate(&raw) {
            Ok(()) => Ok(Self(raw)),
            Err(reason) => Err(InventoryDomainError::InvalidTag { tag: raw, reason }),
        }
    }

    /// Returns the tag as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(raw: &str) -> Result<(), &'static str> {
    let mut chars = raw.chars();
    let Some(first) = chars.next() else {
        return Err("tag must not be empty");
    };
    if raw.chars().count() > Tag::MAX_LEN {
        return Err("tag is too long");
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err("tag must start with a letter or underscore");
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')) {
        return Err("tag may only contain letters, digits, '_', '-' and '.'");
    }
    Ok(())
}

impl TryFrom<String> for Tag {
    type Error = InventoryDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
