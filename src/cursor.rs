//! Opaque pagination cursors.
//!
//! A cursor wraps a store identifier in a URL-safe token carrying a short
//! checksum, so a malformed or edited token is rejected instead of silently
//! decoding to a different identifier. Callers must not infer ordering or
//! structure from the token text.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

const CHECKSUM_DOMAIN: &[u8] = b"node-inventory/cursor/v1:";
const CHECKSUM_HEX_LEN: usize = 8;

/// Opaque pagination token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encodes a positive identifier.
    #[must_use]
    pub fn encode(id: i64) -> Self {
        let payload = format!("{id}:{}", checksum(id));
        Self(URL_SAFE_NO_PAD.encode(payload))
    }

    /// Wraps a caller-supplied token without checking it.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Decodes the identifier carried by this token.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCursorError`] when the token is malformed or its
    /// checksum does not match.
    pub fn decode(&self) -> Result<i64, InvalidCursorError> {
        decode_cursor(&self.0)
    }

    /// Returns the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejected cursor token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cursor '{token}': {reason}")]
pub struct InvalidCursorError {
    /// The rejected token.
    pub token: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl InvalidCursorError {
    fn new(token: &str, reason: &'static str) -> Self {
        Self {
            token: token.to_owned(),
            reason,
        }
    }
}

/// Encodes `id` as an opaque token.
#[must_use]
pub fn encode_cursor(id: i64) -> Cursor {
    Cursor::encode(id)
}

/// Decodes a token produced by [`encode_cursor`].
///
/// # Errors
///
/// Returns [`InvalidCursorError`] for tokens that are not valid base64, do
/// not carry a positive identifier, or fail the checksum.
pub fn decode_cursor(token: &str) -> Result<i64, InvalidCursorError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| InvalidCursorError::new(token, "not a valid token encoding"))?;
    let payload = String::from_utf8(bytes)
        .map_err(|_| InvalidCursorError::new(token, "token payload is not text"))?;
    let (raw_id, raw_checksum) = payload
        .split_once(':')
        .ok_or_else(|| InvalidCursorError::new(token, "token payload is malformed"))?;
    let id = raw_id
        .parse::<i64>()
        .map_err(|_| InvalidCursorError::new(token, "token does not carry an identifier"))?;
    if id <= 0 {
        return Err(InvalidCursorError::new(token, "identifier must be positive"));
    }
    if raw_checksum != checksum(id) {
        return Err(InvalidCursorError::new(token, "checksum mismatch"));
    }
    Ok(id)
}

/// Decodes every token, failing on the first invalid one.
///
/// # Errors
///
/// Returns the [`InvalidCursorError`] of the first rejected token.
pub fn decode_cursor_batch<I, S>(tokens: I) -> Result<Vec<i64>, InvalidCursorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|token| decode_cursor(token.as_ref()))
        .collect()
}

fn checksum(id: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CHECKSUM_DOMAIN);
    hasher.update(id.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    hex.truncate(CHECKSUM_HEX_LEN);
    hex
}

/// Forward pagination request: `first` items after `after`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page size; the configured default applies when absent.
    pub first: Option<u32>,
    /// Resume position; `None` starts from the beginning.
    pub after: Option<Cursor>,
}

impl PageRequest {
    /// Requests the first page with the default size.
    #[must_use]
    pub const fn first_page() -> Self {
        Self {
            first: None,
            after: None,
        }
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_first(mut self, first: u32) -> Self {
        self.first = Some(first);
        self
    }

    /// Sets the resume cursor.
    #[must_use]
    pub fn with_after(mut self, after: Cursor) -> Self {
        self.after = Some(after);
        self
    }
}

/// A page item and its cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge<T> {
    /// Cursor addressing this item.
    pub cursor: Cursor,
    /// The item.
    pub node: T,
}

/// Continuation metadata for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Whether more items follow this page.
    pub has_next_page: bool,
    /// Cursor of the last item; pass as `after` for the next page.
    pub end_cursor: Option<Cursor>,
}

/// One page of a stable, identifier-ordered collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub edges: Vec<Edge<T>>,
    /// Continuation metadata.
    pub page_info: PageInfo,
    /// Size of the whole collection at read time.
    pub total_count: u64,
}

impl<T> Page<T> {
    /// Returns the items without their cursors.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }
}
