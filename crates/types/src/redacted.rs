//! Values that are hidden from view until explicitly unlocked.
//!
//! Locked secrets are rendered with a fixed-length mask. The mask is a
//! presentation detail only: [`Redacted`] never hands it out as data, so a
//! locked value cannot be mistaken for a real one and submitted.

use std::{error::Error, fmt};

/// Placeholder rendered in place of a locked value.
pub const REDACTION_MASK: &str = "********";

/// A value that is either still locked or has been revealed by a fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct Redacted<T> {
    value: Option<T>,
}

impl<T> Redacted<T> {
    /// A locked value whose content is unknown to the client.
    pub fn masked() -> Self {
        Self { value: None }
    }

    /// A value whose content is already known.
    pub fn revealed(value: T) -> Self {
        Self { value: Some(value) }
    }

    pub fn is_masked(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the real value when it has been revealed.
    pub fn expose(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Consumes the wrapper, failing when the value is still locked.
    pub fn into_revealed(self) -> Result<T, RedactedError> {
        self.value.ok_or(RedactedError)
    }

    /// Reveals the value, running `fetch` only when it is still locked.
    ///
    /// A failed fetch leaves the value locked.
    pub fn unlock<E>(&mut self, fetch: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        let value = match self.value.take() {
            Some(value) => value,
            None => fetch()?,
        };
        Ok(self.value.insert(value))
    }

    /// Drops the revealed content, locking the value again.
    pub fn lock(&mut self) {
        self.value = None;
    }
}

impl<T: AsRef<str>> Redacted<T> {
    /// Text suitable for display: the mask while locked, the value otherwise.
    pub fn display_text(&self) -> &str {
        self.value.as_ref().map_or(REDACTION_MASK, AsRef::as_ref)
    }
}

impl<T> Default for Redacted<T> {
    fn default() -> Self {
        Self::masked()
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTION_MASK)
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTION_MASK)
    }
}

/// Raised when a locked value is read as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactedError;

impl fmt::Display for RedactedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("value is locked; unlock it before use")
    }
}

impl Error for RedactedError {}
