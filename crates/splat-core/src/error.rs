//! Common error type definitions.

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Categories every splat error maps onto.
///
/// Each crate keeps its own structured error enum and exposes a `kind()`
/// accessor returning one of these, so surrounding code (an HTTP layer, the
/// CLI) can decide on a status code without matching on crate internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unsupported payload or request.
    Validation,
    /// Artifact or job absent or expired.
    NotFound,
    /// External backend failure, timeout or schema mismatch.
    Upstream,
    /// Local disk failure.
    Io,
    /// Service configuration is incomplete or invalid.
    Configuration,
}

impl ErrorKind {
    /// Returns `true` when the caller sent something we cannot accept.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation | Self::NotFound)
    }

    /// Returns `true` when repeating the same request may succeed.
    ///
    /// Nothing in the workspace retries automatically; this is a hint for
    /// callers deciding whether to issue a fresh request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream | Self::Io)
    }
}
