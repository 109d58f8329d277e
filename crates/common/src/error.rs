//! Error taxonomy shared across crates.

use serde::{Deserialize, Serialize};

/// The kind of failure an operation reported.
///
/// Each crate keeps its own detailed error enum; `kind()` on those enums
/// collapses them onto this set so the boundary layer can choose a
/// transport-specific response without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The entity (cart, order, line item, product) does not exist.
    NotFound,
    /// The write would violate a uniqueness or state invariant.
    Conflict,
    /// The caller supplied an argument outside the accepted domain.
    InvalidArgument,
    /// The product catalog could not be reached or answered partially.
    UpstreamUnavailable,
    /// The storage transaction could not commit.
    TransactionFailed,
}

impl ErrorKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::UpstreamUnavailable => "UpstreamUnavailable",
            ErrorKind::TransactionFailed => "TransactionFailed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
