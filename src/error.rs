//! Centralized error handling for Tagwire.
//!
//! This module provides a robust error handling system that strictly avoids panics,
//! ensuring that all failure conditions are properly propagated through the `Result` type.
//!
//! ## Design Philosophy
//!
//! Tagwire's error handling is designed with the following principles:
//!
//! 1. **No Panics:** All error conditions are represented as `Result` values. The library
//!    enforces this through `#![deny(clippy::panic)]` and `#![deny(clippy::unwrap_used)]`.
//!
//! 2. **Fatal by Default:** Every error terminates the current encode or decode operation
//!    and surfaces to the caller. Nothing is retried, partial output is not rolled back,
//!    and the decoder attempts no resynchronization past a malformed field.
//!
//! 3. **Cloneable Errors:** The [`TagwireError`] type is `Clone`, allowing errors to be
//!    stored for later analysis. I/O errors are wrapped in `Arc` to keep cloning cheap.
//!
//! ## Error Categories
//!
//! - **Wire errors** ([`TagwireError::MalformedEnvelope`], [`TagwireError::TruncatedInput`],
//!   [`TagwireError::UnknownType`], [`TagwireError::NameTooLong`]): the byte stream does
//!   not conform to the envelope or field layout.
//! - **Graph errors** ([`TagwireError::UnregisteredObjectType`],
//!   [`TagwireError::InlineCycle`], [`TagwireError::InvalidFacadeOperation`]): failures of
//!   the object-graph serialization engine.
//! - **I/O errors** ([`TagwireError::Io`]): low-level sink/source failures.
//! - **Internal errors** ([`TagwireError::Internal`]): logic errors (should not occur in
//!   production).
//!
//! ## Usage Patterns
//!
//! ```rust
//! use tagwire::{Context, FieldValue, Message, TagwireError};
//!
//! let mut msg = Message::new();
//! msg.add(Some("greeting"), None, FieldValue::Str("hello".into()));
//!
//! let mut out = Vec::new();
//! match Context::new().serialize(&msg, 0, &mut out) {
//!     Ok(written) => assert_eq!(written, out.len()),
//!     Err(TagwireError::Io(e)) => eprintln!("I/O error: {}", e),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Tagwire operations.
///
/// This type alias is used throughout the library to simplify error handling.
/// It is equivalent to `std::result::Result<T, TagwireError>`.
pub type Result<T> = std::result::Result<T, TagwireError>;

/// The master error enum covering all failure domains in Tagwire.
///
/// Each variant corresponds to a distinct failure kind; the set is deliberately
/// disjoint from `std::io::ErrorKind` vocabulary so a match on this enum says
/// exactly what went wrong in format terms.
///
/// ## Cloneability
///
/// This type is `Clone` to support storage for later analysis. I/O errors are
/// wrapped in `Arc` to make cloning efficient.
#[derive(Debug, Clone)]
pub enum TagwireError {
    /// Low-level I/O failure on the byte sink or source (disk full, permissions, etc.).
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to make the error `Clone`.
    Io(Arc<io::Error>),

    /// The envelope or a field inside it violates the wire layout.
    ///
    /// Raised for size mismatches, illegal variable-size-width codes, invalid
    /// modified UTF-8, references that cannot be resolved, and similar format
    /// violations. The string describes the specific violation.
    MalformedEnvelope(String),

    /// A fixed-width type id with no descriptor in the type dictionary.
    ///
    /// Unknown *variable*-width types are tolerated (their bytes are opaque and
    /// the declared size tells the decoder how far to skip); unknown fixed-width
    /// types are unrecoverable because their width is unknowable.
    UnknownType(u8),

    /// Encode-time: no surrogate is registered for this runtime type.
    ///
    /// The string is the wire type-name when one is known, otherwise a debug
    /// rendering of the runtime type.
    UnregisteredObjectType(String),

    /// An object appears twice on the inline stack.
    ///
    /// Inlining an object embeds a full copy, so a cycle among inlined objects
    /// would never terminate. Cycles expressed through reference-eligible fields
    /// serialize as back-references and do not raise this error.
    InlineCycle,

    /// A field name's modified UTF-8 encoding exceeds 255 bytes.
    ///
    /// The payload is the actual encoded length that was rejected.
    NameTooLong(usize),

    /// The source ended before the declared size was satisfied.
    TruncatedInput {
        /// Number of bytes the declared sizes required.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },

    /// A readback operation was invoked on the streaming message facade.
    ///
    /// The facade is write-only: every mutating call is translated directly into
    /// wire output and nothing is retained to read back.
    InvalidFacadeOperation(&'static str),

    /// Logic error in the codec or graph engine.
    ///
    /// This error should not occur in production. If you encounter it, it likely
    /// indicates a bug in the library.
    Internal(String),
}

impl fmt::Display for TagwireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::MalformedEnvelope(s) => write!(f, "Malformed Envelope: {s}"),
            Self::UnknownType(id) => {
                write!(f, "Unknown Type: no descriptor for fixed-width type id {id}")
            }
            Self::UnregisteredObjectType(name) => {
                write!(f, "Unregistered Object Type: no surrogate for {name}")
            }
            Self::InlineCycle => write!(f, "cycle detected in inlined objects"),
            Self::NameTooLong(len) => {
                write!(f, "Name Too Long: encoded name is {len} bytes, limit is 255")
            }
            Self::TruncatedInput {
                expected,
                available,
            } => write!(
                f,
                "Truncated Input: expected to read {expected} but only had {available}"
            ),
            Self::InvalidFacadeOperation(op) => {
                write!(f, "Invalid Facade Operation: {op} on a write-only message")
            }
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for TagwireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TagwireError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
