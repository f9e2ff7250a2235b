//! Defines the physical binary layout of Tagwire envelopes.
//!
//! This module specifies the on-wire representation of messages: the envelope
//! header, the one-byte field prefix, and the type-id assignments. Understanding
//! this layout is essential for implementing readers in other languages or
//! debugging corrupt streams.
//!
//! ## Envelope Layout
//!
//! Every top-level message travels inside an envelope:
//!
//! ```text
//! Offset | Size | Field         | Description
//! -------|------|---------------|----------------------------------------
//! 0      | 1    | directives    | Processing directives (reserved, 0)
//! 1      | 1    | version       | Schema version
//! 2      | 2    | taxonomy-id   | i16 BE, 0 = no taxonomy
//! 4      | 4    | size          | i32 BE, total envelope size incl. header
//! 8      | ...  | fields        | Field records until byte `size`
//! ```
//!
//! ## Field Layout
//!
//! ```text
//! u8    prefix         (see FieldPrefix)
//! u8    type-id
//! i16   ordinal        if prefix.has_ordinal
//! u8    name-length    if prefix.has_name
//! bytes name           modified UTF-8
//! bytes size           if !prefix.fixed_width: 0/1/2/4 bytes BE unsigned
//! bytes value          fixed width per type, or `size` bytes
//! ```
//!
//! ## The Field Prefix
//!
//! A single byte carries four flags:
//!
//! ```text
//! Bit 7    : fixed-width (1) vs variable-width (0)
//! Bits 6-5 : variable-size width code: 0, 1, 2 bytes; code 3 means 4 bytes.
//!            Zero for fixed-width fields.
//! Bit 4    : ordinal present
//! Bit 3    : name present
//! Bits 2-0 : reserved, zero
//! ```
//!
//! ## Compatibility
//!
//! - **Endianness:** All multi-byte integers on the wire are big-endian.
//!   Floats are IEEE-754 in big-endian byte order.
//! - **Alignment:** No alignment requirements; fields are densely packed.

use crate::error::{Result, TagwireError};

/// The fixed size of the envelope header.
/// Directives(1) + Version(1) + TaxonomyId(2) + Size(4) = 8
pub const ENVELOPE_HEADER_SIZE: usize = 8;

/// Schema version written by this crate when the caller does not specify one.
pub const DEFAULT_VERSION: u8 = 0;

/// Ordinal reserved for type metadata written by the object-graph serializer.
///
/// Surrogates must not add fields at this ordinal; the graph decoder interprets
/// every field it finds here as type information (an integer delta to a prior
/// object of the same type, or one or more wire type-name strings).
pub const TYPE_ORDINAL: i16 = 0;

/// Type-id assignments for the built-in wire types.
///
/// Ids 0-6 are the seven fixed-width primitives the codec fast-paths; the
/// remaining built-ins are variable-width and dispatched through the type
/// dictionary. Higher ids are open for dictionary registration.
pub mod type_ids {
    /// `bool`, 1 byte.
    pub const BOOLEAN: u8 = 0;
    /// `i8`, 1 byte.
    pub const BYTE: u8 = 1;
    /// `i16`, 2 bytes BE.
    pub const SHORT: u8 = 2;
    /// `i32`, 4 bytes BE.
    pub const INT: u8 = 3;
    /// `i64`, 8 bytes BE.
    pub const LONG: u8 = 4;
    /// `f32`, 4 bytes BE.
    pub const FLOAT: u8 = 5;
    /// `f64`, 8 bytes BE.
    pub const DOUBLE: u8 = 6;
    /// Modified UTF-8 string, variable width.
    pub const STRING: u8 = 7;
    /// Opaque byte array, variable width.
    pub const BYTES: u8 = 8;
    /// Nested sub-message, variable width.
    pub const MESSAGE: u8 = 9;
}

/// Decoded form of the one-byte field prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPrefix {
    fixed_width: bool,
    var_size_bytes: u8,
    has_ordinal: bool,
    has_name: bool,
}

impl FieldPrefix {
    const FIXED_WIDTH_MASK: u8 = 0b1000_0000; // Bit 7
    const VAR_SIZE_MASK: u8 = 0b0110_0000; // Bits 6-5
    const ORDINAL_MASK: u8 = 0b0001_0000; // Bit 4
    const NAME_MASK: u8 = 0b0000_1000; // Bit 3

    /// Creates a new `FieldPrefix`.
    ///
    /// `var_size_bytes` must be 0, 1, 2 or 4 and is forced to zero for
    /// fixed-width fields.
    pub fn new(fixed_width: bool, var_size_bytes: u8, has_ordinal: bool, has_name: bool) -> Self {
        Self {
            fixed_width,
            var_size_bytes: if fixed_width { 0 } else { var_size_bytes },
            has_ordinal,
            has_name,
        }
    }

    /// Decodes a prefix byte.
    ///
    /// Reserved bits (2-0) are ignored. An unmappable variable-size width code
    /// is a hard decode error; with the current two-bit field every code maps.
    pub fn from_byte(byte: u8) -> Result<Self> {
        let code = (byte & Self::VAR_SIZE_MASK) >> 5;
        let var_size_bytes = match code {
            0 => 0,
            1 => 1,
            2 => 2,
            3 => 4,
            other => {
                return Err(TagwireError::MalformedEnvelope(format!(
                    "illegal variable-size width code {other} in field prefix"
                )))
            }
        };
        Ok(Self {
            fixed_width: (byte & Self::FIXED_WIDTH_MASK) != 0,
            var_size_bytes,
            has_ordinal: (byte & Self::ORDINAL_MASK) != 0,
            has_name: (byte & Self::NAME_MASK) != 0,
        })
    }

    /// Returns the raw byte representation.
    pub fn as_u8(&self) -> u8 {
        let mut byte = 0;
        if self.fixed_width {
            byte |= Self::FIXED_WIDTH_MASK;
        }
        let code: u8 = match self.var_size_bytes {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 3, // 4 bytes
        };
        byte |= code << 5;
        if self.has_ordinal {
            byte |= Self::ORDINAL_MASK;
        }
        if self.has_name {
            byte |= Self::NAME_MASK;
        }
        byte
    }

    /// Returns true if the field's value has a type-determined width.
    pub fn fixed_width(&self) -> bool {
        self.fixed_width
    }

    /// Returns the number of size bytes (0, 1, 2 or 4) for variable-width fields.
    pub fn var_size_bytes(&self) -> u8 {
        self.var_size_bytes
    }

    /// Returns true if an ordinal follows the type id.
    pub fn has_ordinal(&self) -> bool {
        self.has_ordinal
    }

    /// Returns true if a length-prefixed name is present.
    pub fn has_name(&self) -> bool {
        self.has_name
    }
}

/// The envelope header preceding every top-level message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Processing directives. Reserved, written as zero.
    pub directives: u8,
    /// Schema version of the payload.
    pub version: u8,
    /// Taxonomy id; 0 means no taxonomy is in force.
    pub taxonomy_id: i16,
    /// Total envelope size in bytes, header included.
    pub size: i32,
}

impl EnvelopeHeader {
    /// Creates a new header with zeroed directives.
    pub fn new(version: u8, taxonomy_id: i16, size: i32) -> Self {
        Self {
            directives: 0,
            version,
            taxonomy_id,
            size,
        }
    }

    /// Serializes the header to bytes (big-endian).
    pub fn to_bytes(&self) -> [u8; ENVELOPE_HEADER_SIZE] {
        let mut buf = [0u8; ENVELOPE_HEADER_SIZE];
        buf[0] = self.directives;
        buf[1] = self.version;
        buf[2..4].copy_from_slice(&self.taxonomy_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.size.to_be_bytes());
        buf
    }

    /// Deserializes a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENVELOPE_HEADER_SIZE {
            return Err(TagwireError::TruncatedInput {
                expected: ENVELOPE_HEADER_SIZE,
                available: bytes.len(),
            });
        }
        let taxonomy_bytes = bytes.get(2..4).ok_or_else(|| {
            TagwireError::MalformedEnvelope("failed to read taxonomy id from header".into())
        })?;
        let size_bytes = bytes.get(4..8).ok_or_else(|| {
            TagwireError::MalformedEnvelope("failed to read size from header".into())
        })?;

        let taxonomy_id = i16::from_be_bytes(
            taxonomy_bytes
                .try_into()
                .map_err(|_| TagwireError::MalformedEnvelope("invalid taxonomy id bytes".into()))?,
        );
        let size = i32::from_be_bytes(
            size_bytes
                .try_into()
                .map_err(|_| TagwireError::MalformedEnvelope("invalid size bytes".into()))?,
        );

        if size < ENVELOPE_HEADER_SIZE as i32 {
            return Err(TagwireError::MalformedEnvelope(format!(
                "declared envelope size {size} is smaller than the header"
            )));
        }

        Ok(Self {
            directives: bytes[0],
            version: bytes[1],
            taxonomy_id,
            size,
        })
    }
}
