//! # Tagwire
//!
//! A codec and object-graph serializer for a self-describing, tagged binary
//! message format. A message is a tree of named/ordinal-keyed fields whose
//! leaves are typed scalars or recursive sub-messages; an envelope wraps each
//! top-level message with a small header. On top of the wire format sits an
//! object-graph serializer that encodes arbitrary typed objects as messages,
//! compressing repeated types and back-references to previously emitted
//! objects.
//!
//! ## Overview
//!
//! Tagwire messages are self-describing: every field carries its own type id,
//! and fields can be keyed by a string name, a 16-bit ordinal, both, or
//! neither. Because the description travels with the data, a reader needs no
//! schema to walk a message, and an optional *taxonomy* (a name/ordinal
//! bijection selected by an id in the envelope header) lets the writer shrink
//! names down to two-byte ordinals without losing them.
//!
//! ### Key Features
//!
//! *   **Self-describing fields:** one prefix byte + one type id per field;
//!     no schema required to decode.
//! *   **Taxonomy compression:** field names become ordinals on the wire and
//!     come back on decode, driven by a pluggable resolver.
//! *   **Object graphs:** arbitrary typed objects serialize through per-type
//!     [`Surrogate`]s; shared objects compress to relative back-references
//!     and repeated types to a single integer delta.
//! *   **Streaming emission:** surrogates write straight to the wire through
//!     a write-only facade; object messages are never materialized.
//! *   **Opaque round-trip:** fields of unknown variable-width types decode
//!     to their raw bytes and re-encode unchanged.
//!
//! ## Architecture
//!
//! The [`Context`] is the entry point: it bundles the [`TypeDictionary`]
//! (type id → descriptor), the optional [`TaxonomyResolver`], and factories
//! for the per-operation codecs. Tree encoding walks a materialized
//! [`Message`]; graph encoding drives [`Surrogate`]s registered in a
//! [`SurrogateRegistry`], with all per-encode state (identity map, inline
//! stack, encode queue, type-delta map) confined to one
//! [`GraphSerializer`](graph::GraphSerializer).
//!
//! ## Usage
//!
//! ### Messages and envelopes
//!
//! ```rust
//! use tagwire::{Context, FieldValue, Message};
//!
//! let mut msg = Message::new();
//! msg.add(Some("name"), None, FieldValue::Str("Tagwire".into()));
//! msg.add(Some("answer"), Some(7), FieldValue::Int(42));
//!
//! let context = Context::new();
//! let mut wire = Vec::new();
//! context.serialize(&msg, 0, &mut wire)?;
//!
//! let envelope = context.deserialize(&mut wire.as_slice())?;
//! assert_eq!(envelope.message.by_name("answer"), Some(&FieldValue::Int(42)));
//! # Ok::<(), tagwire::TagwireError>(())
//! ```
//!
//! ### Taxonomies
//!
//! ```rust
//! use tagwire::{Context, FieldValue, MapResolver, Message, Taxonomy};
//!
//! let resolver = MapResolver::new([(45, Taxonomy::new([(5, "name")]))]);
//! let context = Context::new().with_resolver(resolver);
//!
//! let mut msg = Message::new();
//! msg.add(Some("name"), None, FieldValue::Str("compact".into()));
//!
//! let mut wire = Vec::new();
//! context.serialize(&msg, 45, &mut wire)?;
//!
//! // On the wire the field carries only ordinal 5; decoding restores both.
//! let envelope = context.deserialize(&mut wire.as_slice())?;
//! assert!(envelope.message.by_name("name").is_some());
//! assert!(envelope.message.by_ordinal(5).is_some());
//! # Ok::<(), tagwire::TagwireError>(())
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **Encapsulated Unsafe:** `unsafe` appears only for the read-only memory
//!   mapping in [`Context::load`].
//! * **No Panics:** no `unwrap()` or `panic!()` calls in the library
//!   (enforced by clippy lints).
//! * **Comprehensive Errors:** all failures correspond to a [`TagwireError`]
//!   kind, and every error is fatal to its operation.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod context;
pub mod dictionary;
pub mod error;
pub mod format;
pub mod graph;
pub mod inspector;
pub mod message;
pub mod mutf8;
pub mod taxonomy;

// --- CODEC MODULES ---
pub mod reader;
pub mod writer;

// --- RE-EXPORTS ---

pub use context::Context;
pub use dictionary::{FieldType, TypeDictionary, WireTypeCodec};
pub use error::{Result, TagwireError};
pub use format::{type_ids, FieldPrefix, DEFAULT_VERSION, ENVELOPE_HEADER_SIZE, TYPE_ORDINAL};
pub use graph::{
    GraphDecoder, GraphObj, GraphSerializer, StreamMessage, Surrogate, SurrogateRegistry,
    TypeNaming,
};
pub use inspector::{WireInspector, WireReport};
pub use message::{Envelope, Field, FieldValue, Message};
pub use taxonomy::{MapResolver, Taxonomy, TaxonomyResolver};
